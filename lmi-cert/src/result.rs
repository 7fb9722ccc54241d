//! Result types and their assembly.
//!
//! A result is either a verified certificate or a failure report; the two
//! shapes never mix. Serialized, the discriminant appears as `"outcome"`
//! next to `"feasible"` and `"mode"`.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::adapter::{OutcomeStatus, SolverOutcome};
use crate::error::{CertificateError, FailureKind};
use crate::model::CertificateMode;
use crate::verify::{EigenBounds, VerificationReport};

/// Outcome of one certificate search.
#[derive(Debug, Clone, Serialize)]
pub struct LmiResult {
    /// Whether a verified certificate was found
    pub feasible: bool,
    /// Certificate kind that was searched for
    pub mode: CertificateMode,
    /// Certificate or failure
    #[serde(flatten)]
    pub outcome: LmiOutcome,
    /// Non-fatal conditions met along the way
    pub warnings: Vec<SolveWarning>,
}

/// Certificate or failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LmiOutcome {
    /// Verified certificate
    Feasible(FeasibleCertificate),
    /// No certificate
    Failed(FailedSolve),
}

/// A verified certificate.
#[derive(Debug, Clone, Serialize)]
pub struct FeasibleCertificate {
    /// W as rows
    #[serde(rename = "W")]
    pub w: Vec<Vec<f64>>,
    /// M = W⁻¹ as rows
    #[serde(rename = "M")]
    pub m: Vec<Vec<f64>>,
    /// ρ
    pub rho: f64,
    /// Extreme eigenvalues of H or D
    pub certificate_eigenvalues: CertificateEigenvalues,
    /// Extreme eigenvalues of W
    pub w_eigenvalues: EigenBounds,
    /// Extreme eigenvalues of M
    pub m_eigenvalues: EigenBounds,
    /// Backend metadata
    pub solver_info: SolverInfo,
    /// Verification report
    pub verification: VerificationReport,
}

/// Extreme eigenvalues of the certificate matrix of the active mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "matrix")]
pub enum CertificateEigenvalues {
    /// H mode
    H {
        /// Smallest eigenvalue of H
        min_eig_h: f64,
        /// Largest eigenvalue of H
        max_eig_h: f64,
    },
    /// D mode
    D {
        /// Smallest eigenvalue of D
        min_eig_d: f64,
        /// Largest eigenvalue of D
        max_eig_d: f64,
    },
}

impl CertificateEigenvalues {
    /// Tag eigenvalue bounds with the mode they belong to.
    pub fn for_mode(mode: CertificateMode, bounds: EigenBounds) -> Self {
        match mode {
            CertificateMode::HMode => CertificateEigenvalues::H {
                min_eig_h: bounds.min,
                max_eig_h: bounds.max,
            },
            CertificateMode::DMode => CertificateEigenvalues::D {
                min_eig_d: bounds.min,
                max_eig_d: bounds.max,
            },
        }
    }
}

/// A search that produced no certificate.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSolve {
    /// Always zero
    pub rho: f64,
    /// Why the search failed
    pub error: FailureReport,
    /// Backend metadata, when the backend ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_info: Option<SolverInfo>,
    /// Verification report, when verification ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
}

/// Error category and message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    /// Category
    pub kind: FailureKind,
    /// Human-readable description
    pub message: String,
}

impl From<&CertificateError> for FailureReport {
    fn from(err: &CertificateError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Backend metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverInfo {
    /// Backend name
    pub solver_name: String,
    /// Normalized status
    pub status: OutcomeStatus,
    /// Objective ρ*, when available
    pub optimal_value: Option<f64>,
    /// Problem lowering time in seconds
    pub setup_time: f64,
    /// Backend time in seconds
    pub solve_time: f64,
    /// Backend iterations
    pub iterations: usize,
}

impl From<&SolverOutcome> for SolverInfo {
    fn from(outcome: &SolverOutcome) -> Self {
        Self {
            solver_name: outcome.backend.to_string(),
            status: outcome.status(),
            optimal_value: outcome.objective,
            setup_time: outcome.setup_time.as_secs_f64(),
            solve_time: outcome.solve_time.as_secs_f64(),
            iterations: outcome.iterations,
        }
    }
}

/// Non-fatal condition attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolveWarning {
    /// Q was not positive definite; L = diag(√diag(Q)) was used
    FactorizationFallback {
        /// Description
        message: String,
    },
    /// The requested backend is not compiled in
    BackendDowngraded {
        /// Backend requested
        requested: String,
        /// Backend used
        used: String,
    },
    /// An eigenvalue had an imaginary part above tolerance
    Asymmetry {
        /// Largest imaginary part
        max_imaginary: f64,
    },
}

impl LmiResult {
    /// Whether a verified certificate was found.
    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    /// The certificate, if any.
    pub fn certificate(&self) -> Option<&FeasibleCertificate> {
        match &self.outcome {
            LmiOutcome::Feasible(cert) => Some(cert),
            LmiOutcome::Failed(_) => None,
        }
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&FailedSolve> {
        match &self.outcome {
            LmiOutcome::Feasible(_) => None,
            LmiOutcome::Failed(failed) => Some(failed),
        }
    }
}

/// Collects warnings during a search and produces the final result.
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    mode: CertificateMode,
    warnings: Vec<SolveWarning>,
}

impl ResultAssembler {
    /// Start assembling a result for `mode`.
    pub fn new(mode: CertificateMode) -> Self {
        Self {
            mode,
            warnings: Vec::new(),
        }
    }

    /// Record a warning.
    pub fn warn(&mut self, warning: SolveWarning) {
        self.warnings.push(warning);
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[SolveWarning] {
        &self.warnings
    }

    /// Result for a verified certificate.
    pub fn feasible(
        self,
        w: &DMatrix<f64>,
        m: &DMatrix<f64>,
        rho: f64,
        solver_info: SolverInfo,
        verification: VerificationReport,
    ) -> LmiResult {
        let cert = FeasibleCertificate {
            w: to_rows(w),
            m: to_rows(m),
            rho,
            certificate_eigenvalues: CertificateEigenvalues::for_mode(self.mode, verification.certificate),
            w_eigenvalues: verification.w,
            m_eigenvalues: verification.m,
            solver_info,
            verification,
        };
        LmiResult {
            feasible: true,
            mode: self.mode,
            outcome: LmiOutcome::Feasible(cert),
            warnings: self.warnings,
        }
    }

    /// Result for a failed search.
    pub fn failed(
        self,
        error: &CertificateError,
        solver_info: Option<SolverInfo>,
        verification: Option<VerificationReport>,
    ) -> LmiResult {
        LmiResult {
            feasible: false,
            mode: self.mode,
            outcome: LmiOutcome::Failed(FailedSolve {
                rho: 0.0,
                error: FailureReport::from(error),
                solver_info,
                verification,
            }),
            warnings: self.warnings,
        }
    }
}

fn to_rows(a: &DMatrix<f64>) -> Vec<Vec<f64>> {
    a.row_iter().map(|row| row.iter().copied().collect()).collect()
}
