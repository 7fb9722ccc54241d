//! Independent post-solve verification.
//!
//! The certificate matrix is recomputed from (W, ρ) with the closed-form
//! formula and checked through its eigenvalues, together with the spectral
//! bounds on W and the sign of ρ.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::certificate::CertificateTemplate;
use crate::error::{CertificateError, CertificateResult};
use crate::model::{Bounds, CertificateMode};

/// Smallest and largest (real parts of) eigenvalues.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EigenBounds {
    /// Smallest eigenvalue
    pub min: f64,
    /// Largest eigenvalue
    pub max: f64,
}

/// Pass/fail per verification condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationChecks {
    /// H negative definite (max eig ≤ tol) or D positive semidefinite (min eig ≥ -tol)
    pub certificate_definite: bool,
    /// min eig(W) ≥ -tol
    pub w_positive_definite: bool,
    /// min eig(W) ≥ α_min - tol
    pub w_lower_bound: bool,
    /// max eig(W) ≤ α_max + tol
    pub w_upper_bound: bool,
    /// ρ ≥ -tol
    pub rho_non_negative: bool,
}

impl VerificationChecks {
    /// Whether every condition holds.
    pub fn all(&self) -> bool {
        self.failed().is_empty()
    }

    /// Names of the conditions that do not hold.
    pub fn failed(&self) -> Vec<&'static str> {
        [
            ("certificate_definite", self.certificate_definite),
            ("w_positive_definite", self.w_positive_definite),
            ("w_lower_bound", self.w_lower_bound),
            ("w_upper_bound", self.w_upper_bound),
            ("rho_non_negative", self.rho_non_negative),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Extreme eigenvalues and condition flags of a candidate certificate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    /// Eigenvalues of the recomputed H or D
    pub certificate: EigenBounds,
    /// Eigenvalues of W
    pub w: EigenBounds,
    /// Eigenvalues of M = W⁻¹
    pub m: EigenBounds,
    /// Largest imaginary part seen in any eigenvalue
    pub max_imaginary: f64,
    /// Tolerance the checks were evaluated with
    pub tolerance: f64,
    /// Condition flags
    pub checks: VerificationChecks,
}

impl VerificationReport {
    /// Whether an eigenvalue had an imaginary part above tolerance.
    pub fn asymmetric(&self) -> bool {
        self.max_imaginary > self.tolerance
    }
}

/// Verification report plus the matrices it was computed from.
#[derive(Debug, Clone)]
pub struct Verified {
    /// The report
    pub report: VerificationReport,
    /// M = W⁻¹
    pub m: DMatrix<f64>,
}

/// Verify (W, ρ) against the template.
///
/// Fails with [`CertificateError::LinearAlgebra`] when W is numerically
/// singular; failing conditions are reported in the flags, not as errors.
pub fn verify(
    template: &CertificateTemplate,
    bounds: &Bounds,
    w: &DMatrix<f64>,
    rho: f64,
    tol: f64,
    singular_tol: f64,
) -> CertificateResult<Verified> {
    let (w_eig, w_imag) = eigen_bounds(w);
    let scale = w_eig.min.abs().max(w_eig.max.abs());
    let smallest = smallest_magnitude_eigenvalue(w);
    if !(scale > 0.0) || smallest <= singular_tol * scale {
        return Err(CertificateError::LinearAlgebra(format!(
            "W is singular (smallest |eigenvalue| {:.3e}, largest {:.3e})",
            smallest, scale
        )));
    }
    let m = w
        .clone()
        .try_inverse()
        .ok_or_else(|| CertificateError::LinearAlgebra("W is not invertible".into()))?;

    let cert = template.certificate_matrix(w, rho);
    log::trace!("certificate matrix = {}", cert);
    let (cert_eig, cert_imag) = eigen_bounds(&cert);
    let (m_eig, m_imag) = eigen_bounds(&m);
    let max_imaginary = w_imag.max(cert_imag).max(m_imag);

    let certificate_definite = match template.mode {
        CertificateMode::HMode => cert_eig.max <= tol,
        CertificateMode::DMode => cert_eig.min >= -tol,
    };
    let checks = VerificationChecks {
        certificate_definite,
        w_positive_definite: w_eig.min >= -tol,
        w_lower_bound: w_eig.min >= bounds.alpha_min - tol,
        w_upper_bound: w_eig.max <= bounds.alpha_max + tol,
        rho_non_negative: rho >= -tol,
    };

    let report = VerificationReport {
        certificate: cert_eig,
        w: w_eig,
        m: m_eig,
        max_imaginary,
        tolerance: tol,
        checks,
    };
    if report.asymmetric() {
        log::warn!("eigenvalues with imaginary part {:.3e} indicate an asymmetric matrix", max_imaginary);
    }
    log::debug!(
        "verification: cert eig [{:.6e}, {:.6e}], W eig [{:.6e}, {:.6e}], rho {:.6e}, checks {:?}",
        cert_eig.min,
        cert_eig.max,
        w_eig.min,
        w_eig.max,
        rho,
        checks
    );

    Ok(Verified { report, m })
}

/// Extreme real parts of the eigenvalues and the largest imaginary part.
fn eigen_bounds(a: &DMatrix<f64>) -> (EigenBounds, f64) {
    let eig = a.complex_eigenvalues();
    let mut bounds = EigenBounds {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };
    let mut max_imag = 0.0_f64;
    for z in eig.iter() {
        bounds.min = bounds.min.min(z.re);
        bounds.max = bounds.max.max(z.re);
        max_imag = max_imag.max(z.im.abs());
    }
    (bounds, max_imag)
}

fn smallest_magnitude_eigenvalue(a: &DMatrix<f64>) -> f64 {
    a.complex_eigenvalues()
        .iter()
        .map(|z| z.norm())
        .fold(f64::INFINITY, f64::min)
}
