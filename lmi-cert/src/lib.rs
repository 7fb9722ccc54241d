//! Stability-certificate search via linear matrix inequalities.
//!
//! Given a linear system (A, B), a weighting Q and spectral bounds, this
//! crate looks for a symmetric W and a scalar ρ ≥ 0 with
//! α_min·I ⪯ W ⪯ α_max·I and one of two certificate inequalities:
//!
//! - **H mode**: `A W + W Aᵀ - ρ B Bᵀ + 2λ W ≺ 0`
//! - **D mode**: `[[-W Aᵀ - A W + ρ B Bᵀ, W Lᵀ], [L W, I]] ⪰ 0` with Q = Lᵀ L
//!
//! minimizing ρ. The pipeline runs strictly forward:
//!
//! ```text
//! preprocess  →  build  →  solve (sdp-core)  →  verify  →  assemble
//! ```
//!
//! # Example
//!
//! ```
//! use lmi_cert::{solve_lmi, CertificateSettings, LmiRequest};
//!
//! let request: LmiRequest = serde_json::from_str(r#"{
//!     "matrix_a": [[-1.0, 0.0], [0.0, -1.0]],
//!     "matrix_b": [[1.0], [0.0]],
//!     "matrix_q": [1.0, 1.0],
//!     "alpha_min": 0.1,
//!     "alpha_max": 10.0,
//!     "n": 2,
//!     "lambda_val": 0.5
//! }"#).unwrap();
//!
//! let result = solve_lmi(&request, &CertificateSettings::default()).unwrap();
//! assert!(result.feasible);
//! ```

#![warn(missing_docs)]

pub mod adapter;
pub mod builder;
pub mod certificate;
pub mod error;
pub mod model;
pub mod preprocess;
pub mod result;
pub mod settings;
pub mod verify;

pub use adapter::{OutcomeStatus, SolverAdapter, SolverOutcome};
pub use error::{CertificateError, CertificateResult, FailureKind};
pub use model::{Bounds, CertificateInput, CertificateMode, LmiRequest, SystemMatrices};
pub use preprocess::FactorizationKind;
pub use result::{
    CertificateEigenvalues, FailedSolve, FeasibleCertificate, LmiOutcome, LmiResult, SolveWarning,
    SolverInfo,
};
pub use settings::{BackendChoice, CertificateSettings};
pub use verify::{EigenBounds, VerificationChecks, VerificationReport};

use certificate::CertificateTemplate;
use preprocess::preprocess;
use result::ResultAssembler;

/// Validate a request and search for its certificate.
///
/// Malformed requests are rejected with [`CertificateError::InvalidInput`]
/// before any numerics run. Every other failure is reported inside the
/// returned [`LmiResult`].
pub fn solve_lmi(request: &LmiRequest, settings: &CertificateSettings) -> CertificateResult<LmiResult> {
    let input = request.validate()?;
    Ok(solve_certificate(&input, settings))
}

/// Search for a certificate of an already validated input.
pub fn solve_certificate(input: &CertificateInput, settings: &CertificateSettings) -> LmiResult {
    let mode = input.mode;
    log::info!(
        "{} search: n = {}, m = {}, alpha in [{}, {}], lambda = {}",
        mode,
        input.system.order(),
        input.system.b.ncols(),
        input.bounds.alpha_min,
        input.bounds.alpha_max,
        input.lambda
    );
    log::trace!("A = {}", input.system.a);
    log::trace!("B = {}", input.system.b);

    let mut assembler = ResultAssembler::new(mode);

    let pre = preprocess(&input.system);
    if pre.kind == FactorizationKind::DiagonalFallback {
        assembler.warn(SolveWarning::FactorizationFallback {
            message: "Q is not positive definite; L = diag(sqrt(diag(Q))) used".into(),
        });
    }
    let template = CertificateTemplate::new(input, &pre);

    let adapter = SolverAdapter::new(settings.backend);
    if adapter.downgraded() {
        assembler.warn(SolveWarning::BackendDowngraded {
            requested: format!("{:?}", adapter.requested()),
            used: adapter.backend_name().to_string(),
        });
    }

    let outcome = adapter.solve(&template, &input.bounds, settings);
    let info = SolverInfo::from(&outcome);
    let point = match outcome.solved_point() {
        Ok(point) => point,
        Err(err) => {
            log::info!("{} search failed: {}", mode, err);
            return assembler.failed(&err, Some(info), None);
        }
    };

    let verified = match verify::verify(
        &template,
        &input.bounds,
        &point.w,
        point.rho,
        settings.verify_tol,
        settings.singular_tol,
    ) {
        Ok(verified) => verified,
        Err(err) => {
            log::info!("{} search failed: {}", mode, err);
            return assembler.failed(&err, Some(info), None);
        }
    };

    if verified.report.asymmetric() {
        assembler.warn(SolveWarning::Asymmetry {
            max_imaginary: verified.report.max_imaginary,
        });
    }

    let failed = verified.report.checks.failed();
    if !failed.is_empty() {
        let err = CertificateError::VerificationFailed(failed.join(", "));
        log::info!("{} search failed: {}", mode, err);
        return assembler.failed(&err, Some(info), Some(verified.report));
    }

    log::info!("{} certificate found: rho = {:.6e}", mode, point.rho);
    assembler.feasible(&point.w, &verified.m, point.rho, info, verified.report)
}
