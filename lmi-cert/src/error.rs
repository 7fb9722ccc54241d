//! Error types for the certificate search.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while searching for a certificate.
///
/// Only [`CertificateError::InvalidInput`] is returned as `Err` from
/// [`crate::solve_lmi`]; every other variant ends up inside a failed
/// [`crate::LmiResult`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CertificateError {
    /// Malformed request: shapes, non-finite values, inverted bounds
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backend finished but reported no usable solution
    #[error("Solver status: {status}")]
    SolverStatus {
        /// Normalized backend status
        status: String,
    },

    /// The backend returned an error or panicked
    #[error("Solver exception in {backend}: {message}")]
    SolverException {
        /// Backend that failed
        backend: String,
        /// Error or panic message
        message: String,
    },

    /// The returned W cannot be inverted
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),

    /// At least one verification condition does not hold
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

impl CertificateError {
    /// Machine-readable category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            CertificateError::InvalidInput(_) => FailureKind::InvalidInput,
            CertificateError::SolverStatus { .. } => FailureKind::SolverStatus,
            CertificateError::SolverException { .. } => FailureKind::SolverException,
            CertificateError::LinearAlgebra(_) => FailureKind::LinearAlgebra,
            CertificateError::VerificationFailed(_) => FailureKind::VerificationFailed,
        }
    }
}

/// Error category reported on a failed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// See [`CertificateError::InvalidInput`]
    InvalidInput,
    /// See [`CertificateError::SolverStatus`]
    SolverStatus,
    /// See [`CertificateError::SolverException`]
    SolverException,
    /// See [`CertificateError::LinearAlgebra`]
    LinearAlgebra,
    /// See [`CertificateError::VerificationFailed`]
    VerificationFailed,
}

/// Result type for certificate operations.
pub type CertificateResult<T> = Result<T, CertificateError>;
