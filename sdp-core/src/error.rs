//! Error types for the conic backends.

use thiserror::Error;

/// Errors that can occur while setting up or running a backend.
#[derive(Error, Debug)]
pub enum SdpError {
    /// Problem validation failed
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// A matrix that must be factorized could not be
    #[error("Factorization failed: {0}")]
    Factorization(String),

    /// Iterates left the domain or produced non-finite values
    #[error("Numerical failure: {0}")]
    Numerical(String),
}

/// Result type for backend operations.
pub type SdpResult<T> = Result<T, SdpError>;
