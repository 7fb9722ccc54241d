//! Request and input types for the certificate search.

mod mode;
mod request;

pub use mode::CertificateMode;
pub use request::{Bounds, CertificateInput, LmiRequest, SystemMatrices};
