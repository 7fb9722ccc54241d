//! Cone kernel implementations.
//!
//! This module provides the cone kernels (barrier functions, interior tests,
//! step-to-boundary and Euclidean projection) for the two cone types an LMI
//! problem lowers into.

pub mod nonneg;
pub mod psd;
pub mod traits;

pub use nonneg::NonNegCone;
pub use psd::PsdCone;
pub use traits::ConeKernel;

use crate::problem::ConeSpec;

/// Build cone kernels from cone specs.
pub fn build_cones(specs: &[ConeSpec]) -> Vec<Box<dyn ConeKernel>> {
    specs
        .iter()
        .map(|spec| -> Box<dyn ConeKernel> {
            match spec {
                ConeSpec::NonNeg { dim } => Box::new(NonNegCone::new(*dim)),
                ConeSpec::Psd { n } => Box::new(PsdCone::new(*n)),
            }
        })
        .collect()
}
