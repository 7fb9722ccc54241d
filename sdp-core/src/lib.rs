//! sdp-core: a small conic solver for linear matrix inequalities
//!
//! This library solves problems of the form
//!
//! ```text
//! minimize    q^T x
//! subject to  A x + s = b
//!             s ∈ K
//! ```
//!
//! where K is a product of nonnegative orthants and positive semidefinite
//! cones (PSD blocks stored in scaled `svec` form). Two backends are provided:
//!
//! - **Barrier** (feature `interior-point`, on by default): a primal
//!   log-barrier interior point method with a phase I feasibility search.
//!   Converges to high accuracy in a few dozen Newton steps.
//! - **ADMM**: first-order operator splitting with projection onto K.
//!   Always available; lower accuracy.
//!
//! # Example
//!
//! ```
//! use sdp_core::{linalg::sparse, solve, ConeSpec, ProblemData, SolverSettings};
//!
//! // min t  s.t.  [[t, 1], [1, t]] ⪰ 0
//! let prob = ProblemData {
//!     q: vec![1.0],
//!     A: sparse::from_triplets(3, 1, vec![(0, 0, -1.0), (2, 0, -1.0)]),
//!     b: vec![0.0, std::f64::consts::SQRT_2, 0.0],
//!     cones: vec![ConeSpec::Psd { n: 2 }],
//! };
//!
//! let result = solve(&prob, &SolverSettings::default()).unwrap();
//! assert!(result.status.has_solution());
//! assert!((result.x[0] - 1.0).abs() < 1e-3);
//! ```

#![warn(clippy::all)]

pub mod admm;
pub mod backend;
pub mod cones;
pub mod error;
#[cfg(feature = "interior-point")]
pub mod ipm;
pub mod linalg;
pub mod problem;

// Re-export main types
pub use backend::{interior_point_available, preferred_backend, AdmmBackend, SdpBackend};
#[cfg(feature = "interior-point")]
pub use backend::BarrierBackend;
pub use error::{SdpError, SdpResult};
pub use problem::{
    ConeSpec, ProblemData, SolveInfo, SolveResult, SolveStatus, SolverSettings, SparseCsc,
};

/// Main solve entry point.
///
/// Solves with the most accurate backend compiled into this build.
pub fn solve(prob: &ProblemData, settings: &SolverSettings) -> SdpResult<SolveResult> {
    preferred_backend().solve(prob, settings)
}
