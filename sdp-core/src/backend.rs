//! Pluggable solver backends.
//!
//! Both algorithms solve the same [`ProblemData`]; callers pick one through
//! [`SdpBackend`] and never depend on which is compiled in.

use crate::admm::solve_admm;
use crate::error::SdpResult;
use crate::problem::{ProblemData, SolveResult, SolverSettings};

/// A conic solver backend.
pub trait SdpBackend: Send + Sync {
    /// Short identifier reported in solve diagnostics.
    fn name(&self) -> &'static str;

    /// Solve `min q^T x  s.t.  A x + s = b, s ∈ K`.
    fn solve(&self, prob: &ProblemData, settings: &SolverSettings) -> SdpResult<SolveResult>;
}

/// Second-order backend: primal log-barrier interior point method.
#[cfg(feature = "interior-point")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BarrierBackend;

#[cfg(feature = "interior-point")]
impl SdpBackend for BarrierBackend {
    fn name(&self) -> &'static str {
        "barrier"
    }

    fn solve(&self, prob: &ProblemData, settings: &SolverSettings) -> SdpResult<SolveResult> {
        crate::ipm::solve_barrier(prob, settings)
    }
}

/// First-order backend: ADMM operator splitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmmBackend;

impl SdpBackend for AdmmBackend {
    fn name(&self) -> &'static str {
        "admm"
    }

    fn solve(&self, prob: &ProblemData, settings: &SolverSettings) -> SdpResult<SolveResult> {
        solve_admm(prob, settings)
    }
}

/// Whether the interior point backend was compiled in.
pub const fn interior_point_available() -> bool {
    cfg!(feature = "interior-point")
}

/// The most accurate backend available in this build.
pub fn preferred_backend() -> Box<dyn SdpBackend> {
    #[cfg(feature = "interior-point")]
    {
        Box::new(BarrierBackend)
    }
    #[cfg(not(feature = "interior-point"))]
    {
        Box::new(AdmmBackend)
    }
}
