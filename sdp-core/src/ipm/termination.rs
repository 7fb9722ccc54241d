//! Termination criteria for the barrier method.
//!
//! Checks for:
//! - Optimality: centered point with ν/t below the gap tolerance
//! - Primal infeasibility: phase I shift τ bounded away from zero
//! - Unbounded objective: iterates diverge
//! - Numerical trouble: stalled centering, exhausted Newton budget

use crate::problem::{SolveStatus, SolverSettings};

/// How a path-following run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathEnd {
    /// Gap target met (phase II).
    Converged,
    /// A strictly feasible point was found (phase I).
    FoundInterior,
    /// Phase I proved there is no strictly feasible point.
    Infeasible,
    /// Centering could not make progress.
    Stalled,
    /// Iterates ran off to infinity.
    Diverged,
    /// Newton budget used up.
    BudgetExhausted,
}

/// Verdict of phase I after a centering step on the augmented problem.
///
/// On the central path τ(t) overestimates the optimal shift τ* by at most
/// ν/t, so `τ - ν/t > 0` certifies that no strictly feasible point exists.
pub(crate) fn phase1_verdict(tau: f64, gap: f64, settings: &SolverSettings) -> Option<PathEnd> {
    if tau < 0.0 {
        return Some(PathEnd::FoundInterior);
    }
    if tau - gap > settings.tol_infeas {
        return Some(PathEnd::Infeasible);
    }
    if gap <= settings.tol_gap {
        // τ* ∈ [τ - gap, τ] with τ ≥ 0: the feasible set has no interior.
        return Some(PathEnd::Infeasible);
    }
    None
}

/// Final phase I outcome once the original slack at the last iterate has
/// been tested. A strictly feasible point ends phase I whatever stopped the
/// path.
pub(crate) fn phase1_outcome(end: PathEnd, interior: bool) -> PathEnd {
    if interior {
        PathEnd::FoundInterior
    } else {
        end
    }
}

/// Gap target for phase II relative to the objective magnitude.
pub(crate) fn gap_converged(gap: f64, obj: f64, tol: f64) -> bool {
    gap <= tol * obj.abs().max(1.0)
}

/// Map the end of phase II to a solve status.
pub(crate) fn phase2_status(end: PathEnd, gap: f64, obj: f64, settings: &SolverSettings) -> SolveStatus {
    match end {
        PathEnd::Converged => SolveStatus::Optimal,
        PathEnd::Diverged => SolveStatus::Unbounded,
        PathEnd::Stalled | PathEnd::BudgetExhausted => {
            if gap_converged(gap, obj, settings.tol_gap) {
                SolveStatus::Optimal
            } else if gap_converged(gap, obj, settings.tol_gap_inaccurate) {
                SolveStatus::AlmostOptimal
            } else if end == PathEnd::BudgetExhausted {
                SolveStatus::MaxIters
            } else {
                SolveStatus::NumericalError
            }
        }
        PathEnd::FoundInterior | PathEnd::Infeasible => SolveStatus::NumericalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase1_verdicts() {
        let settings = SolverSettings::default();
        assert_eq!(phase1_verdict(-1e-3, 1.0, &settings), Some(PathEnd::FoundInterior));
        assert_eq!(phase1_verdict(0.5, 0.1, &settings), Some(PathEnd::Infeasible));
        assert_eq!(phase1_verdict(0.5, 1.0, &settings), None);
        assert_eq!(phase1_verdict(0.0, 1e-12, &settings), Some(PathEnd::Infeasible));
    }

    #[test]
    fn test_phase1_interior_point_overrides_path_end() {
        assert_eq!(phase1_outcome(PathEnd::BudgetExhausted, true), PathEnd::FoundInterior);
        assert_eq!(phase1_outcome(PathEnd::Stalled, true), PathEnd::FoundInterior);
        assert_eq!(phase1_outcome(PathEnd::BudgetExhausted, false), PathEnd::BudgetExhausted);
        assert_eq!(phase1_outcome(PathEnd::Infeasible, false), PathEnd::Infeasible);
        // A verdict of FoundInterior without an interior slack is left for the caller.
        assert_eq!(phase1_outcome(PathEnd::FoundInterior, false), PathEnd::FoundInterior);
    }

    #[test]
    fn test_phase2_stall_with_small_gap_is_almost_optimal() {
        let settings = SolverSettings::default();
        let status = phase2_status(PathEnd::Stalled, 1e-6, 0.0, &settings);
        assert_eq!(status, SolveStatus::AlmostOptimal);
        let status = phase2_status(PathEnd::BudgetExhausted, 1.0, 0.0, &settings);
        assert_eq!(status, SolveStatus::MaxIters);
        let status = phase2_status(PathEnd::Diverged, 1.0, -1e13, &settings);
        assert_eq!(status, SolveStatus::Unbounded);
    }
}
