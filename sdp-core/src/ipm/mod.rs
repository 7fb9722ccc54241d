//! Log-barrier interior point method.
//!
//! A primal barrier method for `min q^T x  s.t.  b - A x ∈ K`:
//!
//! 1. **Phase I** minimizes an auxiliary shift τ until a strictly feasible
//!    point appears, or proves that none exists. The run stops at the first
//!    Newton iterate whose original slack is interior.
//! 2. **Phase II** follows the central path: Newton centering of
//!    `t q^T x + φ(b - A x)` followed by `t ← μ t`, until the duality gap
//!    ν/t meets the tolerance. The starting t is fitted to the phase I
//!    point so that the first centering does not undo it.
//!
//! The dual estimate z = -∇φ(s)/t satisfies `q + A^T z ≈ 0` on the path, so
//! the returned (x, s, z) carries its own optimality certificate.

mod phase1;
mod termination;
mod workspace;

use std::time::Instant;

use crate::error::SdpResult;
use crate::linalg::sparse;
use crate::problem::{ProblemData, SolveInfo, SolveResult, SolveStatus, SolverSettings};

use termination::{gap_converged, phase1_outcome, phase1_verdict, phase2_status, PathEnd};
use workspace::{BarrierWorkspace, CenterOutcome, IterBudget};

/// Initial barrier parameter for phase I, and the ceiling of the fitted
/// phase II start.
const T_INIT: f64 = 1.0;
/// Floor of the fitted phase II start.
const T_FLOOR: f64 = 1e-6;

/// Solve a conic problem with the barrier method.
pub fn solve_barrier(prob: &ProblemData, settings: &SolverSettings) -> SdpResult<SolveResult> {
    prob.validate()?;
    let start = Instant::now();
    let mut budget = IterBudget::new(settings.max_iter);

    let ws = BarrierWorkspace::new(prob);
    let n = prob.num_vars();
    let mut x = vec![0.0; n];

    // ---------------- Phase I ----------------
    let s0 = ws.slack(&x);
    if !ws.is_interior(&s0) {
        let aug = phase1::augmented_problem(prob);
        let aug_ws = BarrierWorkspace::new(&aug);
        let tau0 = ws.infeasibility_shift(&s0).max(0.0) + 1.0;
        let mut x_aug = vec![0.0; n + 1];
        x_aug[n] = tau0;

        let found = |x: &[f64]| x[n] < 0.0 && ws.is_interior(&ws.slack(&x[..n]));
        let (end, t) = follow_path(
            &aug_ws,
            &mut x_aug,
            T_INIT,
            settings,
            &mut budget,
            "phase1",
            Some(&found),
            |x, gap| phase1_verdict(x[n], gap, settings),
        );
        let end = phase1_outcome(end, ws.is_interior(&ws.slack(&x_aug[..n])));
        let phase1_iters = budget.used;
        log::debug!(
            "barrier phase I ended with {:?} after {} Newton steps (tau = {:.3e})",
            end,
            phase1_iters,
            x_aug[n]
        );

        x.copy_from_slice(&x_aug[..n]);
        let status = match end {
            PathEnd::FoundInterior => None,
            PathEnd::Infeasible => Some(SolveStatus::PrimalInfeasible),
            PathEnd::BudgetExhausted => Some(SolveStatus::MaxIters),
            _ => Some(SolveStatus::NumericalError),
        };
        if let Some(status) = status {
            let s = ws.slack(&x);
            let info = SolveInfo {
                iters: budget.used,
                phase1_iters,
                solve_time: start.elapsed(),
                primal_res: ws.infeasibility_shift(&s).max(0.0),
                dual_res: f64::NAN,
                gap: aug_ws.degree() / t,
            };
            log::info!("barrier: {} (shift {:.3e})", status, x_aug[n]);
            return Ok(SolveResult {
                status,
                x,
                s,
                z: vec![0.0; prob.num_constraints()],
                obj_val: f64::INFINITY,
                info,
            });
        }
        if !ws.is_interior(&ws.slack(&x)) {
            log::warn!("barrier: phase I point lost strict feasibility to rounding");
            return Ok(failed_result(prob, x, SolveStatus::NumericalError, budget.used, start));
        }
    }
    let phase1_iters = budget.used;

    // ---------------- Phase II ----------------
    let t0 = ws.central_path_fit(&x).map_or(T_INIT, |t| t.clamp(T_FLOOR, T_INIT));
    log::debug!("barrier phase II starts at t = {:.3e}", t0);
    let (end, t) = follow_path(&ws, &mut x, t0, settings, &mut budget, "phase2", None, |x, gap| {
        let obj = sparse::dot(&prob.q, x);
        gap_converged(gap, obj, settings.tol_gap).then_some(PathEnd::Converged)
    });

    let s = ws.slack(&x);
    let obj_val = sparse::dot(&prob.q, &x);
    let gap = ws.degree() / t;
    let status = phase2_status(end, gap, obj_val, settings);

    let z = ws.dual_estimate(&s, t);
    let mut residual = s.clone();
    sparse::spmv(&prob.A, &x, &mut residual, 1.0, 1.0);
    residual.iter_mut().zip(&prob.b).for_each(|(r, bi)| *r -= bi);

    let info = SolveInfo {
        iters: budget.used,
        phase1_iters,
        solve_time: start.elapsed(),
        primal_res: sparse::norm2(&residual),
        dual_res: if status == SolveStatus::Unbounded { f64::NAN } else { ws.dual_residual(&z) },
        gap: if status == SolveStatus::Unbounded { f64::NAN } else { sparse::dot(&s, &z) },
    };
    log::info!(
        "barrier: {} obj={:.6e} gap={:.2e} newton_steps={} (phase I {})",
        status,
        obj_val,
        info.gap,
        info.iters,
        phase1_iters
    );

    Ok(SolveResult { status, x, s, z, obj_val, info })
}

/// Follow the central path from a strictly feasible x until `check` stops it.
///
/// `check` sees every centered point together with its gap ν/t; `stop` is
/// tested after every Newton step and ends the run with
/// [`PathEnd::FoundInterior`]. Returns how the run ended and the last
/// barrier parameter.
#[allow(clippy::too_many_arguments)]
fn follow_path<F>(
    ws: &BarrierWorkspace<'_>,
    x: &mut Vec<f64>,
    t_start: f64,
    settings: &SolverSettings,
    budget: &mut IterBudget,
    label: &str,
    stop: Option<&dyn Fn(&[f64]) -> bool>,
    mut check: F,
) -> (PathEnd, f64)
where
    F: FnMut(&[f64], f64) -> Option<PathEnd>,
{
    let mu = settings.barrier_mu.max(1.5);
    let level = if settings.verbose { log::Level::Info } else { log::Level::Debug };
    let mut t = t_start;

    loop {
        let before = budget.used;
        let outcome = ws.center(x, t, budget, stop);
        let gap = ws.degree() / t;
        log::log!(
            level,
            "{}: t={:.3e} gap={:.3e} obj={:.6e} newton={} {:?}",
            label,
            t,
            gap,
            sparse::dot(&ws.problem().q, x),
            budget.used - before,
            outcome
        );

        match outcome {
            CenterOutcome::Centered => {
                if let Some(end) = check(x, gap) {
                    return (end, t);
                }
            }
            CenterOutcome::Interrupted => return (PathEnd::FoundInterior, t),
            CenterOutcome::Stalled => return (PathEnd::Stalled, t),
            CenterOutcome::Diverged => return (PathEnd::Diverged, t),
            CenterOutcome::BudgetExhausted => return (PathEnd::BudgetExhausted, t),
        }

        t *= mu;
    }
}

fn failed_result(
    prob: &ProblemData,
    x: Vec<f64>,
    status: SolveStatus,
    iters: usize,
    start: Instant,
) -> SolveResult {
    SolveResult {
        status,
        s: vec![0.0; prob.num_constraints()],
        z: vec![0.0; prob.num_constraints()],
        x,
        obj_val: f64::INFINITY,
        info: SolveInfo {
            iters,
            solve_time: start.elapsed(),
            ..SolveInfo::default()
        },
    }
}
