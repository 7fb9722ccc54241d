//! First-order operator-splitting backend (ADMM).
//!
//! Splits `min q^T x  s.t.  A x + s = b, s ∈ K` into
//!
//! ```text
//! x ← argmin q^T x + (σ/2)||A x + s - b + u||²     (cached Cholesky of A^T A)
//! s ← Π_K(b - A x - u)                             (per-cone projection)
//! u ← u + A x + s - b                              (scaled dual, y = σ u)
//! ```
//!
//! The penalty σ is rebalanced from the residual ratio; because the x-update
//! system is A^T A, changing σ needs no refactorization.
//!
//! On an infeasible problem the iterates do not converge, but the dual
//! increment δy = σ(u_k - u_{k-1}) tends to a Farkas certificate
//! `δy ∈ K*, A^T δy = 0, b^T δy < 0`. Primal infeasibility is only reported
//! once that certificate checks out; a run that merely hits the iteration
//! cap ends in `MaxIters`.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use crate::cones::{build_cones, ConeKernel};
use crate::error::{SdpError, SdpResult};
use crate::linalg::{dense, sparse};
use crate::problem::{ProblemData, SolveInfo, SolveResult, SolveStatus, SolverSettings};

/// Residual checks (and σ updates) happen this often.
const CHECK_EVERY: usize = 10;
/// σ is rebalanced when one residual exceeds the other by this factor.
const BALANCE_RATIO: f64 = 10.0;
const SIGMA_MIN: f64 = 1e-6;
const SIGMA_MAX: f64 = 1e6;
/// Farkas certificate tolerance, relative to ‖δy‖∞.
const CERTIFICATE_TOL: f64 = 1e-5;

struct Residuals {
    primal: f64,
    dual: f64,
    gap: f64,
    eps_primal: f64,
    eps_dual: f64,
    eps_gap: f64,
}

impl Residuals {
    fn converged(&self) -> bool {
        self.primal <= self.eps_primal && self.dual <= self.eps_dual && self.gap <= self.eps_gap
    }
}

/// Solve a conic problem with ADMM.
pub fn solve_admm(prob: &ProblemData, settings: &SolverSettings) -> SdpResult<SolveResult> {
    prob.validate()?;
    let start = Instant::now();

    let n = prob.num_vars();
    let m = prob.num_constraints();
    let cones: Vec<Box<dyn ConeKernel>> = build_cones(&prob.cones);
    let offsets = prob.cone_offsets();
    let level = if settings.verbose { log::Level::Info } else { log::Level::Debug };

    // Normal matrix A^T A, factorized once.
    let columns = sparse::dense_columns(&prob.A);
    let gram = DMatrix::<f64>::from_fn(n, n, |i, j| sparse::dot(&columns[i], &columns[j]));
    let scale = gram.diagonal().amax().max(1.0);
    let chol = dense::factor_spd(&gram, 0.0)
        .or_else(|| dense::factor_spd(&gram, 1e-12 * scale))
        .ok_or_else(|| SdpError::Factorization("A^T A is not positive definite".into()))?;

    let project = |v: &[f64], out: &mut [f64]| {
        for (cone, &off) in cones.iter().zip(&offsets) {
            let r = off..off + cone.dim();
            cone.project(&v[r.clone()], &mut out[r]);
        }
    };

    let mut sigma = settings.admm_rho.clamp(SIGMA_MIN, SIGMA_MAX);
    let mut x = vec![0.0; n];
    let mut s = vec![0.0; m];
    project(&prob.b, &mut s);
    let mut u = vec![0.0; m];
    let mut u_prev = vec![0.0; m];

    let mut ax = vec![0.0; m];
    let mut v = vec![0.0; m];
    let mut s_prev = vec![0.0; m];
    let mut rhs = vec![0.0; n];
    let mut res = None;
    let mut infeasible = false;
    let mut iter = 0;

    while iter < settings.max_admm_iter {
        iter += 1;

        // x-update: A^T A x = A^T (b - s - u) - q / σ
        for i in 0..m {
            v[i] = prob.b[i] - s[i] - u[i];
        }
        sparse::spmv_transpose(&prob.A, &v, &mut rhs, 1.0, 0.0);
        for (r, qi) in rhs.iter_mut().zip(&prob.q) {
            *r -= qi / sigma;
        }
        let sol = chol.solve(&DVector::from_column_slice(&rhs));
        x.copy_from_slice(sol.as_slice());
        if x.iter().any(|xi| !xi.is_finite()) {
            return Err(SdpError::Numerical(format!("non-finite iterate at ADMM iteration {}", iter)));
        }

        // s-update
        sparse::spmv(&prob.A, &x, &mut ax, 1.0, 0.0);
        for i in 0..m {
            v[i] = prob.b[i] - ax[i] - u[i];
        }
        s_prev.copy_from_slice(&s);
        project(&v, &mut s);

        // u-update
        u_prev.copy_from_slice(&u);
        for i in 0..m {
            u[i] += ax[i] + s[i] - prob.b[i];
        }

        if iter % CHECK_EVERY != 0 && iter != settings.max_admm_iter {
            continue;
        }

        let r = residuals(prob, &x, &s, &s_prev, &u, &ax, sigma, settings.tol_feas, settings.tol_gap);
        log::log!(
            level,
            "admm: iter={} sigma={:.2e} pres={:.3e} dres={:.3e} gap={:.3e}",
            iter,
            sigma,
            r.primal,
            r.dual,
            r.gap
        );
        if r.converged() {
            res = Some(r);
            break;
        }
        if certifies_infeasibility(prob, &u, &u_prev, sigma, &project) {
            log::log!(level, "admm: dual increment certifies primal infeasibility at iter={}", iter);
            infeasible = true;
            res = Some(r);
            break;
        }

        // Residual balancing; the scaled dual u = y/σ must follow σ.
        let old_sigma = sigma;
        if r.primal > BALANCE_RATIO * r.dual {
            sigma = (sigma * 2.0).min(SIGMA_MAX);
        } else if r.dual > BALANCE_RATIO * r.primal {
            sigma = (sigma / 2.0).max(SIGMA_MIN);
        }
        if sigma != old_sigma {
            let ratio = old_sigma / sigma;
            u.iter_mut().for_each(|ui| *ui *= ratio);
            u_prev.iter_mut().for_each(|ui| *ui *= ratio);
        }
        res = Some(r);
    }

    let r = match res {
        Some(r) => r,
        None => residuals(prob, &x, &s, &s_prev, &u, &ax, sigma, settings.tol_feas, settings.tol_gap),
    };
    let status = if infeasible {
        SolveStatus::PrimalInfeasible
    } else if r.converged() {
        SolveStatus::Optimal
    } else {
        let loose = settings.tol_feas_inaccurate / settings.tol_feas.max(f64::MIN_POSITIVE);
        if r.primal <= r.eps_primal * loose && r.dual <= r.eps_dual * loose {
            SolveStatus::AlmostOptimal
        } else {
            SolveStatus::MaxIters
        }
    };

    let z: Vec<f64> = u.iter().map(|ui| sigma * ui).collect();
    let obj_val = sparse::dot(&prob.q, &x);
    let info = SolveInfo {
        iters: iter,
        phase1_iters: 0,
        solve_time: start.elapsed(),
        primal_res: r.primal,
        dual_res: r.dual,
        gap: r.gap,
    };
    log::info!(
        "admm: {} obj={:.6e} pres={:.2e} dres={:.2e} iters={}",
        status,
        obj_val,
        r.primal,
        r.dual,
        iter
    );

    Ok(SolveResult { status, x, s, z, obj_val, info })
}

/// Check whether δy = σ(u - u_prev) is a Farkas certificate of primal
/// infeasibility: δy ∈ K* (K is self-dual), A^T δy = 0 and b^T δy < 0, each
/// up to `CERTIFICATE_TOL` relative to ‖δy‖∞.
fn certifies_infeasibility(
    prob: &ProblemData,
    u: &[f64],
    u_prev: &[f64],
    sigma: f64,
    project: &dyn Fn(&[f64], &mut [f64]),
) -> bool {
    let dy: Vec<f64> = u.iter().zip(u_prev).map(|(a, b)| sigma * (a - b)).collect();
    let norm = sparse::norm_inf(&dy);
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    let tol = CERTIFICATE_TOL * norm;

    let mut proj = vec![0.0; dy.len()];
    project(&dy, &mut proj);
    let cone_err = dy.iter().zip(&proj).fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));

    let mut aty = vec![0.0; prob.num_vars()];
    sparse::spmv_transpose(&prob.A, &dy, &mut aty, 1.0, 0.0);

    cone_err <= tol && sparse::norm_inf(&aty) <= tol && sparse::dot(&prob.b, &dy) < -tol
}

#[allow(clippy::too_many_arguments)]
fn residuals(
    prob: &ProblemData,
    x: &[f64],
    s: &[f64],
    s_prev: &[f64],
    u: &[f64],
    ax: &[f64],
    sigma: f64,
    tol_feas: f64,
    tol_gap: f64,
) -> Residuals {
    let m = prob.num_constraints();
    let n = prob.num_vars();

    let mut r_prim = vec![0.0; m];
    for i in 0..m {
        r_prim[i] = ax[i] + s[i] - prob.b[i];
    }

    let ds: Vec<f64> = s.iter().zip(s_prev).map(|(a, b)| a - b).collect();
    let mut r_dual = vec![0.0; n];
    sparse::spmv_transpose(&prob.A, &ds, &mut r_dual, sigma, 0.0);

    let y: Vec<f64> = u.iter().map(|ui| sigma * ui).collect();
    let mut aty = vec![0.0; n];
    sparse::spmv_transpose(&prob.A, &y, &mut aty, 1.0, 0.0);

    let primal_obj = sparse::dot(&prob.q, x);
    let dual_obj = -sparse::dot(&prob.b, &y);

    let norm_b = sparse::norm2(&prob.b);
    let norm_q = sparse::norm2(&prob.q);
    Residuals {
        primal: sparse::norm2(&r_prim),
        dual: sparse::norm2(&r_dual),
        gap: (primal_obj - dual_obj).abs(),
        eps_primal: tol_feas * (1.0 + norm_b.max(sparse::norm2(ax)).max(sparse::norm2(s))),
        eps_dual: tol_feas * (1.0 + norm_q.max(sparse::norm2(&aty))),
        eps_gap: tol_gap * (1.0 + primal_obj.abs().max(dual_obj.abs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConeSpec;

    #[test]
    fn test_admm_box_lp() {
        // min x  s.t.  1 ≤ x ≤ 3
        let prob = ProblemData {
            q: vec![1.0],
            A: sparse::from_triplets(2, 1, vec![(0, 0, -1.0), (1, 0, 1.0)]),
            b: vec![-1.0, 3.0],
            cones: vec![ConeSpec::NonNeg { dim: 2 }],
        };
        let result = solve_admm(&prob, &SolverSettings::default()).expect("admm runs");
        assert!(result.status.has_solution(), "status {:?}", result.status);
        assert!((result.x[0] - 1.0).abs() < 1e-4, "x = {}", result.x[0]);
    }

    #[test]
    fn test_admm_two_by_two_lmi() {
        // min t  s.t.  [[t, 1], [1, t]] ⪰ 0, optimum t = 1
        let prob = ProblemData {
            q: vec![1.0],
            A: sparse::from_triplets(3, 1, vec![(0, 0, -1.0), (2, 0, -1.0)]),
            b: vec![0.0, std::f64::consts::SQRT_2, 0.0],
            cones: vec![ConeSpec::Psd { n: 2 }],
        };
        let result = solve_admm(&prob, &SolverSettings::default()).expect("admm runs");
        assert!(result.status.has_solution(), "status {:?}", result.status);
        assert!((result.x[0] - 1.0).abs() < 1e-3, "t = {}", result.x[0]);
    }

    #[test]
    fn test_admm_flags_infeasible_box() {
        // x ≥ 2 and x ≤ 1
        let prob = ProblemData {
            q: vec![0.0],
            A: sparse::from_triplets(2, 1, vec![(0, 0, -1.0), (1, 0, 1.0)]),
            b: vec![-2.0, 1.0],
            cones: vec![ConeSpec::NonNeg { dim: 2 }],
        };
        let settings = SolverSettings { max_admm_iter: 2000, ..Default::default() };
        let result = solve_admm(&prob, &settings).expect("admm runs");
        assert_eq!(result.status, SolveStatus::PrimalInfeasible);
        assert!(result.info.iters < 2000, "certificate found after {} iterations", result.info.iters);
    }

    #[test]
    fn test_admm_iteration_cap_is_not_infeasibility() {
        // Feasible LMI stopped long before convergence
        let prob = ProblemData {
            q: vec![1.0],
            A: sparse::from_triplets(3, 1, vec![(0, 0, -1.0), (2, 0, -1.0)]),
            b: vec![0.0, std::f64::consts::SQRT_2, 0.0],
            cones: vec![ConeSpec::Psd { n: 2 }],
        };
        for cap in [5, 10, 20] {
            let settings = SolverSettings { max_admm_iter: cap, ..Default::default() };
            let result = solve_admm(&prob, &settings).expect("admm runs");
            assert_ne!(result.status, SolveStatus::PrimalInfeasible, "cap {}", cap);
            assert_eq!(result.info.iters, cap);
        }
    }

    #[test]
    fn test_farkas_certificate_check() {
        let project = |v: &[f64], out: &mut [f64]| {
            for (o, &vi) in out.iter_mut().zip(v) {
                *o = vi.max(0.0);
            }
        };
        let infeasible = ProblemData {
            q: vec![0.0],
            A: sparse::from_triplets(2, 1, vec![(0, 0, -1.0), (1, 0, 1.0)]),
            b: vec![-2.0, 1.0],
            cones: vec![ConeSpec::NonNeg { dim: 2 }],
        };
        // y = (1, 1): A^T y = 0 and b^T y = -1
        assert!(certifies_infeasibility(&infeasible, &[3.0, 3.0], &[1.0, 1.0], 0.5, &project));
        // Not in the dual cone
        assert!(!certifies_infeasibility(&infeasible, &[-1.0, -1.0], &[0.0, 0.0], 1.0, &project));
        // No increment
        assert!(!certifies_infeasibility(&infeasible, &[1.0, 1.0], &[1.0, 1.0], 1.0, &project));

        let feasible = ProblemData { b: vec![-1.0, 3.0], ..infeasible };
        assert!(!certifies_infeasibility(&feasible, &[1.0, 1.0], &[0.0, 0.0], 1.0, &project));
    }
}
