//! Barrier workspace: slack evaluation, Newton directions and line search.
//!
//! For the problem `min q^T x  s.t.  s = b - A x ∈ K` the centering
//! objective at barrier parameter t is
//!
//! ```text
//! f_t(x) = t q^T x + Σ_j φ_j(b_j - A_j x)
//! ```
//!
//! with gradient `t q - A^T ∇φ(s)` and Hessian `A^T ∇²φ(s) A`. The Hessian
//! is the Gram matrix of `J = W A` for a factor `∇²φ = WᵀW`, and Newton
//! systems are solved through a QR decomposition of J.

use nalgebra::{DMatrix, DVector};

use crate::cones::{build_cones, ConeKernel};
use crate::linalg::{dense, sparse};
use crate::problem::ProblemData;

/// Armijo sufficient-decrease constant.
const ARMIJO: f64 = 0.01;
/// Backtracking factor.
const BACKTRACK: f64 = 0.5;
/// Fraction of the step to the boundary that is actually taken.
const BOUNDARY_FRACTION: f64 = 0.99;
/// Backtracking steps before the line search gives up.
const LINE_SEARCH_MAX_ITERS: usize = 60;
/// Centering stops once λ²/2 falls below this.
const NEWTON_TOL: f64 = 1e-10;
/// Decrement accepted as centered when the line search can no longer make progress.
const NEWTON_TOL_LOOSE: f64 = 1e-6;
/// Iterates beyond this norm are taken as evidence of an unbounded objective.
const DIVERGENCE_NORM: f64 = 1e12;
/// Newton steps allowed for a single centering run.
const MAX_CENTERING_STEPS: usize = 50;
/// Decrement accepted as centered when a run hits `MAX_CENTERING_STEPS`.
const NEWTON_TOL_CAPPED: f64 = 1e-4;

/// Newton direction for the centering objective.
pub(crate) struct NewtonStep {
    pub dx: Vec<f64>,
    /// Directional derivative g^T dx (negative for a descent step).
    pub slope: f64,
    /// Squared Newton decrement λ² = -g^T dx.
    pub decrement_sq: f64,
}

/// Factored Newton matrix `A^T ∇²φ(s) A` at a fixed slack, together with the
/// pulled-back barrier gradient `A^T ∇φ(s)`.
pub(crate) struct NewtonSystem {
    factor: NewtonFactor,
    barrier_grad: Vec<f64>,
}

enum NewtonFactor {
    /// R from a QR decomposition of J.
    Gram(DMatrix<f64>),
    /// Assembled Hessian, used when J has no full-rank QR.
    Hessian(DMatrix<f64>),
}

impl NewtonSystem {
    fn solve(&self, rhs: &[f64]) -> Option<Vec<f64>> {
        let rhs = DVector::from_column_slice(rhs);
        let x = match &self.factor {
            NewtonFactor::Gram(r) => dense::solve_gram(r, &rhs),
            NewtonFactor::Hessian(h) => dense::solve_spd(h, &rhs),
        }?;
        Some(x.as_slice().to_vec())
    }
}

/// How a centering run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CenterOutcome {
    Centered,
    Stalled,
    Diverged,
    BudgetExhausted,
    /// The caller's stop condition held after a step.
    Interrupted,
}

/// Shared Newton-step budget across phases.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IterBudget {
    pub used: usize,
    pub limit: usize,
}

impl IterBudget {
    pub fn new(limit: usize) -> Self {
        Self { used: 0, limit }
    }

    fn exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// Problem view specialized for the barrier method.
pub(crate) struct BarrierWorkspace<'a> {
    prob: &'a ProblemData,
    cones: Vec<Box<dyn ConeKernel>>,
    offsets: Vec<usize>,
    columns: Vec<Vec<f64>>,
    degree: f64,
}

impl<'a> BarrierWorkspace<'a> {
    pub fn new(prob: &'a ProblemData) -> Self {
        let cones = build_cones(&prob.cones);
        let degree = cones.iter().map(|c| c.barrier_degree()).sum::<usize>() as f64;
        Self {
            prob,
            cones,
            offsets: prob.cone_offsets(),
            columns: sparse::dense_columns(&prob.A),
            degree,
        }
    }

    /// Total barrier degree ν; the duality gap on the central path is ν/t.
    pub fn degree(&self) -> f64 {
        self.degree
    }

    pub fn problem(&self) -> &ProblemData {
        self.prob
    }

    fn blocks(&self) -> impl Iterator<Item = (&dyn ConeKernel, std::ops::Range<usize>)> + '_ {
        self.cones
            .iter()
            .zip(&self.offsets)
            .map(|(cone, &off)| (cone.as_ref(), off..off + cone.dim()))
    }

    /// s = b - A x
    pub fn slack(&self, x: &[f64]) -> Vec<f64> {
        let mut s = self.prob.b.clone();
        sparse::spmv(&self.prob.A, x, &mut s, -1.0, 1.0);
        s
    }

    /// Largest shift τ needed so that s + τ e is interior, i.e. -min_j λ_min(s_j).
    pub fn infeasibility_shift(&self, s: &[f64]) -> f64 {
        self.blocks()
            .map(|(cone, r)| -cone.min_eigenvalue(&s[r]))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn is_interior(&self, s: &[f64]) -> bool {
        self.blocks().all(|(cone, r)| cone.is_interior(&s[r]))
    }

    fn barrier(&self, s: &[f64]) -> f64 {
        self.blocks().map(|(cone, r)| cone.barrier_value(&s[r])).sum()
    }

    /// Centering objective f_t(x), +∞ outside the domain.
    fn merit(&self, x: &[f64], s: &[f64], t: f64) -> f64 {
        let phi = self.barrier(s);
        if !phi.is_finite() {
            return f64::INFINITY;
        }
        t * sparse::dot(&self.prob.q, x) + phi
    }

    /// Factor the Newton matrix at s.
    fn newton_system(&self, s: &[f64]) -> Option<NewtonSystem> {
        let m = self.prob.num_constraints();
        let k = self.prob.num_vars();

        let mut grad_s = vec![0.0; m];
        for (cone, r) in self.blocks() {
            cone.barrier_grad(&s[r.clone()], &mut grad_s[r]);
        }
        let mut barrier_grad = vec![0.0; k];
        sparse::spmv_transpose(&self.prob.A, &grad_s, &mut barrier_grad, 1.0, 0.0);
        if barrier_grad.iter().any(|v| !v.is_finite()) {
            return None;
        }

        // J = W A, column by column, skipping blocks a column does not touch.
        let mut j = vec![0.0; m * k];
        for (col, out) in self.columns.iter().zip(j.chunks_mut(m)) {
            for (cone, r) in self.blocks() {
                if col[r.clone()].iter().all(|&v| v == 0.0) {
                    continue;
                }
                cone.barrier_hess_sqrt_apply(&s[r.clone()], &col[r.clone()], &mut out[r]);
            }
        }
        if j.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let factor = match dense::gram_factor(DMatrix::from_vec(m, k, j)) {
            Some(r) => NewtonFactor::Gram(r),
            None => {
                log::trace!("newton: rank-deficient jacobian, using the assembled hessian");
                NewtonFactor::Hessian(self.hessian(s))
            }
        };
        Some(NewtonSystem { factor, barrier_grad })
    }

    /// H = A^T ∇²φ(s) A, one Hessian application per nonzero column block.
    fn hessian(&self, s: &[f64]) -> DMatrix<f64> {
        let m = self.prob.num_constraints();
        let k = self.prob.num_vars();
        let mut h_cols = vec![vec![0.0; m]; k];
        for (i, col) in self.columns.iter().enumerate() {
            for (cone, r) in self.blocks() {
                if col[r.clone()].iter().all(|&v| v == 0.0) {
                    continue;
                }
                cone.barrier_hess_apply(&s[r.clone()], &col[r.clone()], &mut h_cols[i][r]);
            }
        }
        let mut hess = DMatrix::<f64>::zeros(k, k);
        for i in 0..k {
            for l in 0..=i {
                let v = sparse::dot(&self.columns[l], &h_cols[i]);
                hess[(l, i)] = v;
                hess[(i, l)] = v;
            }
        }
        hess
    }

    /// Newton direction at (x, s = b - A x).
    pub fn newton_step(&self, s: &[f64], t: f64) -> Option<NewtonStep> {
        let system = self.newton_system(s)?;

        // g = t q - A^T ∇φ(s)
        let g: Vec<f64> = self
            .prob
            .q
            .iter()
            .zip(&system.barrier_grad)
            .map(|(qi, gi)| t * qi - gi)
            .collect();
        let rhs: Vec<f64> = g.iter().map(|v| -v).collect();
        let dx = system.solve(&rhs)?;
        let slope = sparse::dot(&g, &dx);
        if !slope.is_finite() {
            return None;
        }

        Some(NewtonStep {
            dx,
            slope,
            decrement_sq: -slope,
        })
    }

    /// Barrier parameter whose centering gradient `t q - A^T ∇φ(s)` is
    /// smallest in the Newton norm at x:
    ///
    /// ```text
    /// t = qᵀ H⁻¹ A^T ∇φ(s) / qᵀ H⁻¹ q
    /// ```
    ///
    /// None when the fit is not positive and finite.
    pub fn central_path_fit(&self, x: &[f64]) -> Option<f64> {
        let system = self.newton_system(&self.slack(x))?;
        let hq = system.solve(&self.prob.q)?;
        let hg = system.solve(&system.barrier_grad)?;
        let den = sparse::dot(&self.prob.q, &hq);
        let t = sparse::dot(&self.prob.q, &hg) / den;
        (den > 0.0 && t.is_finite() && t > 0.0).then_some(t)
    }

    /// Largest α with s + α ds in the cone.
    fn step_to_boundary(&self, s: &[f64], ds: &[f64]) -> f64 {
        self.blocks()
            .map(|(cone, r)| cone.step_to_boundary(&s[r.clone()], &ds[r]))
            .fold(f64::INFINITY, f64::min)
    }

    /// Backtracking line search along dx. Returns the accepted point.
    fn line_search(&self, x: &[f64], s: &[f64], step: &NewtonStep, t: f64) -> Option<Vec<f64>> {
        let mut ds = vec![0.0; s.len()];
        sparse::spmv(&self.prob.A, &step.dx, &mut ds, -1.0, 0.0);

        let alpha_max = self.step_to_boundary(s, &ds);
        let mut alpha = if alpha_max.is_finite() {
            (BOUNDARY_FRACTION * alpha_max).min(1.0)
        } else {
            1.0
        };

        let f0 = self.merit(x, s, t);
        for _ in 0..LINE_SEARCH_MAX_ITERS {
            let x_new: Vec<f64> = x.iter().zip(&step.dx).map(|(xi, di)| xi + alpha * di).collect();
            let s_new = self.slack(&x_new);
            let f_new = self.merit(&x_new, &s_new, t);
            if f_new.is_finite() && f_new < f0 && f_new <= f0 + ARMIJO * alpha * step.slope {
                return Some(x_new);
            }
            alpha *= BACKTRACK;
        }
        None
    }

    /// Minimize f_t starting from a strictly feasible x.
    ///
    /// `stop`, when given, is checked after every accepted step and ends the
    /// run early with [`CenterOutcome::Interrupted`].
    pub fn center(
        &self,
        x: &mut Vec<f64>,
        t: f64,
        budget: &mut IterBudget,
        stop: Option<&dyn Fn(&[f64]) -> bool>,
    ) -> CenterOutcome {
        let mut steps = 0;
        loop {
            let s = self.slack(x);
            let Some(step) = self.newton_step(&s, t) else {
                return CenterOutcome::Stalled;
            };
            if step.decrement_sq.abs() / 2.0 <= NEWTON_TOL {
                return CenterOutcome::Centered;
            }
            if step.decrement_sq < 0.0 {
                return CenterOutcome::Stalled;
            }
            if budget.exhausted() {
                return CenterOutcome::BudgetExhausted;
            }
            if steps >= MAX_CENTERING_STEPS {
                return if step.decrement_sq / 2.0 <= NEWTON_TOL_CAPPED {
                    CenterOutcome::Centered
                } else {
                    CenterOutcome::Stalled
                };
            }
            steps += 1;

            let Some(x_new) = self.line_search(x, &s, &step, t) else {
                // Rounding in the merit function can defeat Armijo close to the
                // center; a small decrement is still good enough to move on.
                if step.decrement_sq / 2.0 <= NEWTON_TOL_LOOSE {
                    return CenterOutcome::Centered;
                }
                return CenterOutcome::Stalled;
            };
            budget.used += 1;
            *x = x_new;

            if x.iter().any(|v| v.abs() > DIVERGENCE_NORM) {
                return CenterOutcome::Diverged;
            }
            if stop.is_some_and(|stop| stop(x.as_slice())) {
                return CenterOutcome::Interrupted;
            }
        }
    }

    /// Dual estimate z = -∇φ(s) / t, which lies in K* on the central path.
    pub fn dual_estimate(&self, s: &[f64], t: f64) -> Vec<f64> {
        let mut z = vec![0.0; s.len()];
        for (cone, r) in self.blocks() {
            cone.barrier_grad(&s[r.clone()], &mut z[r]);
        }
        z.iter_mut().for_each(|v| *v = -*v / t);
        z
    }

    /// ||q + A^T z||
    pub fn dual_residual(&self, z: &[f64]) -> f64 {
        let mut r = self.prob.q.clone();
        sparse::spmv_transpose(&self.prob.A, z, &mut r, 1.0, 1.0);
        sparse::norm2(&r)
    }
}
