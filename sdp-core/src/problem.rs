//! Problem data structures and validation.
//!
//! This module defines the canonical conic problem handed to the backends
//! and the settings, status and result types they share.

use std::fmt;
use std::time::Duration;

use crate::error::{SdpError, SdpResult};

/// Sparse matrix in CSC format.
pub type SparseCsc = sprs::CsMatI<f64, usize>;

/// Conic problem in inequality form.
///
/// The backends work with the formulation:
///
/// ```text
/// minimize    q^T x
/// subject to  A x + s = b
///             s ∈ K
/// ```
///
/// where K is a Cartesian product of cones. Writing `s = b - A x` turns every
/// PSD block into a linear matrix inequality `F_0 + Σ x_i F_i ⪰ 0` with
/// `svec(F_0) = b_block` and `svec(F_i) = -A[block, i]`.
///
/// # Dimensions
///
/// - `n`: number of decision variables (length of x)
/// - `m`: total slack dimension (length of b, number of rows in A)
#[derive(Debug, Clone)]
#[allow(non_snake_case)] // A is standard mathematical notation
pub struct ProblemData {
    /// Linear cost vector q (length n)
    pub q: Vec<f64>,

    /// Constraint matrix A (m × n, CSC format)
    pub A: SparseCsc,

    /// Constraint right-hand side b (length m)
    pub b: Vec<f64>,

    /// Cone specifications partitioning the m-dimensional slack space
    pub cones: Vec<ConeSpec>,
}

/// Cone specification.
///
/// Each cone type corresponds to a block in the Cartesian product K = K₁ × K₂ × ... × Kₙ.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ConeSpec {
    /// Nonnegative orthant: ℝ₊^dim
    NonNeg { dim: usize },

    /// Positive semidefinite cone: S₊^n (n × n symmetric matrices)
    /// Stored in svec format: dimension = n(n+1)/2
    Psd { n: usize },
}

impl ConeSpec {
    /// Number of slack coordinates occupied by this cone.
    pub fn dim(&self) -> usize {
        match self {
            ConeSpec::NonNeg { dim } => *dim,
            ConeSpec::Psd { n } => n * (n + 1) / 2,
        }
    }
}

/// Solver settings and parameters.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Maximum number of Newton steps (barrier backend, both phases)
    pub max_iter: usize,

    /// Maximum number of ADMM iterations
    pub max_admm_iter: usize,

    /// Emit per-iteration progress at debug level
    pub verbose: bool,

    /// Primal/dual feasibility tolerance
    pub tol_feas: f64,

    /// Duality gap tolerance
    pub tol_gap: f64,

    /// Infeasibility detection tolerance
    pub tol_infeas: f64,

    /// Reduced feasibility tolerance accepted as "almost optimal"
    pub tol_feas_inaccurate: f64,

    /// Reduced gap tolerance accepted as "almost optimal"
    pub tol_gap_inaccurate: f64,

    /// Barrier parameter growth factor between centering steps
    pub barrier_mu: f64,

    /// Initial ADMM penalty parameter
    pub admm_rho: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let max_iter = std::env::var("LMI_MAX_ITER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1000);

        let max_admm_iter = std::env::var("LMI_ADMM_MAX_ITER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(10_000);

        let tol_feas = std::env::var("LMI_TOL_FEAS")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(1e-8);

        Self {
            max_iter,
            max_admm_iter,
            verbose: false,
            tol_feas,
            tol_gap: 1e-8,
            tol_infeas: 1e-8,
            tol_feas_inaccurate: 1e-4,
            tol_gap_inaccurate: 5e-5,
            barrier_mu: 20.0,
            admm_rho: 1.0,
        }
    }
}

/// Solution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimal solution found
    Optimal,

    /// Almost optimal - meets reduced accuracy thresholds
    AlmostOptimal,

    /// Primal problem is infeasible
    PrimalInfeasible,

    /// Objective decreases without bound
    Unbounded,

    /// Maximum iterations reached
    MaxIters,

    /// Numerical error encountered
    NumericalError,
}

impl SolveStatus {
    /// Whether the returned x can be used as a solution.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::AlmostOptimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::AlmostOptimal => write!(f, "AlmostOptimal"),
            SolveStatus::PrimalInfeasible => write!(f, "Primal Infeasible"),
            SolveStatus::Unbounded => write!(f, "Unbounded"),
            SolveStatus::MaxIters => write!(f, "MaxIters"),
            SolveStatus::NumericalError => write!(f, "Numerical Error"),
        }
    }
}

/// Solve result with solution and diagnostics.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Solution status
    pub status: SolveStatus,

    /// Primal solution x (length n)
    pub x: Vec<f64>,

    /// Slack variables s = b - A x (length m)
    pub s: Vec<f64>,

    /// Dual variables z (length m)
    pub z: Vec<f64>,

    /// Objective value q^T x at solution
    pub obj_val: f64,

    /// Detailed solve information and diagnostics
    pub info: SolveInfo,
}

/// Detailed solve information and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    /// Iterations completed (Newton steps or ADMM iterations)
    pub iters: usize,

    /// Newton steps spent finding a strictly feasible point
    pub phase1_iters: usize,

    /// Total solve time
    pub solve_time: Duration,

    /// Final primal residual norm ||A x + s - b||
    pub primal_res: f64,

    /// Final dual residual norm ||q + A^T z||
    pub dual_res: f64,

    /// Final duality gap s^T z
    pub gap: f64,
}

impl ProblemData {
    /// Get the number of decision variables (n)
    pub fn num_vars(&self) -> usize {
        self.q.len()
    }

    /// Get the number of slack coordinates (m)
    pub fn num_constraints(&self) -> usize {
        self.b.len()
    }

    /// Validate problem dimensions and cone partitioning
    pub fn validate(&self) -> SdpResult<()> {
        let n = self.num_vars();
        let m = self.num_constraints();

        if n == 0 {
            return Err(SdpError::InvalidProblem("problem has no variables".into()));
        }
        if self.A.rows() != m || self.A.cols() != n {
            return Err(SdpError::InvalidProblem(format!(
                "A has shape {}x{}, expected {}x{}",
                self.A.rows(),
                self.A.cols(),
                m,
                n
            )));
        }

        let cone_dim: usize = self.cones.iter().map(ConeSpec::dim).sum();
        if cone_dim != m {
            return Err(SdpError::InvalidProblem(format!(
                "cones cover {} rows but b has length {}",
                cone_dim, m
            )));
        }
        if self.cones.iter().any(|c| c.dim() == 0) {
            return Err(SdpError::InvalidProblem("empty cone block".into()));
        }

        let finite = self.q.iter().chain(self.b.iter()).all(|v| v.is_finite())
            && self.A.iter().all(|(v, _)| v.is_finite());
        if !finite {
            return Err(SdpError::InvalidProblem("non-finite problem data".into()));
        }

        Ok(())
    }

    /// Row offsets of each cone block in the slack vector.
    pub fn cone_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.cones.len());
        let mut offset = 0;
        for cone in &self.cones {
            offsets.push(offset);
            offset += cone.dim();
        }
        offsets
    }
}
