//! Backend selection and normalization of solver results.
//!
//! The adapter is the only place that talks to `sdp-core`. It lowers the
//! template, runs one backend exactly once, and turns whatever comes back
//! (a result, an error or a panic) into a [`SolverOutcome`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use nalgebra::DMatrix;
use sdp_core::{interior_point_available, preferred_backend, AdmmBackend, SdpBackend, SolveStatus};
use serde::Serialize;

use crate::builder::build_problem;
use crate::certificate::CertificateTemplate;
use crate::error::CertificateError;
use crate::model::Bounds;
use crate::settings::{BackendChoice, CertificateSettings};

/// Normalized backend status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Solved to full accuracy
    Optimal,
    /// Solved to reduced accuracy
    OptimalInaccurate,
    /// No (W, ρ) satisfies the constraints
    Infeasible,
    /// Objective unbounded below
    Unbounded,
    /// Backend fault or no convergence
    Error,
}

impl OutcomeStatus {
    /// Map a backend status.
    pub fn from_solve_status(status: SolveStatus) -> Self {
        match status {
            SolveStatus::Optimal => OutcomeStatus::Optimal,
            SolveStatus::AlmostOptimal => OutcomeStatus::OptimalInaccurate,
            SolveStatus::PrimalInfeasible => OutcomeStatus::Infeasible,
            SolveStatus::Unbounded => OutcomeStatus::Unbounded,
            SolveStatus::MaxIters | SolveStatus::NumericalError => OutcomeStatus::Error,
        }
    }

    /// Whether W and ρ are available.
    pub fn has_solution(self) -> bool {
        matches!(self, OutcomeStatus::Optimal | OutcomeStatus::OptimalInaccurate)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Optimal => "optimal",
            OutcomeStatus::OptimalInaccurate => "optimal_inaccurate",
            OutcomeStatus::Infeasible => "infeasible",
            OutcomeStatus::Unbounded => "unbounded",
            OutcomeStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Certificate values returned by a successful solve.
#[derive(Debug, Clone)]
pub struct SolvedPoint {
    /// Symmetric W
    pub w: DMatrix<f64>,
    /// ρ
    pub rho: f64,
}

/// Normalized result of one backend run.
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    /// Backend that ran
    pub backend: &'static str,
    /// Normalized status
    pub status: SolverStatusDetail,
    /// Objective ρ* when the backend produced one
    pub objective: Option<f64>,
    /// Iterations reported by the backend
    pub iterations: usize,
    /// Time spent lowering the problem
    pub setup_time: Duration,
    /// Time spent inside the backend
    pub solve_time: Duration,
    /// W and ρ, only for optimal / optimal_inaccurate
    pub point: Option<SolvedPoint>,
}

/// Status plus the fault message when the backend failed.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverStatusDetail {
    /// The backend returned a result with this status
    Finished(OutcomeStatus),
    /// The backend returned an error or panicked
    Fault(String),
}

impl SolverOutcome {
    /// Normalized status.
    pub fn status(&self) -> OutcomeStatus {
        match &self.status {
            SolverStatusDetail::Finished(status) => *status,
            SolverStatusDetail::Fault(_) => OutcomeStatus::Error,
        }
    }

    /// The solved point, or the error explaining why there is none.
    pub fn solved_point(&self) -> Result<&SolvedPoint, CertificateError> {
        match (&self.status, &self.point) {
            (SolverStatusDetail::Fault(message), _) => Err(CertificateError::SolverException {
                backend: self.backend.to_string(),
                message: message.clone(),
            }),
            (SolverStatusDetail::Finished(status), Some(point)) if status.has_solution() => Ok(point),
            (SolverStatusDetail::Finished(status), _) => Err(CertificateError::SolverStatus {
                status: status.to_string(),
            }),
        }
    }
}

/// Runs the selected backend on certificate problems.
pub struct SolverAdapter {
    backend: Box<dyn SdpBackend>,
    requested: BackendChoice,
    downgraded: bool,
}

impl SolverAdapter {
    /// Pick a backend for the requested choice.
    ///
    /// An interior-point request in a build without that backend degrades to
    /// ADMM; [`SolverAdapter::downgraded`] reports it.
    pub fn new(choice: BackendChoice) -> Self {
        let (backend, downgraded): (Box<dyn SdpBackend>, bool) = match choice {
            BackendChoice::Auto => (preferred_backend(), false),
            BackendChoice::InteriorPoint if interior_point_available() => (preferred_backend(), false),
            BackendChoice::InteriorPoint => {
                log::warn!("interior-point backend not compiled in; falling back to ADMM");
                (Box::new(AdmmBackend), true)
            }
            BackendChoice::OperatorSplitting => (Box::new(AdmmBackend), false),
        };
        log::info!("using {} backend (requested {:?})", backend.name(), choice);
        Self {
            backend,
            requested: choice,
            downgraded,
        }
    }

    /// Name of the backend that will run.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Backend originally requested.
    pub fn requested(&self) -> BackendChoice {
        self.requested
    }

    /// Whether the requested backend was unavailable.
    pub fn downgraded(&self) -> bool {
        self.downgraded
    }

    /// Lower the template and solve it once.
    pub fn solve(
        &self,
        template: &CertificateTemplate,
        bounds: &Bounds,
        settings: &CertificateSettings,
    ) -> SolverOutcome {
        let setup_start = Instant::now();
        let lowered = build_problem(template, bounds, settings.eps_strict);
        let setup_time = setup_start.elapsed();

        let name = self.backend.name();
        let solve_start = Instant::now();
        let run = catch_unwind(AssertUnwindSafe(|| {
            self.backend.solve(&lowered.problem, &settings.solver)
        }));
        let solve_time = solve_start.elapsed();

        let mut outcome = SolverOutcome {
            backend: name,
            status: SolverStatusDetail::Fault(String::new()),
            objective: None,
            iterations: 0,
            setup_time,
            solve_time,
            point: None,
        };

        match run {
            Ok(Ok(result)) => {
                let status = OutcomeStatus::from_solve_status(result.status);
                log::info!("{} finished: {} (rho = {:.6e})", name, status, result.obj_val);
                outcome.status = SolverStatusDetail::Finished(status);
                outcome.iterations = result.info.iters;
                if result.obj_val.is_finite() {
                    outcome.objective = Some(result.obj_val);
                }
                if status.has_solution() {
                    let w = lowered.layout.w_from_x(&result.x);
                    let rho = lowered.layout.rho_from_x(&result.x);
                    log::trace!("W = {}", w);
                    outcome.point = Some(SolvedPoint { w, rho });
                }
            }
            Ok(Err(err)) => {
                log::error!("{} backend failed: {}", name, err);
                outcome.status = SolverStatusDetail::Fault(err.to_string());
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("{} backend panicked: {}", name, message);
                outcome.status = SolverStatusDetail::Fault(message);
            }
        }

        outcome
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "backend panicked".to_string()
    }
}
