//! Configuration settings for the certificate search.

use sdp_core::SolverSettings;

/// Which conic backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// Interior point when compiled in, ADMM otherwise.
    #[default]
    Auto,

    /// Log-barrier interior point method (feature `interior-point`).
    InteriorPoint,

    /// First-order operator splitting (ADMM).
    OperatorSplitting,
}

impl BackendChoice {
    /// Parse a backend name as used by `LMI_BACKEND` and the CLI.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(BackendChoice::Auto),
            "ipm" | "barrier" | "interior-point" | "interior_point" => Some(BackendChoice::InteriorPoint),
            "admm" | "operator-splitting" | "operator_splitting" => Some(BackendChoice::OperatorSplitting),
            _ => None,
        }
    }
}

/// Certificate search settings.
#[derive(Debug, Clone)]
pub struct CertificateSettings {
    /// Strict separation ε of the certificate inequality.
    pub eps_strict: f64,

    /// Tolerance of the post-solve verification checks.
    pub verify_tol: f64,

    /// Relative reciprocal condition number below which W counts as singular.
    pub singular_tol: f64,

    /// Backend selection.
    pub backend: BackendChoice,

    /// Settings passed to the conic backend.
    pub solver: SolverSettings,
}

impl Default for CertificateSettings {
    fn default() -> Self {
        let backend = std::env::var("LMI_BACKEND")
            .ok()
            .and_then(|s| BackendChoice::from_name(&s))
            .unwrap_or_default();

        Self {
            eps_strict: 1e-8,
            verify_tol: 1e-6,
            singular_tol: 1e-12,
            backend,
            solver: SolverSettings::default(),
        }
    }
}

impl CertificateSettings {
    /// Create settings with backend progress logged at info level.
    pub fn verbose() -> Self {
        let mut s = Self::default();
        s.solver.verbose = true;
        s
    }

    /// Select the backend.
    pub fn with_backend(mut self, backend: BackendChoice) -> Self {
        self.backend = backend;
        self
    }

    /// Set the verification tolerance.
    pub fn with_verify_tol(mut self, tol: f64) -> Self {
        self.verify_tol = tol;
        self
    }
}
