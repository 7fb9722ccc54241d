//! Certificate modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which certificate inequality is searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateMode {
    /// H = A W + W Aᵀ - ρ B Bᵀ + 2λ W negative definite.
    HMode,

    /// D = [[-W Aᵀ - A W + ρ B Bᵀ, W Lᵀ], [L W, I]] positive semidefinite.
    DMode,
}

impl CertificateMode {
    /// Mode selected by the request flag.
    pub fn from_flag(use_d_constraint: bool) -> Self {
        if use_d_constraint {
            CertificateMode::DMode
        } else {
            CertificateMode::HMode
        }
    }

    /// Side length of the certificate matrix for a system of order n.
    pub fn certificate_size(self, n: usize) -> usize {
        match self {
            CertificateMode::HMode => n,
            CertificateMode::DMode => 2 * n,
        }
    }
}

impl fmt::Display for CertificateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateMode::HMode => write!(f, "H_MODE"),
            CertificateMode::DMode => write!(f, "D_MODE"),
        }
    }
}
