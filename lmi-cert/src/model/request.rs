//! Certificate requests and their validation.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::CertificateMode;
use crate::error::{CertificateError, CertificateResult};

/// A certificate request as received from a caller.
///
/// Matrices arrive as nested row sequences; `matrix_q` holds only the
/// diagonal of Q.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmiRequest {
    /// Named operating-point values, passed through untouched.
    #[serde(default)]
    pub state_values: BTreeMap<String, f64>,

    /// System matrix A (n×n).
    pub matrix_a: Vec<Vec<f64>>,

    /// Input matrix B (n×m).
    pub matrix_b: Vec<Vec<f64>>,

    /// Diagonal of the weighting matrix Q (length n).
    pub matrix_q: Vec<f64>,

    /// Lower spectral bound on W.
    pub alpha_min: f64,

    /// Upper spectral bound on W, strictly above `alpha_min`.
    pub alpha_max: f64,

    /// Declared system order.
    pub n: usize,

    /// Decay rate λ (H mode only).
    #[serde(default = "default_lambda")]
    pub lambda_val: f64,

    /// Search for the D certificate instead of H.
    #[serde(default)]
    pub use_d_constraint: bool,
}

fn default_lambda() -> f64 {
    1.0
}

/// System matrices of a validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMatrices {
    /// A (n×n)
    pub a: DMatrix<f64>,
    /// B (n×m)
    pub b: DMatrix<f64>,
    /// Q = diag(matrix_q) (n×n)
    pub q: DMatrix<f64>,
}

impl SystemMatrices {
    /// System order n.
    pub fn order(&self) -> usize {
        self.a.nrows()
    }
}

/// Spectral bounds α_min·I ⪯ W ⪯ α_max·I.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// α_min
    pub alpha_min: f64,
    /// α_max
    pub alpha_max: f64,
}

/// Everything the numerical pipeline needs, in matrix form.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateInput {
    /// A, B, Q
    pub system: SystemMatrices,
    /// Spectral bounds on W
    pub bounds: Bounds,
    /// Decay rate λ
    pub lambda: f64,
    /// Certificate to search for
    pub mode: CertificateMode,
}

impl LmiRequest {
    /// Certificate mode selected by this request.
    pub fn mode(&self) -> CertificateMode {
        CertificateMode::from_flag(self.use_d_constraint)
    }

    /// Check shapes and values and convert to matrices.
    pub fn validate(&self) -> CertificateResult<CertificateInput> {
        let n = self.n;
        if n == 0 {
            return Err(invalid("n must be positive"));
        }

        let a = dense_from_rows("matrix_a", &self.matrix_a, n, n)?;

        let m = self.matrix_b.first().map_or(0, Vec::len);
        if m == 0 {
            return Err(invalid("matrix_b must have at least one column"));
        }
        let b = dense_from_rows("matrix_b", &self.matrix_b, n, m)?;

        if self.matrix_q.len() != n {
            return Err(invalid(format!(
                "matrix_q has {} entries, expected {}",
                self.matrix_q.len(),
                n
            )));
        }
        if self.matrix_q.iter().any(|v| !v.is_finite()) {
            return Err(invalid("matrix_q contains non-finite values"));
        }
        let q = DMatrix::from_diagonal(&nalgebra::DVector::from_column_slice(&self.matrix_q));

        if !self.alpha_min.is_finite() || !self.alpha_max.is_finite() {
            return Err(invalid("alpha bounds must be finite"));
        }
        // Equal bounds pin W = αI and leave the bound blocks without interior.
        if self.alpha_min >= self.alpha_max {
            return Err(invalid(format!(
                "alpha_min ({}) must be below alpha_max ({})",
                self.alpha_min, self.alpha_max
            )));
        }
        if !self.lambda_val.is_finite() {
            return Err(invalid("lambda_val must be finite"));
        }

        Ok(CertificateInput {
            system: SystemMatrices { a, b, q },
            bounds: Bounds {
                alpha_min: self.alpha_min,
                alpha_max: self.alpha_max,
            },
            lambda: self.lambda_val,
            mode: self.mode(),
        })
    }
}

fn invalid(msg: impl Into<String>) -> CertificateError {
    CertificateError::InvalidInput(msg.into())
}

/// Build a dense matrix from rows, checking row count, row lengths and finiteness.
fn dense_from_rows(
    name: &str,
    rows: &[Vec<f64>],
    nrows: usize,
    ncols: usize,
) -> CertificateResult<DMatrix<f64>> {
    if rows.len() != nrows {
        return Err(invalid(format!("{} has {} rows, expected {}", name, rows.len(), nrows)));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(invalid(format!(
                "{} row {} has {} entries, expected {}",
                name,
                i,
                row.len(),
                ncols
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(invalid(format!("{} row {} contains non-finite values", name, i)));
        }
    }
    Ok(DMatrix::from_fn(nrows, ncols, |i, j| rows[i][j]))
}
