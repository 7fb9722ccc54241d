//! Secondary matrices derived from the system: B Bᵀ and a factor L of Q.

use nalgebra::linalg::SymmetricEigen;
use nalgebra::DMatrix;

use crate::model::SystemMatrices;

/// How L was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorizationKind {
    /// Q = Lᵀ L with L upper triangular.
    Cholesky,

    /// Q is not positive definite: L = diag(√max(q_ii, 0)).
    DiagonalFallback,
}

/// Output of preprocessing.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Factor L of Q (n×n).
    pub l: DMatrix<f64>,

    /// B Bᵀ (n×n, symmetric PSD).
    pub bbt: DMatrix<f64>,

    /// Which factorization produced L.
    pub kind: FactorizationKind,
}

/// Compute B Bᵀ and L.
pub fn preprocess(system: &SystemMatrices) -> Preprocessed {
    let bbt = &system.b * system.b.transpose();
    let (l, kind) = factor_weight(&system.q);

    log::trace!("BB^T = {}", bbt);
    log::trace!("L = {}", l);
    if kind == FactorizationKind::DiagonalFallback {
        log::warn!("Q is not positive definite; using diagonal factor diag(sqrt(diag(Q)))");
    }

    Preprocessed { l, bbt, kind }
}

/// Upper-triangular L with Q = Lᵀ L, or the diagonal fallback.
pub fn factor_weight(q: &DMatrix<f64>) -> (DMatrix<f64>, FactorizationKind) {
    let q_sym = (q + q.transpose()) * 0.5;

    let min_eig = SymmetricEigen::new(q_sym.clone())
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);

    if min_eig > 0.0 {
        if let Some(chol) = q_sym.cholesky() {
            // nalgebra returns the lower factor: Q = l lᵀ, so L = lᵀ.
            return (chol.l().transpose(), FactorizationKind::Cholesky);
        }
    }

    let diag = q.diagonal().map(|v| v.max(0.0).sqrt());
    (DMatrix::from_diagonal(&diag), FactorizationKind::DiagonalFallback)
}
