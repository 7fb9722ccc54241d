//! Cone of positive semidefinite n×n matrices.
//!
//! Points are svec vectors: the upper triangle read column by column, with
//! off-diagonal entries multiplied by √2 so that `svec(X)·svec(Y) = tr(XY)`.
//! Barrier quantities go through a Cholesky factor of X; projection and the
//! smallest eigenvalue need the full symmetric eigendecomposition.

use std::f64::consts::SQRT_2;

use nalgebra::linalg::{Cholesky, SymmetricEigen};
use nalgebra::{DMatrix, Dyn};

use super::traits::ConeKernel;

/// Relative margin for strict interiority: λ_min(X) > tol · max(1, max|Xᵢⱼ|).
const INTERIOR_MARGIN: f64 = 1e-12;

/// S₊ⁿ in svec coordinates.
#[derive(Debug, Clone)]
pub struct PsdCone {
    n: usize,
}

impl PsdCone {
    /// Cone over n×n matrices (n must be positive).
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "matrix size must be positive");
        Self { n }
    }

    /// Matrix side length.
    pub fn size(&self) -> usize {
        self.n
    }

    fn factor(&self, s: &[f64]) -> Option<Cholesky<f64, Dyn>> {
        if s.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Cholesky::new(svec_to_mat(s, self.n))
    }

    #[inline]
    fn check(&self, len: usize) {
        debug_assert_eq!(len, self.dim(), "slice length does not match svec dimension");
    }
}

/// (row, col) of each svec position, column-major over the upper triangle.
fn upper_triangle(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(|j| (0..=j).map(move |i| (i, j)))
}

impl ConeKernel for PsdCone {
    fn dim(&self) -> usize {
        self.n * (self.n + 1) / 2
    }

    fn barrier_degree(&self) -> usize {
        self.n
    }

    fn is_interior(&self, s: &[f64]) -> bool {
        self.check(s.len());
        if s.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let scale = s.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
        self.min_eigenvalue(s) > INTERIOR_MARGIN * scale
    }

    fn min_eigenvalue(&self, s: &[f64]) -> f64 {
        SymmetricEigen::new(svec_to_mat(s, self.n)).eigenvalues.min()
    }

    fn unit_element(&self, out: &mut [f64]) {
        self.check(out.len());
        for (o, (i, j)) in out.iter_mut().zip(upper_triangle(self.n)) {
            *o = if i == j { 1.0 } else { 0.0 };
        }
    }

    fn step_to_boundary(&self, s: &[f64], ds: &[f64]) -> f64 {
        self.check(s.len());
        self.check(ds.len());
        if ds.iter().all(|&v| v == 0.0) {
            return f64::INFINITY;
        }
        let Some(chol) = self.factor(s) else {
            return 0.0;
        };

        // X + α dX ⪰ 0  ⇔  I + α L⁻¹ dX L⁻ᵀ ⪰ 0  with X = L Lᵀ
        let Some(m) = whiten(&chol, &svec_to_mat(ds, self.n)) else {
            return 0.0;
        };

        let lowest = SymmetricEigen::new(m).eigenvalues.min();
        if !lowest.is_finite() {
            0.0
        } else if lowest >= 0.0 {
            f64::INFINITY
        } else {
            -lowest.recip()
        }
    }

    fn barrier_value(&self, s: &[f64]) -> f64 {
        self.check(s.len());
        match self.factor(s) {
            // -log det X = -2 ∑ log Lᵢᵢ
            Some(chol) => -2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>(),
            None => f64::INFINITY,
        }
    }

    fn barrier_grad(&self, s: &[f64], grad_out: &mut [f64]) {
        self.check(s.len());
        self.check(grad_out.len());
        match self.factor(s) {
            Some(chol) => mat_to_svec(&(-chol.inverse()), grad_out),
            None => grad_out.fill(f64::NAN),
        }
    }

    fn barrier_hess_apply(&self, s: &[f64], v: &[f64], out: &mut [f64]) {
        self.check(s.len());
        self.check(v.len());
        self.check(out.len());
        let Some(chol) = self.factor(s) else {
            out.fill(f64::NAN);
            return;
        };
        let x_inv = chol.inverse();
        let hv = &x_inv * svec_to_mat(v, self.n) * &x_inv;
        mat_to_svec(&hv, out);
    }

    fn barrier_hess_sqrt_apply(&self, s: &[f64], v: &[f64], out: &mut [f64]) {
        self.check(s.len());
        self.check(v.len());
        self.check(out.len());
        // ⟨V, X⁻¹ V X⁻¹⟩ = ‖L⁻¹ V L⁻ᵀ‖²_F
        match self.factor(s).and_then(|chol| whiten(&chol, &svec_to_mat(v, self.n))) {
            Some(w) => mat_to_svec(&w, out),
            None => out.fill(f64::NAN),
        }
    }

    fn project(&self, v: &[f64], out: &mut [f64]) {
        self.check(v.len());
        self.check(out.len());
        let eig = SymmetricEigen::new(svec_to_mat(v, self.n));
        let clipped = eig.eigenvalues.map(|l| l.max(0.0));
        let q = &eig.eigenvectors;
        let proj = q * DMatrix::from_diagonal(&clipped) * q.transpose();
        mat_to_svec(&(0.5 * (&proj + proj.transpose())), out);
    }
}

/// Symmetrized congruence L⁻¹ M L⁻ᵀ with the Cholesky factor of X = L Lᵀ.
fn whiten(chol: &Cholesky<f64, Dyn>, m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let l = chol.l();
    let left = l.solve_lower_triangular(m)?;
    let both = l.solve_lower_triangular(&left.transpose())?;
    Some(0.5 * (&both + both.transpose()))
}

/// Unpack an svec vector into the dense symmetric matrix it represents.
pub fn svec_to_mat(s: &[f64], n: usize) -> DMatrix<f64> {
    assert_eq!(s.len(), n * (n + 1) / 2, "svec length does not match n = {}", n);
    let mut out = DMatrix::zeros(n, n);
    for (&val, (i, j)) in s.iter().zip(upper_triangle(n)) {
        if i == j {
            out[(i, i)] = val;
        } else {
            out[(i, j)] = val / SQRT_2;
            out[(j, i)] = val / SQRT_2;
        }
    }
    out
}

/// Pack the upper triangle of a square matrix into svec coordinates.
pub fn mat_to_svec(m: &DMatrix<f64>, out: &mut [f64]) {
    let n = m.nrows();
    assert!(m.is_square(), "svec needs a square matrix");
    assert_eq!(out.len(), n * (n + 1) / 2, "svec length does not match n = {}", n);
    for (o, (i, j)) in out.iter_mut().zip(upper_triangle(n)) {
        *o = if i == j { m[(i, j)] } else { SQRT_2 * m[(i, j)] };
    }
}
