//! Dense symmetric solves.
//!
//! Newton systems of the barrier method and the ADMM normal equations are
//! small and dense. Newton systems that come as a Gram matrix JᵀJ are
//! factored through a QR decomposition of J, which never squares the
//! condition number. Otherwise Cholesky is tried first on a Jacobi-scaled
//! copy; near-singular systems get a growing diagonal shift, and LU is the
//! last resort.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

/// Diagonal shifts tried, relative to the largest diagonal entry.
const SHIFTS: [f64; 4] = [0.0, 1e-14, 1e-11, 1e-8];

/// Solve H x = rhs for a symmetric positive (semi)definite H.
///
/// Returns None when every attempt fails or produces non-finite values.
pub fn solve_spd(h: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    // D⁻¹ H D⁻¹ y = D⁻¹ rhs with D = diag(√Hᵢᵢ), then x = D⁻¹ y
    let d = h.diagonal().map(|v| if v > 0.0 && v.is_finite() { v.sqrt() } else { 1.0 });
    let scaled = DMatrix::from_fn(h.nrows(), h.ncols(), |i, j| h[(i, j)] / (d[i] * d[j]));
    let scaled_rhs = rhs.component_div(&d);
    let scale = scaled.diagonal().amax().max(1.0);

    for &shift in SHIFTS.iter() {
        if let Some(chol) = factor_spd(&scaled, shift * scale) {
            let y = chol.solve(&scaled_rhs);
            if y.iter().all(|v| v.is_finite()) {
                return Some(y.component_div(&d));
            }
        }
    }

    log::debug!("cholesky failed on {}x{} system, falling back to LU", h.nrows(), h.ncols());
    h.clone()
        .lu()
        .solve(rhs)
        .filter(|x| x.iter().all(|v| v.is_finite()))
}

/// Upper triangular R with RᵀR = JᵀJ, from a QR decomposition of the
/// tall matrix J.
///
/// Returns None when J has fewer rows than columns or R has a zero pivot.
pub fn gram_factor(j: DMatrix<f64>) -> Option<DMatrix<f64>> {
    if j.nrows() < j.ncols() {
        return None;
    }
    let r = j.qr().r();
    let usable = r.diagonal().iter().all(|d| *d != 0.0 && d.is_finite());
    usable.then_some(r)
}

/// Solve RᵀR x = rhs given the factor from [`gram_factor`].
pub fn solve_gram(r: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    let w = r.tr_solve_upper_triangular(rhs)?;
    r.solve_upper_triangular(&w)
        .filter(|x| x.iter().all(|v| v.is_finite()))
}

/// Cholesky factor of H + shift·I, if it exists.
pub fn factor_spd(h: &DMatrix<f64>, shift: f64) -> Option<Cholesky<f64, Dyn>> {
    let mut shifted = h.clone();
    if shift > 0.0 {
        for i in 0..shifted.nrows() {
            shifted[(i, i)] += shift;
        }
    }
    shifted.cholesky()
}
