//! Sparse matrix types and operations.
//!
//! The constraint matrix of an LMI problem is very sparse (each W entry
//! touches a handful of svec rows), so it is stored in CSC form and
//! expanded to dense columns only where a backend needs them.

use sprs::TriMat;

pub use crate::problem::SparseCsc;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    scale_in_place(y, beta);
    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[row] += alpha * (*val) * x[col];
        }
    }
}

/// Transpose-vector product: y = alpha * A^T * x + beta * y
pub fn spmv_transpose(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.rows(), x.len());
    assert_eq!(a.cols(), y.len());

    scale_in_place(y, beta);
    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[col] += alpha * (*val) * x[row];
        }
    }
}

/// Expand every column of A into a dense vector of length `A.rows()`.
pub fn dense_columns(a: &SparseCsc) -> Vec<Vec<f64>> {
    let mut cols = vec![vec![0.0; a.rows()]; a.cols()];
    for (val, (row, col)) in a.iter() {
        cols[col][row] += *val;
    }
    cols
}

fn scale_in_place(y: &mut [f64], beta: f64) {
    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }
}

/// Euclidean norm of a dense vector.
pub fn norm2(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Largest absolute entry of a dense vector.
pub fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

/// Dot product of two dense vectors.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
