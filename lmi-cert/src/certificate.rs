//! Closed-form certificate matrices.
//!
//! The constraint builder and the verifier both evaluate the certificate
//! through [`CertificateTemplate`], so the two cannot drift apart.

use nalgebra::DMatrix;

use crate::model::{CertificateInput, CertificateMode};
use crate::preprocess::Preprocessed;

/// H = A W + W Aᵀ - ρ B Bᵀ + 2λ W
pub fn h_matrix(
    a: &DMatrix<f64>,
    bbt: &DMatrix<f64>,
    lambda: f64,
    w: &DMatrix<f64>,
    rho: f64,
) -> DMatrix<f64> {
    a * w + w * a.transpose() - bbt * rho + w * (2.0 * lambda)
}

/// D = [[-W Aᵀ - A W + ρ B Bᵀ, W Lᵀ], [L W, I]]
pub fn d_matrix(
    a: &DMatrix<f64>,
    bbt: &DMatrix<f64>,
    l: &DMatrix<f64>,
    w: &DMatrix<f64>,
    rho: f64,
) -> DMatrix<f64> {
    let n = w.nrows();
    let mut d = DMatrix::<f64>::zeros(2 * n, 2 * n);

    let top_left = -(w * a.transpose()) - a * w + bbt * rho;
    let lw = l * w;
    d.view_mut((0, 0), (n, n)).copy_from(&top_left);
    d.view_mut((0, n), (n, n)).copy_from(&lw.transpose());
    d.view_mut((n, 0), (n, n)).copy_from(&lw);
    d.view_mut((n, n), (n, n)).fill_with_identity();
    d
}

/// Everything needed to evaluate the certificate of one request.
#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    /// Certificate kind
    pub mode: CertificateMode,
    /// System matrix A
    pub a: DMatrix<f64>,
    /// B Bᵀ
    pub bbt: DMatrix<f64>,
    /// Factor L of Q
    pub l: DMatrix<f64>,
    /// Decay rate λ
    pub lambda: f64,
}

impl CertificateTemplate {
    /// Template for a validated request and its preprocessing.
    pub fn new(input: &CertificateInput, pre: &Preprocessed) -> Self {
        Self {
            mode: input.mode,
            a: input.system.a.clone(),
            bbt: pre.bbt.clone(),
            l: pre.l.clone(),
            lambda: input.lambda,
        }
    }

    /// System order n.
    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    /// Side length of the certificate matrix.
    pub fn size(&self) -> usize {
        self.mode.certificate_size(self.order())
    }

    /// The certificate matrix (H or D) at (W, ρ).
    pub fn certificate_matrix(&self, w: &DMatrix<f64>, rho: f64) -> DMatrix<f64> {
        match self.mode {
            CertificateMode::HMode => h_matrix(&self.a, &self.bbt, self.lambda, w, rho),
            CertificateMode::DMode => d_matrix(&self.a, &self.bbt, &self.l, w, rho),
        }
    }

    /// Matrix that must be positive semidefinite: -H - εI or D + εI.
    ///
    /// Affine in (W, ρ).
    pub fn constraint_matrix(&self, w: &DMatrix<f64>, rho: f64, eps: f64) -> DMatrix<f64> {
        let cert = self.certificate_matrix(w, rho);
        let eye = DMatrix::<f64>::identity(cert.nrows(), cert.ncols());
        match self.mode {
            CertificateMode::HMode => -cert - eye * eps,
            CertificateMode::DMode => cert + eye * eps,
        }
    }
}
