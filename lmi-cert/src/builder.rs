//! Lowering of a certificate template into a conic problem.
//!
//! Decision vector x = (W entries in svec order, ρ). Every constraint is an
//! LMI `F(W, ρ) ⪰ 0` with F affine, so its coefficient matrices are read off
//! by evaluating F at the origin and at each basis direction:
//!
//! ```text
//! F_0 = F(0, 0)          →  b_block  =  svec(F_0)
//! F_k = F(E_k, 0) - F_0  →  A[block, k] = -svec(F_k)
//! ```
//!
//! Conic blocks, in order: the certificate LMI, W - α_min I ⪰ 0,
//! α_max I - W ⪰ 0, and ρ ≥ 0.

use nalgebra::DMatrix;
use sdp_core::cones::psd::mat_to_svec;
use sdp_core::linalg::sparse;
use sdp_core::{ConeSpec, ProblemData};

use crate::certificate::CertificateTemplate;
use crate::model::Bounds;

/// Position of W and ρ in the decision vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLayout {
    n: usize,
}

impl VariableLayout {
    /// Layout for an n×n certificate W.
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    /// Order of W.
    pub fn order(&self) -> usize {
        self.n
    }

    /// Number of free entries of W.
    pub fn num_w(&self) -> usize {
        self.n * (self.n + 1) / 2
    }

    /// Index of ρ.
    pub fn rho_index(&self) -> usize {
        self.num_w()
    }

    /// Total number of decision variables.
    pub fn num_vars(&self) -> usize {
        self.num_w() + 1
    }

    /// (row, col) of W entry k, upper triangle, column-major.
    fn entry(&self, k: usize) -> (usize, usize) {
        let mut idx = 0;
        for j in 0..self.n {
            for i in 0..=j {
                if idx == k {
                    return (i, j);
                }
                idx += 1;
            }
        }
        unreachable!("W entry {} out of range for order {}", k, self.n)
    }

    /// Symmetric basis matrix of W entry k.
    pub fn basis(&self, k: usize) -> DMatrix<f64> {
        let (i, j) = self.entry(k);
        let mut e = DMatrix::<f64>::zeros(self.n, self.n);
        e[(i, j)] = 1.0;
        e[(j, i)] = 1.0;
        e
    }

    /// Symmetric W from a decision vector.
    pub fn w_from_x(&self, x: &[f64]) -> DMatrix<f64> {
        let mut w = DMatrix::<f64>::zeros(self.n, self.n);
        let mut idx = 0;
        for j in 0..self.n {
            for i in 0..=j {
                w[(i, j)] = x[idx];
                w[(j, i)] = x[idx];
                idx += 1;
            }
        }
        w
    }

    /// ρ from a decision vector.
    pub fn rho_from_x(&self, x: &[f64]) -> f64 {
        x[self.rho_index()]
    }
}

/// Conic problem together with its variable layout.
#[derive(Debug, Clone)]
pub struct LoweredProblem {
    /// min ρ over the certificate constraints
    pub problem: ProblemData,
    /// How to read W and ρ back from x
    pub layout: VariableLayout,
}

/// Assemble the conic problem for a certificate template.
pub fn build_problem(template: &CertificateTemplate, bounds: &Bounds, eps: f64) -> LoweredProblem {
    let n = template.order();
    let layout = VariableLayout::new(n);
    let eye = DMatrix::<f64>::identity(n, n);

    let mut assembler = Assembler::new(layout);
    assembler.push_lmi(template.size(), |w, rho| template.constraint_matrix(w, rho, eps));
    assembler.push_lmi(n, |w, _| w - &eye * bounds.alpha_min);
    assembler.push_lmi(n, |w, _| &eye * bounds.alpha_max - w);
    assembler.push_rho_nonneg();

    let mut q = vec![0.0; layout.num_vars()];
    q[layout.rho_index()] = 1.0;

    let problem = assembler.finish(q);
    log::debug!(
        "{}: {} variables, {} slack rows, cones {:?}",
        template.mode,
        problem.num_vars(),
        problem.num_constraints(),
        problem.cones
    );
    LoweredProblem { problem, layout }
}

/// Accumulates blocks of A, b and the cone list.
struct Assembler {
    layout: VariableLayout,
    triplets: Vec<(usize, usize, f64)>,
    b: Vec<f64>,
    cones: Vec<ConeSpec>,
}

impl Assembler {
    fn new(layout: VariableLayout) -> Self {
        Self {
            layout,
            triplets: Vec::new(),
            b: Vec::new(),
            cones: Vec::new(),
        }
    }

    /// Add the LMI `f(W, ρ) ⪰ 0` of side `size`; f must be affine.
    fn push_lmi<F>(&mut self, size: usize, f: F)
    where
        F: Fn(&DMatrix<f64>, f64) -> DMatrix<f64>,
    {
        let offset = self.b.len();
        let dim = size * (size + 1) / 2;
        let n = self.layout.order();
        let zero = DMatrix::<f64>::zeros(n, n);

        let f0 = f(&zero, 0.0);
        let mut svec = vec![0.0; dim];
        mat_to_svec(&f0, &mut svec);
        self.b.extend_from_slice(&svec);

        let mut push_column = |col: usize, fk: DMatrix<f64>, triplets: &mut Vec<(usize, usize, f64)>| {
            mat_to_svec(&(fk - &f0), &mut svec);
            for (r, &v) in svec.iter().enumerate() {
                if v != 0.0 {
                    triplets.push((offset + r, col, -v));
                }
            }
        };

        for k in 0..self.layout.num_w() {
            push_column(k, f(&self.layout.basis(k), 0.0), &mut self.triplets);
        }
        push_column(self.layout.rho_index(), f(&zero, 1.0), &mut self.triplets);

        self.cones.push(ConeSpec::Psd { n: size });
    }

    /// Add ρ ≥ 0.
    fn push_rho_nonneg(&mut self) {
        let row = self.b.len();
        self.b.push(0.0);
        self.triplets.push((row, self.layout.rho_index(), -1.0));
        self.cones.push(ConeSpec::NonNeg { dim: 1 });
    }

    fn finish(self, q: Vec<f64>) -> ProblemData {
        let m = self.b.len();
        ProblemData {
            q,
            A: sparse::from_triplets(m, self.layout.num_vars(), self.triplets),
            b: self.b,
            cones: self.cones,
        }
    }
}
