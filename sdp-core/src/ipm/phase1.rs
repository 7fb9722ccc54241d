//! Phase I: find a strictly feasible starting point.
//!
//! The augmented problem shifts every cone block by a scalar τ along the
//! cone's unit element and minimizes τ:
//!
//! ```text
//! minimize    τ
//! subject to  b - A x + τ e ∈ K
//!             1 + τ ≥ 0
//! ```
//!
//! Any point with τ < 0 is strictly feasible for the original problem. The
//! bound τ ≥ -1 keeps the objective bounded below, and a wide box
//! `|x_j| ≤ R` (not shifted by τ) keeps the barrier bounded below when the
//! original feasible set is unbounded.

use crate::cones::build_cones;
use crate::linalg::sparse;
use crate::problem::{ConeSpec, ProblemData};

/// Box radius relative to max(1, ||b||_∞).
const BOX_RADIUS: f64 = 1e6;

/// Build the phase I problem. The shift variable τ is the last column.
pub(crate) fn augmented_problem(prob: &ProblemData) -> ProblemData {
    let m = prob.num_constraints();
    let n = prob.num_vars();
    let tau_col = n;

    let mut triplets: Vec<(usize, usize, f64)> = prob
        .A
        .iter()
        .map(|(val, (row, col))| (row, col, *val))
        .collect();

    // Column τ holds -e for every block so that s = b - A x + τ e.
    let cones = build_cones(&prob.cones);
    for (cone, off) in cones.iter().zip(prob.cone_offsets()) {
        let mut e = vec![0.0; cone.dim()];
        cone.unit_element(&mut e);
        for (i, v) in e.into_iter().enumerate() {
            if v != 0.0 {
                triplets.push((off + i, tau_col, -v));
            }
        }
    }
    // Extra rows: 1 + τ ≥ 0, then R - x_j ≥ 0 and R + x_j ≥ 0
    triplets.push((m, tau_col, -1.0));
    let radius = BOX_RADIUS * prob.b.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    let mut b = prob.b.clone();
    b.push(1.0);
    for j in 0..n {
        triplets.push((m + 1 + 2 * j, j, 1.0));
        triplets.push((m + 2 + 2 * j, j, -1.0));
        b.push(radius);
        b.push(radius);
    }

    let mut q = vec![0.0; n + 1];
    q[tau_col] = 1.0;

    let mut cones_aug = prob.cones.clone();
    cones_aug.push(ConeSpec::NonNeg { dim: 1 + 2 * n });

    ProblemData {
        q,
        A: sparse::from_triplets(m + 1 + 2 * n, n + 1, triplets),
        b,
        cones: cones_aug,
    }
}
