//! Nonnegative orthant ℝ₊^d.
//!
//! Carries the scalar rows of an LMI problem: `ρ ≥ 0`, and in phase I the
//! auxiliary `1 + τ ≥ 0` and box rows. The barrier is `-∑ log sᵢ`, with
//! gradient `-1/sᵢ` and diagonal Hessian `1/sᵢ²`.

use super::traits::ConeKernel;

/// Relative margin for strict interiority: sᵢ > tol · max(1, ‖s‖∞).
const INTERIOR_MARGIN: f64 = 1e-12;

/// The orthant ℝ₊^dim.
#[derive(Debug, Clone)]
pub struct NonNegCone {
    dim: usize,
}

impl NonNegCone {
    /// Orthant of dimension `dim` (must be positive).
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "orthant dimension must be positive");
        Self { dim }
    }

    #[inline]
    fn check(&self, len: usize) {
        debug_assert_eq!(len, self.dim, "slice length does not match orthant dimension");
    }
}

impl ConeKernel for NonNegCone {
    fn dim(&self) -> usize {
        self.dim
    }

    fn barrier_degree(&self) -> usize {
        self.dim
    }

    fn is_interior(&self, s: &[f64]) -> bool {
        self.check(s.len());
        let mut scale = 1.0_f64;
        for &x in s {
            if !x.is_finite() {
                return false;
            }
            scale = scale.max(x.abs());
        }
        s.iter().all(|&x| x > INTERIOR_MARGIN * scale)
    }

    fn min_eigenvalue(&self, s: &[f64]) -> f64 {
        s.iter().copied().fold(f64::INFINITY, f64::min)
    }

    fn unit_element(&self, out: &mut [f64]) {
        self.check(out.len());
        out.fill(1.0);
    }

    fn step_to_boundary(&self, s: &[f64], ds: &[f64]) -> f64 {
        self.check(s.len());
        self.check(ds.len());
        s.iter()
            .zip(ds)
            .filter(|(_, &d)| d < 0.0)
            .map(|(&x, &d)| -x / d)
            .fold(f64::INFINITY, f64::min)
    }

    fn barrier_value(&self, s: &[f64]) -> f64 {
        self.check(s.len());
        let mut value = 0.0;
        for &x in s {
            if !(x > 0.0 && x.is_finite()) {
                return f64::INFINITY;
            }
            value -= x.ln();
        }
        value
    }

    fn barrier_grad(&self, s: &[f64], grad_out: &mut [f64]) {
        self.check(s.len());
        self.check(grad_out.len());
        for (g, &x) in grad_out.iter_mut().zip(s) {
            *g = -x.recip();
        }
    }

    fn barrier_hess_apply(&self, s: &[f64], v: &[f64], out: &mut [f64]) {
        self.check(s.len());
        self.check(v.len());
        self.check(out.len());
        for ((o, &x), &vi) in out.iter_mut().zip(s).zip(v) {
            *o = vi / (x * x);
        }
    }

    fn barrier_hess_sqrt_apply(&self, s: &[f64], v: &[f64], out: &mut [f64]) {
        self.check(s.len());
        self.check(v.len());
        self.check(out.len());
        for ((o, &x), &vi) in out.iter_mut().zip(s).zip(v) {
            *o = vi / x;
        }
    }

    fn project(&self, v: &[f64], out: &mut [f64]) {
        self.check(v.len());
        self.check(out.len());
        for (o, &vi) in out.iter_mut().zip(v) {
            *o = vi.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_rejects_boundary_and_nan() {
        let cone = NonNegCone::new(2);
        assert!(cone.is_interior(&[1e-3, 5.0]));
        assert!(!cone.is_interior(&[0.0, 5.0]));
        assert!(!cone.is_interior(&[-1e-9, 5.0]));
        assert!(!cone.is_interior(&[f64::NAN, 5.0]));
        // margin scales with the largest entry
        assert!(!cone.is_interior(&[1e-6, 1e8]));
    }

    #[test]
    fn test_step_stops_at_first_crossing() {
        let cone = NonNegCone::new(2);
        let s = [4.0, 1.0];
        assert_eq!(cone.step_to_boundary(&s, &[0.0, 2.0]), f64::INFINITY);
        // 4 - 1α hits zero at 4, 1 - 0.5α at 2
        let alpha = cone.step_to_boundary(&s, &[-1.0, -0.5]);
        assert!((alpha - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_barrier_derivatives_on_rho_row() {
        let cone = NonNegCone::new(1);
        let rho = [0.5];

        assert!((cone.barrier_value(&rho) - 2f64.ln()).abs() < 1e-12);

        let mut grad = [0.0];
        cone.barrier_grad(&rho, &mut grad);
        assert!((grad[0] + 2.0).abs() < 1e-12);

        let mut hv = [0.0];
        cone.barrier_hess_apply(&rho, &[3.0], &mut hv);
        assert!((hv[0] - 12.0).abs() < 1e-12);

        let mut wv = [0.0];
        cone.barrier_hess_sqrt_apply(&rho, &[3.0], &mut wv);
        assert!((wv[0] * wv[0] - 3.0 * hv[0]).abs() < 1e-12);

        assert_eq!(cone.barrier_value(&[-0.5]), f64::INFINITY);
    }

    #[test]
    fn test_projection_and_min_entry() {
        let cone = NonNegCone::new(3);
        let v = [2.0, -7.0, 0.0];
        let mut out = [1.0; 3];
        cone.project(&v, &mut out);
        assert_eq!(out, [2.0, 0.0, 0.0]);
        assert_eq!(cone.min_eigenvalue(&v), -7.0);

        let mut e = [0.0; 3];
        cone.unit_element(&mut e);
        assert_eq!(e, [1.0; 3]);
    }
}
