//! Cone kernel trait definition.
//!
//! This module defines the interface both backends rely on. The barrier
//! backend needs barrier evaluations, interior tests and step-to-boundary
//! calculations; the ADMM backend only needs the Euclidean projection.

/// Core cone kernel interface.
///
/// # Coordinate Convention
///
/// All methods operate on contiguous slices of the global slack vector.
/// The cone kernel is responsible for a specific range [offset .. offset+dim].
///
/// # Barrier Function
///
/// Each cone has a logarithmically homogeneous self-concordant barrier f(s):
/// - `barrier_value(s)`: compute f(s)
/// - `barrier_grad(s, grad)`: compute ∇f(s)
/// - `barrier_hess_apply(s, v, out)`: compute ∇²f(s) * v
/// - `barrier_hess_sqrt_apply(s, v, out)`: compute W v for a factor
///   ∇²f(s) = WᵀW, which lets Newton systems be formed as Gram matrices
///
/// Barrier methods assume s is in the strict interior of the cone, except
/// `barrier_value`, which returns +∞ outside of it.
pub trait ConeKernel: Send + Sync {
    /// Dimension of this cone in the m-dimensional slack space.
    fn dim(&self) -> usize;

    /// Barrier degree ν for this cone.
    ///
    /// - NonNeg(n): n
    /// - PSD(n): n
    fn barrier_degree(&self) -> usize;

    /// Check if s is in the strict interior of K, with a safety margin
    /// relative to ||s||.
    fn is_interior(&self, s: &[f64]) -> bool;

    /// Smallest "eigenvalue" of s with respect to the cone's unit element,
    /// i.e. the largest t with s - t·e ∈ K.
    fn min_eigenvalue(&self, s: &[f64]) -> f64;

    /// Write the unit element e of the cone (ones, or svec(I)).
    fn unit_element(&self, out: &mut [f64]);

    /// Compute maximum step size α such that s + α * ds remains in K.
    ///
    /// Returns +∞ if the direction never reaches the boundary. The caller
    /// applies a safety factor (e.g. 0.99 * α_max).
    fn step_to_boundary(&self, s: &[f64], ds: &[f64]) -> f64;

    /// Evaluate the barrier function f(s), +∞ outside the interior.
    fn barrier_value(&self, s: &[f64]) -> f64;

    /// Compute the barrier gradient ∇f(s).
    fn barrier_grad(&self, s: &[f64], grad_out: &mut [f64]);

    /// Compute the barrier Hessian-vector product ∇²f(s) * v.
    fn barrier_hess_apply(&self, s: &[f64], v: &[f64], out: &mut [f64]);

    /// Apply a square-root factor W of the barrier Hessian, ∇²f(s) = WᵀW,
    /// so that `⟨v, ∇²f(s) v⟩ = ‖W v‖²`.
    fn barrier_hess_sqrt_apply(&self, s: &[f64], v: &[f64], out: &mut [f64]);

    /// Euclidean projection of v onto K.
    fn project(&self, v: &[f64], out: &mut [f64]);
}
