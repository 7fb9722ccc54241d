//! Linear algebra layer.
//!
//! Sparse constraint-matrix operations and the small dense solves both
//! backends need.

pub mod dense;
pub mod sparse;
