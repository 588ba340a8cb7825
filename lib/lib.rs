//! Infinite, translationally invariant matrix product states with a two-site
//! unit cell, and the infinite time-evolving block decimation (iTEBD)
//! algorithm used to find their ground states in imaginary time.
//!
//! The state is stored in Vidal's Γ–Λ form. Two site tensors `A` and `B`
//! alternate along the chain, separated by two Schmidt vectors `lA` (to the
//! right of `A`) and `lB` (to the right of `B`):
//!
//! ```text
//!  ... --- lB --- A --- lA --- B --- lB --- A --- lA --- B --- lB --- ...
//!                 |            |            |            |
//!              site 0       site 1       site 2       site 3
//! ```
//!
//! See [`itebd`] for the state itself and [`evolve`] for imaginary-time
//! evolution.

use num_complex::Complex;
use num_traits::Float;
use ndarray_linalg::types::{ Lapack, Scalar };

pub mod linalg;
pub mod transfer;
pub mod itebd;
pub mod ops;
pub mod evolve;

pub use itebd::{ ITEBD, ITEBDError, ITEBDResult, Parity };
pub use evolve::{
    ITimeConfig,
    Report,
    Reporter,
    TracingReporter,
    evolve_itime,
    evolve_itime_with,
};

/// Convenience trait to identify scalar types (real or complex) that can be
/// used in the linear-algebraic operations of this crate.
///
/// Implemented for `f32`, `f64`, and their complex counterparts.
pub trait ScalarExt: Scalar + Lapack {
    /// Construct from real and imaginary components.
    ///
    /// For real types the imaginary part is discarded, which is appropriate
    /// only where the value is known to be real up to rounding.
    fn from_components(re: Self::Real, im: Self::Real) -> Self;
}

impl ScalarExt for f32 {
    fn from_components(re: f32, _im: f32) -> Self { re }
}

impl ScalarExt for f64 {
    fn from_components(re: f64, _im: f64) -> Self { re }
}

impl<T> ScalarExt for Complex<T>
where
    Complex<T>: Scalar<Real = T> + Lapack,
    T: Float,
{
    fn from_components(re: T, im: T) -> Self { Complex::new(re, im) }
}
