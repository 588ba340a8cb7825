//! Dense linear-algebra helpers shared by the rest of the crate.
//!
//! Everything here is a thin layer over [`ndarray`] and [`ndarray_linalg`]:
//! reshaping, Kronecker products, Hermitian matrix functions, and the
//! truncated Schmidt (singular value) decomposition used to split two-site
//! wavefunctions.

use ndarray as nd;
use ndarray_linalg::{ Eigh, SVDInto, UPLO };
use num_traits::{ Float, One, Zero };
use tracing::debug;
use crate::{
    ScalarExt,
    itebd::{ ITEBDError, ITEBDResult },
};

/// Copy the elements of `a` in logical (row-major) order into a new array of
/// the given shape.
///
/// Unlike [`ArrayBase::into_shape`][nd::ArrayBase::into_shape], this works for
/// any memory layout.
pub(crate) fn reshape<A, S, E, D, Sh>(a: &nd::ArrayBase<S, E>, shape: Sh)
    -> Result<nd::Array<A, D>, nd::ShapeError>
where
    A: Clone,
    S: nd::Data<Elem = A>,
    E: nd::Dimension,
    D: nd::Dimension,
    Sh: Into<nd::StrideShape<D>>,
{
    nd::Array::from_shape_vec(shape, a.iter().cloned().collect())
}

/// Conjugate transpose of a matrix.
pub fn adjoint<A, S>(a: &nd::ArrayBase<S, nd::Ix2>) -> nd::Array2<A>
where
    A: ScalarExt,
    S: nd::Data<Elem = A>,
{
    a.t().mapv(|ak| ak.conj())
}

/// Explicit transpose (without conjugation) in standard layout.
pub(crate) fn transpose<A>(a: &nd::Array2<A>) -> nd::Array2<A>
where A: Clone
{
    let (m, n) = a.dim();
    nd::Array2::from_shape_fn((n, m), |(i, j)| a[[j, i]].clone())
}

/// Kronecker product of two matrices.
///
/// The row (column) index of the result is `i * b.nrows() + k`
/// (`j * b.ncols() + l`) for the element `a[[i, j]] * b[[k, l]]`, so that a
/// two-site operator `kron(a, b)` acts with `a` on the left site and `b` on the
/// right site.
pub fn kron<A>(a: &nd::Array2<A>, b: &nd::Array2<A>) -> nd::Array2<A>
where A: ScalarExt
{
    let (ma, na) = a.dim();
    let (mb, nb) = b.dim();
    nd::Array2::from_shape_fn(
        (ma * mb, na * nb),
        |(ik, jl)| a[[ik / mb, jl / nb]] * b[[ik % mb, jl % nb]],
    )
}

/// Square diagonal matrix holding real values.
pub(crate) fn diag_real<A>(v: &nd::Array1<A::Real>) -> nd::Array2<A>
where A: ScalarExt
{
    nd::Array2::from_diag(&v.mapv(A::from_real))
}

/// Frobenius norm of any array.
pub(crate) fn norm_fro<A, S, D>(a: &nd::ArrayBase<S, D>) -> A::Real
where
    A: ScalarExt,
    S: nd::Data<Elem = A>,
    D: nd::Dimension,
{
    Float::sqrt(
        a.iter()
            .map(|ak| ak.square())
            .fold(A::Real::zero(), |acc, x| acc + x)
    )
}

/// Return `true` if `a` is square and equal to its adjoint up to an absolute
/// tolerance relative to its largest element.
pub fn is_hermitian<A>(a: &nd::Array2<A>, tol: A::Real) -> bool
where A: ScalarExt
{
    if !a.is_square() { return false; }
    let scale
        = a.iter()
        .map(|ak| ak.abs())
        .fold(A::Real::zero(), Float::max);
    let bound = tol * Float::max(scale, A::Real::one());
    let adj = adjoint(a);
    nd::Zip::from(a).and(&adj)
        .all(|x, y| (*x - *y).abs() <= bound)
}

/// Compute `exp(t H)` for a Hermitian matrix `H` and real `t` via
/// eigendecomposition.
///
/// Only the upper triangle of `h` is read.
pub fn expm_hermitian<A>(h: &nd::Array2<A>, t: A::Real)
    -> ITEBDResult<nd::Array2<A>>
where A: ScalarExt
{
    let (e, v) = h.eigh(UPLO::Upper)?;
    let exp_e: nd::Array1<A>
        = e.mapv(|ek| A::from_real(Float::exp(ek * t)));
    let u = adjoint(&v);
    Ok(v.dot(&nd::Array2::from_diag(&exp_e)).dot(&u))
}

/// Factor a Hermitian positive semi-definite matrix as `H = X X†`, keeping only
/// eigenvalues above `cutoff` times the largest one.
///
/// `X` has shape `n × k` where `k` is the number of retained eigenvalues.
/// Fails if `H` has no positive eigenvalue or has a significantly negative one.
pub(crate) fn sqrt_factor<A>(h: &nd::Array2<A>, cutoff: A::Real)
    -> ITEBDResult<nd::Array2<A>>
where A: ScalarExt
{
    let (e, w) = h.eigh(UPLO::Upper)?;
    let emax
        = e.iter().copied()
        .fold(A::Real::zero(), |acc, ek| Float::max(acc, Float::abs(ek)));
    if emax <= A::Real::zero() {
        return Err(ITEBDError::IllPosedState {
            reason: "fixed point of the transfer operator vanishes",
        });
    }
    let negative_bound = emax * A::real(1e-8);
    if e.iter().any(|ek| *ek < -negative_bound) {
        return Err(ITEBDError::IllPosedState {
            reason: "fixed point of the transfer operator is not positive",
        });
    }
    let keep: Vec<usize>
        = (0..e.len())
        .filter(|k| e[*k] > emax * cutoff)
        .collect();
    let n = w.nrows();
    let x = nd::Array2::from_shape_fn(
        (n, keep.len()),
        |(i, j)| w[[i, keep[j]]] * A::from_real(Float::sqrt(e[keep[j]])),
    );
    Ok(x)
}

/// Data struct holding a truncated Schmidt decomposition `q ≈ u · diag(s) · vt`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Schmidt<A: ScalarExt> {
    /// Left Schmidt column vectors.
    pub u: nd::Array2<A>,
    /// Schmidt values, normalized so that their squares sum to 1.
    pub s: nd::Array1<A::Real>,
    /// Right Schmidt row vectors.
    pub vt: nd::Array2<A>,
    /// Schmidt rank after truncation.
    pub rank: usize,
    /// Squared weight of the discarded Schmidt values, relative to the total.
    pub discarded: A::Real,
}

/// Perform a singular value decomposition of `q` and truncate it.
///
/// Singular values are first normalized. Values at or below `cutoff` times the
/// largest one are always dropped. If `tolerance` is non-negative, the longest
/// tail of the remaining values whose accumulated squared weight does not
/// exceed `tolerance` is dropped as well. Finally, if `max_dim` is non-zero, at
/// most `max_dim` values are kept. At least one value is always kept, and the
/// surviving values are renormalized.
///
/// Fails with [`ITEBDError::VanishingNorm`] if `q` is zero or not finite.
/// Whether a small `q` is negligible depends on where it came from, and is left
/// to the caller.
pub(crate) fn local_decomp<A>(
    q: nd::Array2<A>,
    cutoff: A::Real,
    tolerance: A::Real,
    max_dim: usize,
) -> ITEBDResult<Schmidt<A>>
where A: ScalarExt
{
    let (Some(u), mut s, Some(vt)) = q.svd_into(true, true)?
        else { unreachable!() };
    let zero = A::Real::zero();
    let norm: A::Real = Float::sqrt(
        s.iter()
            .map(|sj| *sj * *sj)
            .fold(zero, |acc, x| acc + x)
    );
    if !(norm > zero) || !Float::is_finite(norm) {
        return Err(ITEBDError::VanishingNorm);
    }
    s.mapv_inplace(|sj| sj / norm);

    let smax = s.get(0).copied().unwrap_or(zero);
    let mut rank
        = s.iter()
        .take_while(|sj| **sj > smax * cutoff)
        .count()
        .max(1);
    if tolerance >= zero {
        let mut tail: A::Real
            = s.iter().skip(rank)
            .map(|sj| *sj * *sj)
            .fold(zero, |acc, x| acc + x);
        while rank > 1 {
            let next = tail + s[rank - 1] * s[rank - 1];
            if next > tolerance { break; }
            tail = next;
            rank -= 1;
        }
    }
    if max_dim > 0 { rank = rank.min(max_dim); }
    let discarded: A::Real
        = s.iter().skip(rank)
        .map(|sj| *sj * *sj)
        .fold(zero, |acc, x| acc + x);

    let s: nd::Array1<A::Real> = s.slice(nd::s![..rank]).to_owned();
    let renorm: A::Real = Float::sqrt(
        s.iter()
            .map(|sj| *sj * *sj)
            .fold(zero, |acc, x| acc + x)
    );
    let s = s.mapv(|sj| sj / renorm);
    let u = u.slice(nd::s![.., ..rank]).to_owned();
    let vt = vt.slice(nd::s![..rank, ..]).to_owned();
    debug!(rank, discarded = ?discarded, "schmidt decomposition");
    Ok(Schmidt { u, s, vt, rank, discarded })
}
