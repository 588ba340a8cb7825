//! Transfer operators of folded site tensors.
//!
//! A folded tensor `M` has axis signature `[ u_left, s, u_right ]`, where the
//! Schmidt values of the right bond have already been absorbed. Contracting `M`
//! with its conjugate over the physical index `s` gives a linear map on
//! bond-space matrices, which can act either towards the right (moving a left
//! environment across the site) or towards the left (moving a right
//! environment across the site). An operator `O` may be inserted between ket
//! and bra, in which case the ket physical index is contracted with the
//! columns of `O` and the bra index with its rows:
//!
//! ```text
//!   .--- M ---      --- M ---.
//!   |    |              |    |
//!   L    O              O    R
//!   |    |              |    |
//!   '--- M* --      --- M* --'
//! ```
//!
//! Environments are stored with the ket bond index first. A left environment
//! `L` and a right environment `R` sitting on the same cut are closed by the
//! element-wise pairing Σ<sub>*b*,*b'*</sub> `L[b, b'] R[b, b']`.

use ndarray as nd;
use ndarray_linalg::{ Eig, types::Scalar };
use num_traits::{ Float, Zero };
use crate::{
    ScalarExt,
    itebd::{ ITEBDError, ITEBDResult },
    linalg::reshape,
};

/// Apply an operator to the physical index of a rank-3 tensor.
pub(crate) fn apply_physical<A>(op: &nd::Array2<A>, m: &nd::Array3<A>)
    -> nd::Array3<A>
where A: ScalarExt
{
    let (dl, _, dr) = m.dim();
    let mut k: nd::Array3<A> = nd::Array3::zeros((dl, op.nrows(), dr));
    k.axis_iter_mut(nd::Axis(0))
        .zip(m.axis_iter(nd::Axis(0)))
        .for_each(|(mut kv, mv)| { kv.assign(&op.dot(&mv)); });
    k
}

/// Move a left environment across a site:
/// `L'[b, b'] = Σ O[t, s] M[a, s, b] L[a, a'] M*[a', t, b']`.
pub(crate) fn transfer_left<A>(
    l: &nd::Array2<A>,
    m: &nd::Array3<A>,
    op: Option<&nd::Array2<A>>,
) -> nd::Array2<A>
where A: ScalarExt
{
    let ket_op = op.map(|o| apply_physical(o, m));
    let ket = ket_op.as_ref().unwrap_or(m);
    let dr = m.shape()[2];
    let mut acc: nd::Array2<A> = nd::Array2::zeros((dr, dr));
    ket.axis_iter(nd::Axis(1))
        .zip(m.axis_iter(nd::Axis(1)))
        .for_each(|(kt, mt)| {
            let mt_conj = mt.mapv(|x| x.conj());
            acc += &kt.t().dot(l).dot(&mt_conj);
        });
    acc
}

/// Move a right environment across a site:
/// `R'[a, a'] = Σ O[t, s] M[a, s, b] R[b, b'] M*[a', t, b']`.
pub(crate) fn transfer_right<A>(
    r: &nd::Array2<A>,
    m: &nd::Array3<A>,
    op: Option<&nd::Array2<A>>,
) -> nd::Array2<A>
where A: ScalarExt
{
    let ket_op = op.map(|o| apply_physical(o, m));
    let ket = ket_op.as_ref().unwrap_or(m);
    let dl = m.shape()[0];
    let mut acc: nd::Array2<A> = nd::Array2::zeros((dl, dl));
    ket.axis_iter(nd::Axis(1))
        .zip(m.axis_iter(nd::Axis(1)))
        .for_each(|(kt, mt)| {
            let mt_adj = mt.t().mapv(|x| x.conj());
            acc += &kt.dot(r).dot(&mt_adj);
        });
    acc
}

/// Pair a left and a right environment sitting on the same cut.
pub(crate) fn close<A>(l: &nd::Array2<A>, r: &nd::Array2<A>) -> A
where A: ScalarExt
{
    nd::Zip::from(l).and(r)
        .fold(A::zero(), |acc, lk, rk| acc + *lk * *rk)
}

/// Contract two neighboring folded tensors over their shared bond, fusing
/// their physical indices as `s1 * d2 + s2`.
pub(crate) fn fuse<A>(m1: &nd::Array3<A>, m2: &nd::Array3<A>)
    -> ITEBDResult<nd::Array3<A>>
where A: ScalarExt
{
    let (dl, d1, dm) = m1.dim();
    let (_, d2, dr) = m2.dim();
    let a: nd::Array2<A> = reshape(m1, (dl * d1, dm))?;
    let b: nd::Array2<A> = reshape(m2, (dm, d2 * dr))?;
    let ab = a.dot(&b);
    Ok(reshape(&ab, (dl, d1 * d2, dr))?)
}

/// Contract the bond indices of a rank-3 tensor with matrices on either side:
/// `G'[i, s, j] = Σ Q[i, a] G[a, s, b] P[b, j]`.
pub(crate) fn bond_transform<A>(
    q: &nd::Array2<A>,
    g: &nd::Array3<A>,
    p: &nd::Array2<A>,
) -> ITEBDResult<nd::Array3<A>>
where A: ScalarExt
{
    let (dl, d, dr) = g.dim();
    let g2: nd::Array2<A> = reshape(g, (dl, d * dr))?;
    let qg: nd::Array2<A> = reshape(&q.dot(&g2), (q.nrows() * d, dr))?;
    let qgp = qg.dot(p);
    Ok(reshape(&qgp, (q.nrows(), d, p.ncols()))?)
}

/// Dense matrix of the right-acting transfer map of `m`, acting on
/// environments flattened as `R[b, b'] -> b * D + b'`.
///
/// The transpose of this matrix is the matrix of [`transfer_left`] (without an
/// operator) under the same flattening.
pub(crate) fn transfer_matrix<A>(m: &nd::Array3<A>) -> nd::Array2<A>
where A: ScalarExt
{
    let (dl, d, dr) = m.dim();
    nd::Array2::from_shape_fn(
        (dl * dl, dr * dr),
        |(aap, bbp)| {
            let a = aap / dl;
            let ap = aap % dl;
            let b = bbp / dr;
            let bp = bbp % dr;
            (0..d)
                .map(|s| m[[a, s, b]] * m[[ap, s, bp]].conj())
                .fold(A::zero(), |acc, x| acc + x)
        },
    )
}

/// Relative gap below which the two largest transfer eigenvalues are treated
/// as degenerate.
pub(crate) const DEGENERACY_TOL: f64 = 1e-10;

/// Find the dominant eigenvalue and eigenvector of a transfer matrix acting on
/// `dim × dim` environments.
///
/// The eigenvector is reshaped to a matrix, its global phase is fixed so that
/// its trace is real and positive, and it is made exactly Hermitian.
///
/// Fails if the dominant eigenvalue is not unique in magnitude or is not real
/// and positive.
pub(crate) fn dominant_fixed_point<A>(t: &nd::Array2<A>, dim: usize)
    -> ITEBDResult<(A::Real, nd::Array2<A>)>
where A: ScalarExt
{
    let (vals, vecs) = t.eig()?;
    let zero = A::Real::zero();
    let mut order: Vec<usize> = (0..vals.len()).collect();
    order.sort_by(|&i, &j| {
        Scalar::abs(vals[j]).partial_cmp(&Scalar::abs(vals[i]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let lead = *order.first()
        .ok_or(ITEBDError::IllPosedState { reason: "empty transfer operator" })?;
    let eta = vals[lead];
    let eta_abs = Scalar::abs(eta);
    if !(eta_abs > zero) {
        return Err(ITEBDError::IllPosedState {
            reason: "transfer operator has vanishing spectrum",
        });
    }
    if let Some(&second) = order.get(1) {
        let gap = eta_abs - Scalar::abs(vals[second]);
        if gap <= eta_abs * A::real(DEGENERACY_TOL) {
            return Err(ITEBDError::IllPosedState {
                reason: "dominant transfer eigenvalue is degenerate",
            });
        }
    }
    let eta_re = Scalar::re(&eta);
    if eta_re <= zero || Float::abs(Scalar::im(&eta)) > eta_abs * A::real(1e-8) {
        return Err(ITEBDError::IllPosedState {
            reason: "dominant transfer eigenvalue is not real and positive",
        });
    }

    let v: nd::Array2<A::Complex> = reshape(&vecs.column(lead), (dim, dim))?;
    let trace: A::Complex
        = v.diag().iter().copied()
        .fold(A::Complex::zero(), |acc, x| acc + x);
    let phase: A::Complex
        = if Scalar::abs(trace) > zero {
            trace.div_real(Scalar::abs(trace))
        } else {
            let big
                = v.iter().copied()
                .fold(A::Complex::zero(), |acc, x| {
                    if Scalar::abs(x) > Scalar::abs(acc) { x } else { acc }
                });
            big.div_real(Scalar::abs(big))
        };
    let v: nd::Array2<A>
        = v.mapv(|x| {
            let y = x / phase;
            A::from_components(Scalar::re(&y), Scalar::im(&y))
        });
    let half = A::from_real(A::real(0.5));
    let herm = nd::Array2::from_shape_fn(
        (dim, dim),
        |(i, j)| (v[[i, j]] + v[[j, i]].conj()) * half,
    );
    Ok((eta_re, herm))
}
