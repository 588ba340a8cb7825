//! Infinite, translationally invariant matrix product states with a two-site
//! unit cell.
//!
//! The state is held in Vidal's Γ–Λ form: two site tensors `A` (even sites) and
//! `B` (odd sites) with axis signature `[ u_left, s, u_right ]`, and two
//! Schmidt vectors `lA` and `lB` on the bonds immediately to the right of `A`
//! and `B`, respectively. For convenience, the "folded" tensors `AlA` and `BlB`
//! (each site tensor with its right Schmidt vector absorbed) are stored as well.
//!
//! ```text
//!        lB       lA       lB       lA
//!  ... ----- A ----- B ----- A ----- B ----- ...
//!            |       |       |       |
//!          k = 0   k = 1   k = 2   k = 3
//! ```
//!
//! All operations are pure: they leave `self` untouched and return a new state
//! with its own storage.
//!
//! Expectation values are computed by contracting left and right environments
//! of the infinite chain. If the state is known to be in canonical form, these
//! are simply `diag(λ²)` on the left and the identity on the right; otherwise
//! they are found as dominant eigenvectors of the transfer matrix of the unit
//! cell.
//!
//! # Example
//!
//! ```no_run
//! use itebd::{ ITEBD, Parity, ops };
//! use rand::thread_rng;
//!
//! let h12: ndarray::Array2<f64> = ops::ising_h12(1.0, 1.0);
//! let u = itebd::linalg::expm_hermitian(&h12, -0.05).unwrap();
//!
//! let mut psi: ITEBD<f64> = ITEBD::random(2, &mut thread_rng()).unwrap();
//! for _ in 0..200 {
//!     psi = psi.apply_operator(&u, Parity::Even, -1.0, 16).unwrap();
//!     psi = psi.apply_operator(&u, Parity::Odd, -1.0, 16).unwrap();
//! }
//! // imaginary-time gates leave the state only approximately canonical
//! let psi = psi.canonical_form_exact().unwrap();
//! println!("energy per unit cell: {}", psi.energy(&h12).unwrap());
//! ```

use std::fmt;
use itertools::Itertools;
use ndarray as nd;
use ndarray_linalg::types::Scalar;
use num_traits::{ Float, One, Zero };
use rand::{ Rng, distributions::Distribution, thread_rng };
use statrs::distribution::Normal;
use thiserror::Error;
use tracing::debug;
use crate::{
    ScalarExt,
    linalg::{
        Schmidt,
        adjoint,
        diag_real,
        local_decomp,
        norm_fro,
        reshape,
        sqrt_factor,
        transpose,
    },
    transfer::{
        apply_physical,
        bond_transform,
        close,
        dominant_fixed_point,
        fuse,
        transfer_left,
        transfer_matrix,
        transfer_right,
    },
};

#[derive(Debug, Error)]
pub enum ITEBDError {
    /// Returned when the transfer operator of the unit cell has no unique,
    /// positive dominant eigenvalue, or its fixed points are not positive.
    #[error("ill-posed infinite state: {reason}")]
    IllPosedState { reason: &'static str },

    /// Returned when an operator annihilates the state or a wavefunction with
    /// zero norm is supplied.
    #[error("vanishing norm")]
    VanishingNorm,

    /// Returned when attempting to apply an operator whose dimensions do not
    /// agree with the relevant physical indices.
    #[error("error in operator application: expected shape {expected:?}, got {actual:?}")]
    OperatorIncompatibleShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Returned when attempting to create a state from arrays whose shapes are
    /// empty or don't fit together.
    #[error("error in state creation: array shapes are incompatible")]
    StateIncompatibleShape,

    /// Returned when imaginary-time evolution is requested under a
    /// non-Hermitian Hamiltonian.
    #[error("error in imaginary-time evolution: hamiltonian is not hermitian")]
    NonHermitian,

    #[error("linear algebra error: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),

    #[error("shape error: {0}")]
    Shape(#[from] nd::ShapeError),
}
use ITEBDError::*;
pub type ITEBDResult<T> = Result<T, ITEBDError>;

/// Relative threshold below which eigenvalues of fixed points and singular
/// values are discarded during canonicalization.
pub const CANONICAL_CUTOFF: f64 = 1e-12;

/// Identifies one of the two inequivalent sites of the unit cell, or
/// equivalently the bond immediately to its right.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Parity {
    /// Sites `2k`, holding tensor `A`.
    Even,
    /// Sites `2k + 1`, holding tensor `B`.
    Odd,
}

impl Parity {
    /// Parity of a signed site index, e.g. `-1` is odd.
    pub fn of_site(site: isize) -> Self {
        if site.rem_euclid(2) == 0 { Self::Even } else { Self::Odd }
    }

    /// The opposite parity.
    pub fn other(self) -> Self {
        match self {
            Self::Even => Self::Odd,
            Self::Odd => Self::Even,
        }
    }

    pub(crate) fn idx(self) -> usize {
        match self {
            Self::Even => 0,
            Self::Odd => 1,
        }
    }
}

/// An infinite matrix product state with a two-site unit cell.
#[derive(Clone, Debug, PartialEq)]
pub struct ITEBD<A>
where A: ScalarExt
{
    // Site tensors, indexed by parity. Array `p` has axis signature
    //   [ u_left, s, u_right ]
    pub(crate) gamma: [nd::Array3<A>; 2],
    // Schmidt values on the bond to the right of each site.
    pub(crate) lambda: [nd::Array1<A::Real>; 2],
    // `gamma[p]` with `lambda[p]` absorbed into its right bond.
    pub(crate) folded: [nd::Array3<A>; 2],
    pub(crate) canonical: bool,
}

// Left and right environments of each site, each with the ket bond index
// first. `left[p]` sits on the bond to the left of site `p`, `right[p]` on the
// bond to its right.
struct Environment<A> {
    left: [nd::Array2<A>; 2],
    right: [nd::Array2<A>; 2],
}

fn fold<A>(g: &nd::Array3<A>, l: &nd::Array1<A::Real>) -> nd::Array3<A>
where A: ScalarExt
{
    let mut m = g.clone();
    m.axis_iter_mut(nd::Axis(2))
        .zip(l)
        .for_each(|(mut mv, lk)| {
            mv.map_inplace(|mvk| { *mvk *= A::from_real(*lk); });
        });
    m
}

// Scale the slices of `g` along `axis` by `w`.
fn scale_axis<A>(g: &mut nd::Array3<A>, axis: usize, w: &nd::Array1<A::Real>)
where A: ScalarExt
{
    g.axis_iter_mut(nd::Axis(axis))
        .zip(w)
        .for_each(|(mut gv, wk)| {
            gv.map_inplace(|gvk| { *gvk *= A::from_real(*wk); });
        });
}

// Invert non-negligible weights, zeroing the rest.
fn pseudo_inverse<R>(w: &nd::Array1<R>) -> nd::Array1<R>
where R: Float
{
    let wmax = w.iter().copied().fold(R::zero(), Float::max);
    let bound = wmax * R::epsilon();
    w.mapv(|wk| if wk > bound { Float::recip(wk) } else { R::zero() })
}

fn normalized<A>(psi: &nd::Array1<A>) -> ITEBDResult<nd::Array1<A>>
where A: ScalarExt
{
    if psi.is_empty() { return Err(StateIncompatibleShape); }
    let norm = norm_fro(psi);
    if !(norm > <A::Real as Float>::epsilon()) { return Err(VanishingNorm); }
    Ok(psi.mapv(|x| x.div_real(norm)))
}

// Ratio of two contractions, failing only if the normalizing one is exactly
// zero or not finite.
fn ratio<A>(num: A, den: A) -> ITEBDResult<A>
where A: ScalarExt
{
    let den_abs = den.abs();
    if !(den_abs > A::Real::zero()) || !Float::is_finite(den_abs) {
        return Err(VanishingNorm);
    }
    Ok(num / den)
}

fn check_op<A>(op: &nd::Array2<A>, dim: usize) -> ITEBDResult<()>
where A: ScalarExt
{
    if op.dim() != (dim, dim) {
        Err(OperatorIncompatibleShape { expected: (dim, dim), actual: op.dim() })
    } else {
        Ok(())
    }
}

impl<A> ITEBD<A>
where A: ScalarExt
{
    fn assemble(
        gamma: [nd::Array3<A>; 2],
        lambda: [nd::Array1<A::Real>; 2],
        canonical: bool,
    ) -> Self
    {
        let folded = [
            fold(&gamma[0], &lambda[0]),
            fold(&gamma[1], &lambda[1]),
        ];
        Self { gamma, lambda, folded, canonical }
    }

    /// Initialize to a product state with wavefunction `psi_a` on even sites
    /// and `psi_b` on odd sites.
    ///
    /// Both wavefunctions are normalized, and the result is canonical with bond
    /// dimension 1.
    ///
    /// Fails if either wavefunction is empty or has zero norm.
    pub fn product2(psi_a: &nd::Array1<A>, psi_b: &nd::Array1<A>)
        -> ITEBDResult<Self>
    {
        let psi_a = normalized(psi_a)?;
        let psi_b = normalized(psi_b)?;
        let ga: nd::Array3<A> = reshape(&psi_a, (1, psi_a.len(), 1))?;
        let gb: nd::Array3<A> = reshape(&psi_b, (1, psi_b.len(), 1))?;
        let one = nd::array![A::Real::one()];
        Ok(Self::assemble([ga, gb], [one.clone(), one], true))
    }

    /// Initialize to a translationally invariant product state with
    /// wavefunction `psi` on every site.
    ///
    /// Fails if the wavefunction is empty or has zero norm.
    pub fn product(psi: &nd::Array1<A>) -> ITEBDResult<Self> {
        Self::product2(psi, psi)
    }

    /// Initialize from explicit site tensors and Schmidt vectors.
    ///
    /// `a` and `b` must have axis signature `[ u_left, s, u_right ]`, with `la`
    /// on the bond between `a` and `b` and `lb` on the bond between `b` and the
    /// next `a`. Set `canonical` only if the arrays are known to satisfy the
    /// canonical conditions (see [`Self::check_canonical`]).
    ///
    /// Fails if any dimension is zero, the bond dimensions don't agree, or a
    /// Schmidt value is negative.
    pub fn from_parts(
        a: nd::Array3<A>,
        la: nd::Array1<A::Real>,
        b: nd::Array3<A>,
        lb: nd::Array1<A::Real>,
        canonical: bool,
    ) -> ITEBDResult<Self>
    {
        let (a_l, da, a_r) = a.dim();
        let (b_l, db, b_r) = b.dim();
        if a.is_empty() || b.is_empty()
            || a_r != la.len() || b_l != la.len()
            || b_r != lb.len() || a_l != lb.len()
        {
            return Err(StateIncompatibleShape);
        }
        let zero = A::Real::zero();
        if la.iter().chain(lb.iter()).any(|lk| !(*lk >= zero)) {
            return Err(StateIncompatibleShape);
        }
        debug!(da, db, bond_a = a_r, bond_b = b_r, canonical, "state from parts");
        Ok(Self::assemble([a, b], [la, lb], canonical))
    }

    /// Return `true` if the state is flagged as being in canonical form.
    pub fn is_canonical(&self) -> bool { self.canonical }

    /// Clear the canonical flag, so that observables are computed from the
    /// exact fixed points of the transfer matrix.
    pub fn into_noncanonical(mut self) -> Self {
        self.canonical = false;
        self
    }

    /// Return the physical dimension of `site`.
    pub fn site_dimension(&self, site: isize) -> usize {
        self.gamma[Parity::of_site(site).idx()].shape()[1]
    }

    /// Return the dimension of the bond immediately to the left of `site`.
    pub fn bond_dimension(&self, site: isize) -> usize {
        self.lambda[Parity::of_site(site).other().idx()].len()
    }

    /// Return the larger of the two bond dimensions.
    pub fn max_bond_dimension(&self) -> usize {
        self.lambda[0].len().max(self.lambda[1].len())
    }

    /// Return the Schmidt values on the bond immediately to the left of `site`.
    pub fn schmidt_values(&self, site: isize) -> &nd::Array1<A::Real> {
        &self.lambda[Parity::of_site(site).other().idx()]
    }

    /// Return the Γ tensor of `site`.
    pub fn site_tensor(&self, site: isize) -> &nd::Array3<A> {
        &self.gamma[Parity::of_site(site).idx()]
    }

    /// Return the Γ tensor of `site` with the Schmidt values to its right
    /// absorbed.
    pub fn folded_tensor(&self, site: isize) -> &nd::Array3<A> {
        &self.folded[Parity::of_site(site).idx()]
    }

    /// Compute the Von Neumann entropy of the bipartition at the bond
    /// immediately to the left of `site`.
    ///
    /// Schmidt values are renormalized first, so this is meaningful for
    /// non-canonical states only insofar as their Schmidt vectors are actual
    /// Schmidt coefficients.
    pub fn entropy(&self, site: isize) -> A::Real {
        let zero = A::Real::zero();
        let s = self.schmidt_values(site);
        let total
            = s.iter()
            .map(|sk| *sk * *sk)
            .fold(zero, |acc, x| acc + x);
        s.iter()
            .map(|sk| *sk * *sk / total)
            .filter(|pk| *pk > zero)
            .map(|pk| -pk * Float::ln(pk))
            .fold(zero, |acc, term| acc + term)
    }

    /// Sum of the entropies of both bonds in the unit cell.
    pub fn entropy_total(&self) -> A::Real {
        self.entropy(0) + self.entropy(1)
    }
}

impl<A> ITEBD<A>
where
    A: ScalarExt,
    Normal: Distribution<A::Real>,
{
    fn gaussian<R>(normal: &Normal, rng: &mut R) -> A
    where R: Rng + ?Sized
    {
        A::from_components(normal.sample(rng), normal.sample(rng))
    }

    /// Initialize to a random, translationally invariant product state with
    /// physical dimension `d`.
    ///
    /// The wavefunction is drawn from the Gaussian (Haar) ensemble. The result
    /// is canonical with bond dimension 1.
    ///
    /// Fails if `d == 0`.
    pub fn random<R>(d: usize, rng: &mut R) -> ITEBDResult<Self>
    where R: Rng + ?Sized
    {
        let normal = Normal::standard();
        let psi: nd::Array1<A>
            = (0..d).map(|_| Self::gaussian(&normal, rng)).collect();
        Self::product(&psi)
    }

    /// Like [`Self::random`], using the thread-local generator.
    pub fn random_thread(d: usize) -> ITEBDResult<Self> {
        Self::random(d, &mut thread_rng())
    }

    /// Initialize to a generic state with physical dimension `d` and bond
    /// dimension `bond_dim` on both bonds.
    ///
    /// Site tensors have independent Gaussian elements and Schmidt vectors are
    /// random, positive and normalized. The result is *not* in canonical form.
    ///
    /// Fails if `d` or `bond_dim` is zero.
    pub fn random_bond<R>(d: usize, bond_dim: usize, rng: &mut R)
        -> ITEBDResult<Self>
    where R: Rng + ?Sized
    {
        if d == 0 || bond_dim == 0 { return Err(StateIncompatibleShape); }
        let normal = Normal::standard();
        let mut gamma = || -> nd::Array3<A> {
            nd::Array3::from_shape_simple_fn(
                (bond_dim, d, bond_dim),
                || Self::gaussian(&normal, rng),
            )
        };
        let ga = gamma();
        let gb = gamma();
        let offset = A::real(0.1);
        let mut weights = || -> nd::Array1<A::Real> {
            let w: nd::Array1<A::Real>
                = (0..bond_dim)
                .map(|_| Float::abs(normal.sample(rng)) + offset)
                .collect();
            let norm: A::Real = Float::sqrt(
                w.iter()
                    .map(|wk| *wk * *wk)
                    .fold(A::Real::zero(), |acc, x| acc + x)
            );
            w.mapv(|wk| wk / norm)
        };
        let la = weights();
        let lb = weights();
        Ok(Self::assemble([ga, gb], [la, lb], false))
    }
}

impl<A> ITEBD<A>
where A: ScalarExt
{
    fn environments(&self) -> ITEBDResult<Environment<A>> {
        if self.canonical {
            let left: [nd::Array2<A>; 2] = [
                diag_real(&self.lambda[1].mapv(|lk| lk * lk)),
                diag_real(&self.lambda[0].mapv(|lk| lk * lk)),
            ];
            let right: [nd::Array2<A>; 2] = [
                nd::Array2::eye(self.lambda[0].len()),
                nd::Array2::eye(self.lambda[1].len()),
            ];
            return Ok(Environment { left, right });
        }
        // fixed points on the bond to the left of `A`
        let cell = fuse(&self.folded[0], &self.folded[1])?;
        let dim = cell.shape()[0];
        let t = transfer_matrix(&cell);
        let (_, r0) = dominant_fixed_point(&t, dim)?;
        let (_, l0) = dominant_fixed_point(&transpose(&t), dim)?;
        let l1 = transfer_left(&l0, &self.folded[0], None);
        let r1 = transfer_right(&r0, &self.folded[1], None);
        Ok(Environment { left: [l0, l1], right: [r1, r0] })
    }

    // Contract single-site operators (or identities, for `None`) on the sites
    // `site, site + 1, ...`, normalized by the same contraction with all
    // identities.
    fn eval_chain(
        &self,
        env: &Environment<A>,
        site: isize,
        ops: &[Option<&nd::Array2<A>>],
    ) -> ITEBDResult<A>
    {
        let zero = A::Real::zero();
        let mut p = Parity::of_site(site);
        let mut num = env.left[p.idx()].clone();
        let mut den = num.clone();
        for (k, op) in ops.iter().enumerate() {
            if k > 0 { p = p.other(); }
            let m = &self.folded[p.idx()];
            if let Some(o) = op { check_op(o, m.shape()[1])?; }
            num = transfer_left(&num, m, *op);
            den = transfer_left(&den, m, None);
            // keep both at unit scale over long chains
            let scale = norm_fro(&den);
            if !(scale > zero) || !Float::is_finite(scale) {
                return Err(VanishingNorm);
            }
            let scale = A::from_real(scale);
            num.mapv_inplace(|x| x / scale);
            den.mapv_inplace(|x| x / scale);
        }
        let r = &env.right[p.idx()];
        ratio(close(&num, r), close(&den, r))
    }

    fn eval_two_site(
        &self,
        env: &Environment<A>,
        op12: &nd::Array2<A>,
        site: isize,
    ) -> ITEBDResult<A>
    {
        let p = Parity::of_site(site);
        let q = p.other();
        let cell = fuse(&self.folded[p.idx()], &self.folded[q.idx()])?;
        check_op(op12, cell.shape()[1])?;
        let l = &env.left[p.idx()];
        let r = &env.right[q.idx()];
        let numv = close(&transfer_left(l, &cell, Some(op12)), r);
        let denv = close(&transfer_left(l, &cell, None), r);
        ratio(numv, denv)
    }

    /// Compute the expectation value of a single-site operator on `site`.
    ///
    /// Fails if `op` does not match the physical dimension of `site`.
    pub fn expected_value(&self, op: &nd::Array2<A>, site: isize)
        -> ITEBDResult<A>
    {
        let env = self.environments()?;
        self.eval_chain(&env, site, &[Some(op)])
    }

    /// Compute the correlation ⟨`op1`<sub>*k*</sub>
    /// `op2`<sub>*k* + `sep` + 1</sub>⟩ where *k* = `site`, i.e. with `sep`
    /// sites strictly between the two operators.
    pub fn expected_value2(
        &self,
        op1: &nd::Array2<A>,
        op2: &nd::Array2<A>,
        sep: usize,
        site: isize,
    ) -> ITEBDResult<A>
    {
        let env = self.environments()?;
        let ops: Vec<Option<&nd::Array2<A>>>
            = std::iter::once(Some(op1))
            .chain(std::iter::repeat(None).take(sep))
            .chain(std::iter::once(Some(op2)))
            .collect();
        self.eval_chain(&env, site, &ops)
    }

    /// Compute a string order correlation, with `op_first` on `site`,
    /// `op_middle` on each of the `sep` sites that follow, and `op_last` on
    /// `site + sep + 1`.
    pub fn string_order(
        &self,
        op_first: &nd::Array2<A>,
        op_middle: &nd::Array2<A>,
        op_last: &nd::Array2<A>,
        sep: usize,
        site: isize,
    ) -> ITEBDResult<A>
    {
        let env = self.environments()?;
        let ops: Vec<Option<&nd::Array2<A>>>
            = std::iter::once(Some(op_first))
            .chain(std::iter::repeat(Some(op_middle)).take(sep))
            .chain(std::iter::once(Some(op_last)))
            .collect();
        self.eval_chain(&env, site, &ops)
    }

    /// Compute the expectation value of a two-site operator acting on `site`
    /// and `site + 1`.
    ///
    /// Rows and columns of `op12` are indexed by `s_left * d_right + s_right`,
    /// as produced by [`kron`][crate::linalg::kron].
    pub fn expected_value12(&self, op12: &nd::Array2<A>, site: isize)
        -> ITEBDResult<A>
    {
        let env = self.environments()?;
        self.eval_two_site(&env, op12, site)
    }

    /// Compute the energy of one unit cell under a nearest-neighbor
    /// Hamiltonian, i.e. the real part of the sum of expectation values of
    /// `h12` on both inequivalent bonds.
    pub fn energy(&self, h12: &nd::Array2<A>) -> ITEBDResult<A::Real> {
        let env = self.environments()?;
        let e0 = self.eval_two_site(&env, h12, 0)?;
        let e1 = self.eval_two_site(&env, h12, 1)?;
        Ok(Scalar::re(&(e0 + e1)))
    }

    /// Apply a two-site operator across the bond to the right of `parity`,
    /// returning the new state and the squared weight of the discarded
    /// Schmidt values.
    ///
    /// After the operator is applied, Schmidt values at or below machine
    /// epsilon (relative to the largest) are always dropped. If `tolerance` is
    /// non-negative, the longest tail of the remaining ones whose total squared
    /// weight does not exceed `tolerance` is dropped too, and if `max_dim` is
    /// non-zero at most `max_dim` values are kept. The surviving values are
    /// renormalized.
    ///
    /// The canonical flag is carried over from `self`, even if `op` is not
    /// unitary; see [`Self::canonical_form_exact`].
    ///
    /// Fails if `op` has the wrong shape or annihilates the state, i.e. if the
    /// weight that survives it is negligible next to the norm of `op` times
    /// the weight of the state it acts on.
    pub fn apply_operator_with_error(
        &self,
        op: &nd::Array2<A>,
        parity: Parity,
        tolerance: A::Real,
        max_dim: usize,
    ) -> ITEBDResult<(Self, A::Real)>
    {
        let p = parity.idx();
        let q = parity.other().idx();
        let dl = self.gamma[p].shape()[1];
        let dr = self.gamma[q].shape()[1];
        check_op(op, dl * dr)?;

        // the Schmidt values on both outer bonds of the pair
        let lam_out = &self.lambda[q];
        let dim = lam_out.len();
        let mut cell = fuse(&self.folded[p], &self.folded[q])?;
        scale_axis(&mut cell, 0, lam_out);
        let theta = apply_physical(op, &cell);
        let weight_in = norm_fro(op) * norm_fro(&cell);
        if !(norm_fro(&theta) > weight_in * <A::Real as Float>::epsilon()) {
            return Err(VanishingNorm);
        }
        let theta: nd::Array2<A> = reshape(&theta, (dim * dl, dr * dim))?;

        let Schmidt { u, s, vt, rank, discarded }
            = local_decomp(theta, <A::Real as Float>::epsilon(), tolerance, max_dim)?;
        let inv = pseudo_inverse(lam_out);
        let mut g_left: nd::Array3<A> = reshape(&u, (dim, dl, rank))?;
        scale_axis(&mut g_left, 0, &inv);
        let mut g_right: nd::Array3<A> = reshape(&vt, (rank, dr, dim))?;
        scale_axis(&mut g_right, 2, &inv);
        debug!(?parity, rank, discarded = ?discarded, "applied two-site operator");

        let mut gamma = self.gamma.clone();
        let mut lambda = self.lambda.clone();
        gamma[p] = g_left;
        gamma[q] = g_right;
        lambda[p] = s;
        Ok((Self::assemble(gamma, lambda, self.canonical), discarded))
    }

    /// Apply a two-site operator across the bond to the right of `parity`,
    /// truncating the new Schmidt values as described in
    /// [`Self::apply_operator_with_error`].
    pub fn apply_operator(
        &self,
        op: &nd::Array2<A>,
        parity: Parity,
        tolerance: A::Real,
        max_dim: usize,
    ) -> ITEBDResult<Self>
    {
        self.apply_operator_with_error(op, parity, tolerance, max_dim)
            .map(|(psi, _)| psi)
    }

    /// Bring the state into canonical form, returning the result as a new
    /// state.
    ///
    /// Following Orús and Vidal, the dominant left and right eigenvectors of
    /// the unit cell's transfer matrix are factored as `Lᵀ = Y† Y` and
    /// `R = X X†`; the singular values of `Y X` give the new Schmidt values on
    /// the bond to the left of `A`, and the gauge transformations built from
    /// its singular vectors are absorbed into the unit cell, which is then
    /// split again to find the other bond.
    ///
    /// If the state is already flagged canonical, a copy is returned.
    ///
    /// Fails with [`ITEBDError::IllPosedState`] if the dominant eigenvalue of
    /// the transfer matrix is degenerate or not positive.
    pub fn canonical_form(&self) -> ITEBDResult<Self> {
        if self.canonical { return Ok(self.clone()); }
        self.canonical_form_exact()
    }

    /// Like [`Self::canonical_form`], but always recompute the canonical gauge
    /// from the transfer matrix, regardless of the canonical flag.
    ///
    /// Use this after non-unitary operations (e.g. imaginary-time steps),
    /// which keep the flag but only approximately preserve the canonical
    /// conditions.
    pub fn canonical_form_exact(&self) -> ITEBDResult<Self> {
        let cutoff = A::real(CANONICAL_CUTOFF);
        let da = self.gamma[0].shape()[1];
        let db = self.gamma[1].shape()[1];

        let cell = fuse(&self.folded[0], &self.folded[1])?;
        let dim = cell.shape()[0];
        let t = transfer_matrix(&cell);
        let (eta, r) = dominant_fixed_point(&t, dim)?;
        let (_, l) = dominant_fixed_point(&transpose(&t), dim)?;

        // R = X X†, Lᵀ = Y† Y
        let x = sqrt_factor(&r, cutoff)?;
        let y = adjoint(&sqrt_factor(&transpose(&l), cutoff)?);
        let Schmidt { u, s: sigma, vt, rank, .. }
            = local_decomp(y.dot(&x), cutoff, -A::Real::one(), 0)?;
        let sigma_inv = sigma.mapv(|sk| A::from_real(Float::recip(sk)));
        let p: nd::Array2<A>
            = x.dot(&adjoint(&vt)) * &sigma_inv.view().insert_axis(nd::Axis(0));
        let q: nd::Array2<A>
            = adjoint(&u).dot(&y) * &sigma_inv.view().insert_axis(nd::Axis(1));
        let mut cell_new = bond_transform(&q, &cell, &p)?;

        // fix the overall scale so that Σ_s M M† = 1 with M = Γ' λ'
        let m = fold(&cell_new, &sigma);
        let w = transfer_right(&nd::Array2::eye(rank), &m, None);
        let trace: A = w.diag().iter().copied().fold(A::zero(), |acc, x| acc + x);
        let scale = Scalar::re(&trace) / A::real(rank as f64);
        if !(scale > A::Real::zero()) { return Err(VanishingNorm); }
        let scale = A::from_real(Float::sqrt(scale));
        cell_new.mapv_inplace(|x| x / scale);
        debug!(eta = ?eta, rank, "canonical gauge on outer bond");

        // split λ' Γ' λ' across the inner bond
        let mut theta = cell_new;
        scale_axis(&mut theta, 0, &sigma);
        scale_axis(&mut theta, 2, &sigma);
        let theta: nd::Array2<A> = reshape(&theta, (rank * da, db * rank))?;
        let Schmidt { u: u2, s: s2, vt: vt2, rank: rank2, .. }
            = local_decomp(theta, cutoff, -A::Real::one(), 0)?;
        let sigma_inv = sigma.mapv(Float::recip);
        let mut ga: nd::Array3<A> = reshape(&u2, (rank, da, rank2))?;
        scale_axis(&mut ga, 0, &sigma_inv);
        let mut gb: nd::Array3<A> = reshape(&vt2, (rank2, db, rank))?;
        scale_axis(&mut gb, 2, &sigma_inv);
        debug!(bond_a = rank2, bond_b = rank, "canonical form");
        Ok(Self::assemble([ga, gb], [s2, sigma], true))
    }

    /// Numerically check the canonical conditions
    ///
    /// ```text
    /// Σ_s M[s] M[s]† = 1
    /// Σ_s M[s]ᵀ diag(λ_left²) M[s]* = diag(λ_right²)
    /// ```
    ///
    /// for the folded tensors `M` of both sites, to within absolute tolerance
    /// `tol` on every element.
    ///
    /// This is independent of [`Self::is_canonical`].
    pub fn check_canonical(&self, tol: A::Real) -> bool {
        let close_to = |a: &nd::Array2<A>, b: &nd::Array2<A>| -> bool {
            a.dim() == b.dim()
                && nd::Zip::from(a).and(b).all(|ak, bk| (*ak - *bk).abs() <= tol)
        };
        [Parity::Even, Parity::Odd].into_iter()
            .all(|par| {
                let m = &self.folded[par.idx()];
                let left = &self.lambda[par.other().idx()];
                let right = &self.lambda[par.idx()];
                let r = transfer_right(&nd::Array2::eye(right.len()), m, None);
                let l = transfer_left(
                    &diag_real(&left.mapv(|lk| lk * lk)), m, None);
                close_to(&r, &nd::Array2::eye(left.len()))
                    && close_to(&l, &diag_real(&right.mapv(|lk| lk * lk)))
            })
    }
}

impl<A> fmt::Display for ITEBD<A>
where A: ScalarExt
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ITEBD {{ canonical: {} }}", self.canonical)?;
        for (name, par) in [("A", Parity::Even), ("B", Parity::Odd)] {
            let sh = self.gamma[par.idx()].shape();
            writeln!(f, "{} :: {{ <{}>, <{}>, <{}> }}", name, sh[0], sh[1], sh[2])?;
            writeln!(f, "l{} = [{}]",
                name,
                self.lambda[par.idx()].iter().map(|lk| lk.to_string()).join(", "),
            )?;
        }
        Ok(())
    }
}
