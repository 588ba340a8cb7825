//! Definitions of common local operators and nearest-neighbor Hamiltonians for
//! use with [`ITEBD`][crate::itebd::ITEBD].
//!
//! Two-site operators follow the Kronecker convention of
//! [`kron`][crate::linalg::kron]: the row/column index `s_left * d_right +
//! s_right`.

use ndarray as nd;
use ndarray_linalg::QRSquareInplace;
use num_complex::{ Complex, Complex64 as C64 };
use num_traits::{ Float, One, Zero };
use once_cell::sync::Lazy;
use rand::{ Rng, distributions::Distribution };
use statrs::distribution::Normal;
use crate::{
    ScalarExt,
    itebd::{ ITEBDError, ITEBDResult },
    linalg::norm_fro,
};

pub use crate::linalg::kron;

/// Make the identity on a `d`-dimensional site.
pub fn make_id<A>(d: usize) -> nd::Array2<A>
where A: ScalarExt
{
    nd::Array2::eye(d)
}

/// Make a Pauli X matrix.
///
/// Since this operator takes no arguments, consider using the
/// lazily-constructed, [`Complex64`][C64]-valued [`XMAT`] instead.
pub fn make_x<A>() -> nd::Array2<A>
where A: ScalarExt
{
    nd::array![
        [A::zero(), A::one() ],
        [A::one(),  A::zero()],
    ]
}

/// Lazy-static version of [`make_x`] for a [`Complex64`][C64] element type.
pub static XMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_x);

/// Make a Pauli Y matrix.
///
/// Only available for complex element types.
pub fn make_y<T>() -> nd::Array2<Complex<T>>
where T: Float
{
    let i = Complex::i();
    nd::array![
        [Complex::zero(), -i             ],
        [i,                Complex::zero()],
    ]
}

/// Lazy-static version of [`make_y`] for a [`Complex64`][C64] element type.
pub static YMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_y);

/// Make a Pauli Z matrix.
///
/// Since this operator takes no arguments, consider using the
/// lazily-constructed, [`Complex64`][C64]-valued [`ZMAT`] instead.
pub fn make_z<A>() -> nd::Array2<A>
where A: ScalarExt
{
    nd::array![
        [A::one(),   A::zero()],
        [A::zero(), -A::one() ],
    ]
}

/// Lazy-static version of [`make_z`] for a [`Complex64`][C64] element type.
pub static ZMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_z);

/// Make the spin-1/2 raising operator ∣0⟩⟨1∣.
pub fn make_splus<A>() -> nd::Array2<A>
where A: ScalarExt
{
    nd::array![
        [A::zero(), A::one() ],
        [A::zero(), A::zero()],
    ]
}

/// Make the spin-1/2 lowering operator ∣1⟩⟨0∣.
pub fn make_sminus<A>() -> nd::Array2<A>
where A: ScalarExt
{
    nd::array![
        [A::zero(), A::zero()],
        [A::one(),  A::zero()],
    ]
}

/// Make the occupation number operator ∣1⟩⟨1∣ of a hard-core boson.
pub fn make_number<A>() -> nd::Array2<A>
where A: ScalarExt
{
    nd::array![
        [A::zero(), A::zero()],
        [A::zero(), A::one() ],
    ]
}

/// Make the orthogonal projector onto the span of `psi`.
///
/// Fails if `psi` has zero norm.
pub fn projector<A>(psi: &nd::Array1<A>) -> ITEBDResult<nd::Array2<A>>
where A: ScalarExt
{
    let norm = norm_fro(psi);
    if !(norm > <A::Real as Float>::epsilon()) {
        return Err(ITEBDError::VanishingNorm);
    }
    let n = psi.len();
    let norm2 = A::from_real(norm * norm);
    Ok(nd::Array2::from_shape_fn((n, n), |(i, j)| psi[i] * psi[j].conj() / norm2))
}

/// Two-site Hamiltonian of the transverse-field Ising chain,
///
/// ```text
/// H12 = -J Z⊗Z - (h / 2) (X⊗1 + 1⊗X)
/// ```
///
/// where the field is split evenly between the two bonds touching each site.
pub fn ising_h12<A>(j: A::Real, h: A::Real) -> nd::Array2<A>
where A: ScalarExt
{
    let id: nd::Array2<A> = make_id(2);
    let x: nd::Array2<A> = make_x();
    let z: nd::Array2<A> = make_z();
    let zz = kron(&z, &z);
    let field = kron(&x, &id) + kron(&id, &x);
    let half = A::from_real(h / (A::Real::one() + A::Real::one()));
    zz.mapv(|zzk| -A::from_real(j) * zzk) - field.mapv(|fk| half * fk)
}

/// Two-site Hamiltonian of the spin-1/2 XXZ chain,
///
/// ```text
/// H12 = J (Sx⊗Sx + Sy⊗Sy + Δ Sz⊗Sz)
///     = J ((S+⊗S- + S-⊗S+) / 2 + Δ Sz⊗Sz)
/// ```
///
/// with `Sz = Z / 2`, so that the result is real.
pub fn xxz_h12<A>(j: A::Real, delta: A::Real) -> nd::Array2<A>
where A: ScalarExt
{
    let two = A::Real::one() + A::Real::one();
    let sp: nd::Array2<A> = make_splus();
    let sm: nd::Array2<A> = make_sminus();
    let sz: nd::Array2<A> = make_z::<A>().mapv(|zk| zk.div_real(two));
    let flip = (kron(&sp, &sm) + kron(&sm, &sp)).mapv(|fk| fk.div_real(two));
    let ising = kron(&sz, &sz).mapv(|zk| zk.mul_real(delta));
    (flip + ising).mapv(|hk| hk.mul_real(j))
}

/// Generate a Haar-random unitary matrix on an `n`-dimensional space.
pub fn haar<A, R>(n: usize, rng: &mut R) -> ITEBDResult<nd::Array2<A>>
where
    A: ScalarExt,
    Normal: Distribution<A::Real>,
    R: Rng + ?Sized,
{
    let normal = Normal::standard();
    let mut z: nd::Array2<A>
        = nd::Array2::from_shape_simple_fn(
            (n, n),
            || A::from_components(normal.sample(rng), normal.sample(rng)),
        );
    let (_, r) = z.qr_square_inplace()?;
    nd::Zip::from(z.columns_mut())
        .and(r.diag())
        .for_each(|mut z_j, rjj| {
            let renorm = rjj.div_real(rjj.abs());
            z_j.map_inplace(|zij| { *zij /= renorm; });
        });
    Ok(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{ adjoint, is_hermitian };
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn pauli_algebra() {
        let x = Lazy::force(&XMAT);
        let y = Lazy::force(&YMAT);
        let z = Lazy::force(&ZMAT);
        let xy = x.dot(y);
        let iz = z.mapv(|zk| zk * C64::i());
        assert!(norm_fro(&(xy - iz)) < 1e-14);
        let sp: nd::Array2<f64> = make_splus();
        let sm: nd::Array2<f64> = make_sminus();
        let comm = sp.dot(&sm) - sm.dot(&sp);
        assert!(norm_fro(&(comm - make_z::<f64>())) < 1e-14);
        let n: nd::Array2<f64> = make_number();
        assert_eq!(sm.dot(&sp), n);
    }

    #[test]
    fn projector_is_idempotent() {
        let psi: nd::Array1<C64> = nd::array![C64::new(1.0, 2.0), C64::new(0.0, -1.0)];
        let p = projector(&psi).unwrap();
        assert!(norm_fro(&(p.dot(&p) - &p)) < 1e-14);
        assert!(is_hermitian(&p, 1e-14));
        let zero: nd::Array1<f64> = nd::Array1::zeros(3);
        assert!(matches!(projector(&zero), Err(ITEBDError::VanishingNorm)));
    }

    #[test]
    fn model_hamiltonians() {
        let h: nd::Array2<f64> = ising_h12(1.0, 0.5);
        assert!(is_hermitian(&h, 1e-14));
        assert_abs_diff_eq!(h[[0, 0]], -1.0);
        assert_abs_diff_eq!(h[[0, 1]], -0.25);
        assert_abs_diff_eq!(h[[0, 2]], -0.25);
        assert_abs_diff_eq!(h[[1, 1]], 1.0);

        let h: nd::Array2<f64> = xxz_h12(1.0, 1.0);
        assert!(is_hermitian(&h, 1e-14));
        // singlet energy of the Heisenberg bond
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let singlet: nd::Array1<f64> = nd::array![0.0, s, -s, 0.0];
        assert_abs_diff_eq!(singlet.dot(&h.dot(&singlet)), -0.75, epsilon = 1e-14);
    }

    #[test]
    fn haar_is_unitary() {
        let mut rng = ChaCha8Rng::seed_from_u64(10546);
        let u: nd::Array2<C64> = haar(4, &mut rng).unwrap();
        let uu = adjoint(&u).dot(&u);
        assert!(norm_fro(&(uu - nd::Array2::<C64>::eye(4))) < 1e-12);
    }
}
