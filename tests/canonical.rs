//! Canonicalization and two-site gate application on generic entangled
//! states.
//!
//! Tests cover:
//! - Agreement of observables before and after canonicalization
//! - Canonical conditions after canonicalization and unitary gates
//! - Truncation behavior and discarded weights
//! - Ill-posed (non-injective) states
//! - Both f64 and Complex64 types

use approx::assert_abs_diff_eq;
use itebd::{ ITEBD, ITEBDError, Parity, ops };
use ndarray as nd;
use num_complex::Complex64 as C64;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn assert_close(a: C64, b: C64, tol: f64) {
    assert!((a - b).norm() < tol, "{a} != {b}");
}

#[test]
fn canonical_form_preserves_observables_complex() {
    let mut rng = ChaCha8Rng::seed_from_u64(31415);
    let x = (*ops::XMAT).clone();
    let y = (*ops::YMAT).clone();
    let z = (*ops::ZMAT).clone();
    let zz = ops::kron(&z, &z);
    let xy = ops::kron(&x, &y);
    for _ in 0..5 {
        let psi: ITEBD<C64> = ITEBD::random_bond(2, 4, &mut rng).unwrap();
        assert!(!psi.is_canonical());
        assert!(!psi.check_canonical(1e-8));
        let id: nd::Array2<C64> = ops::make_id(2);
        assert_close(psi.expected_value(&id, 0).unwrap(), C64::from(1.0), 1e-10);

        let can = psi.canonical_form().unwrap();
        assert!(can.is_canonical());
        assert!(can.check_canonical(1e-8));
        assert_abs_diff_eq!(
            can.schmidt_values(0).mapv(|s| s * s).sum(), 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(
            can.schmidt_values(1).mapv(|s| s * s).sum(), 1.0, epsilon = 1e-10);
        assert!(can.max_bond_dimension() <= 4);

        for site in [0_isize, 1] {
            for op in [&x, &y, &z] {
                assert_close(
                    psi.expected_value(op, site).unwrap(),
                    can.expected_value(op, site).unwrap(),
                    1e-8,
                );
            }
            assert_close(
                psi.expected_value12(&zz, site).unwrap(),
                can.expected_value12(&zz, site).unwrap(),
                1e-8,
            );
            assert_close(
                psi.expected_value12(&xy, site).unwrap(),
                can.expected_value12(&xy, site).unwrap(),
                1e-8,
            );
            assert_close(
                psi.expected_value2(&x, &z, 2, site).unwrap(),
                can.expected_value2(&x, &z, 2, site).unwrap(),
                1e-8,
            );
            assert_close(
                psi.string_order(&z, &x, &z, 3, site).unwrap(),
                can.string_order(&z, &x, &z, 3, site).unwrap(),
                1e-8,
            );
        }
        assert_abs_diff_eq!(
            psi.energy(&zz).unwrap(), can.energy(&zz).unwrap(), epsilon = 1e-8);
    }
}

#[test]
fn canonical_form_preserves_observables_real() {
    let mut rng = ChaCha8Rng::seed_from_u64(27182);
    for _ in 0..5 {
        let psi: ITEBD<f64> = ITEBD::random_bond(3, 3, &mut rng).unwrap();
        let can = psi.canonical_form().unwrap();
        assert!(can.check_canonical(1e-8));
        let n: nd::Array2<f64> = nd::Array2::from_diag(&nd::array![0.0, 1.0, 2.0]);
        for site in [0_isize, 1, 2, -1] {
            assert_abs_diff_eq!(
                psi.expected_value(&n, site).unwrap(),
                can.expected_value(&n, site).unwrap(),
                epsilon = 1e-8,
            );
        }
    }

    let h: nd::Array2<f64> = ops::ising_h12(1.0, 0.7);
    let x: nd::Array2<f64> = ops::make_x();
    let z: nd::Array2<f64> = ops::make_z();
    for _ in 0..5 {
        let psi: ITEBD<f64> = ITEBD::random_bond(2, 5, &mut rng).unwrap();
        let can = psi.canonical_form().unwrap();
        assert!(can.check_canonical(1e-8));
        assert_abs_diff_eq!(
            psi.energy(&h).unwrap(), can.energy(&h).unwrap(), epsilon = 1e-8);
        assert_abs_diff_eq!(
            psi.expected_value2(&x, &x, 0, 1).unwrap(),
            can.expected_value2(&x, &x, 0, 1).unwrap(),
            epsilon = 1e-8,
        );
        assert_abs_diff_eq!(
            psi.expected_value(&z, 0).unwrap(),
            can.expected_value(&z, 0).unwrap(),
            epsilon = 1e-8,
        );
    }
}

#[test]
fn canonical_form_is_idempotent() {
    let mut rng = ChaCha8Rng::seed_from_u64(1618);
    let psi: ITEBD<C64> = ITEBD::random_bond(2, 3, &mut rng).unwrap();
    let can = psi.canonical_form().unwrap();
    assert_eq!(can.canonical_form().unwrap(), can);

    // schmidt values don't depend on the gauge the state starts in
    let again = can.clone().into_noncanonical().canonical_form().unwrap();
    for site in [0_isize, 1] {
        let s1 = can.schmidt_values(site);
        let s2 = again.schmidt_values(site);
        assert_eq!(s1.len(), s2.len());
        s1.iter().zip(s2)
            .for_each(|(a, b)| assert_abs_diff_eq!(*a, *b, epsilon = 1e-8));
        assert_abs_diff_eq!(can.entropy(site), again.entropy(site), epsilon = 1e-8);
    }
    assert!(again.check_canonical(1e-8));
}

#[test]
fn unitary_gates_keep_canonical_form() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut psi: ITEBD<C64>
        = ITEBD::random_bond(2, 2, &mut rng).unwrap()
        .canonical_form().unwrap();
    for step in 0..6 {
        let u: nd::Array2<C64> = ops::haar(4, &mut rng).unwrap();
        let parity = if step % 2 == 0 { Parity::Even } else { Parity::Odd };
        let (next, discarded) = psi.apply_operator_with_error(&u, parity, -1.0, 0).unwrap();
        assert!(discarded < 1e-20);
        assert!(next.is_canonical());
        assert!(next.check_canonical(1e-8));
        psi = next;
    }
    assert!(psi.max_bond_dimension() > 2);
}

#[test]
fn identity_gate_preserves_state() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let psi: ITEBD<f64>
        = ITEBD::random_bond(2, 3, &mut rng).unwrap()
        .canonical_form().unwrap();
    let id4: nd::Array2<f64> = ops::make_id(4);
    let x: nd::Array2<f64> = ops::make_x();
    let z: nd::Array2<f64> = ops::make_z();
    let zz = ops::kron(&z, &z);
    for parity in [Parity::Even, Parity::Odd] {
        let next = psi.apply_operator(&id4, parity, -1.0, 0).unwrap();
        assert_eq!(next.bond_dimension(0), psi.bond_dimension(0));
        assert_eq!(next.bond_dimension(1), psi.bond_dimension(1));
        for site in [0_isize, 1] {
            assert_abs_diff_eq!(
                next.expected_value(&x, site).unwrap(),
                psi.expected_value(&x, site).unwrap(),
                epsilon = 1e-10,
            );
            assert_abs_diff_eq!(
                next.expected_value12(&zz, site).unwrap(),
                psi.expected_value12(&zz, site).unwrap(),
                epsilon = 1e-10,
            );
            assert_abs_diff_eq!(next.entropy(site), psi.entropy(site), epsilon = 1e-10);
        }
    }
}

#[test]
fn discarded_weight_decreases_with_bond_dimension() {
    let mut rng = ChaCha8Rng::seed_from_u64(4321);
    let psi: ITEBD<f64>
        = ITEBD::random_bond(2, 4, &mut rng).unwrap()
        .canonical_form().unwrap();
    let u: nd::Array2<f64> = ops::haar(4, &mut rng).unwrap();
    let discarded: Vec<f64>
        = (1..=8)
        .map(|chi| {
            let (next, w) = psi.apply_operator_with_error(&u, Parity::Even, -1.0, chi).unwrap();
            assert!(next.bond_dimension(1) <= chi);
            w
        })
        .collect();
    discarded.windows(2)
        .for_each(|w| assert!(w[1] <= w[0] + 1e-14));
    assert!(discarded[0] > 0.0);
    assert!(*discarded.last().unwrap() < 1e-20);

    // requests beyond the available dimension are clamped
    let (full, w) = psi.apply_operator_with_error(&u, Parity::Even, -1.0, 0).unwrap();
    let (clamped, wc) = psi.apply_operator_with_error(&u, Parity::Even, -1.0, 1000).unwrap();
    assert_eq!(full.bond_dimension(1), clamped.bond_dimension(1));
    assert_abs_diff_eq!(w, wc);

    // a tolerance drops only as much weight as it allows
    let (_, wt) = psi.apply_operator_with_error(&u, Parity::Even, 1e-3, 0).unwrap();
    assert!(wt <= 1e-3);
}

#[test]
fn cat_state_is_ill_posed() {
    // (|000...> + |111...>) / sqrt(2)
    let gamma: nd::Array3<f64>
        = nd::Array3::from_shape_fn((2, 2, 2), |(a, s, b)| {
            if a == s && s == b { 1.0 } else { 0.0 }
        });
    let lambda: nd::Array1<f64> = nd::array![0.5_f64.sqrt(), 0.5_f64.sqrt()];
    let cat = ITEBD::from_parts(
        gamma.clone(), lambda.clone(), gamma.clone(), lambda.clone(), true,
    ).unwrap();
    assert_abs_diff_eq!(cat.entropy(0), 2.0_f64.ln(), epsilon = 1e-12);
    assert_abs_diff_eq!(cat.entropy_total(), 2.0 * 2.0_f64.ln(), epsilon = 1e-12);
    let z: nd::Array2<f64> = ops::make_z();
    assert_abs_diff_eq!(cat.expected_value(&z, 0).unwrap(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(cat.expected_value2(&z, &z, 5, 0).unwrap(), 1.0, epsilon = 1e-12);

    let cat = cat.into_noncanonical();
    assert!(matches!(cat.canonical_form(), Err(ITEBDError::IllPosedState { .. })));
    assert!(matches!(cat.expected_value(&z, 0), Err(ITEBDError::IllPosedState { .. })));
}

#[test]
fn product_entropy_vanishes() {
    let psi: ITEBD<f64> = ITEBD::random(3, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
    assert!(psi.is_canonical());
    assert!(psi.check_canonical(1e-12));
    assert_eq!(psi.max_bond_dimension(), 1);
    assert_abs_diff_eq!(psi.entropy_total(), 0.0);

    let psi: ITEBD<C64> = ITEBD::random_thread(2).unwrap();
    assert_eq!(psi.site_dimension(1), 2);
    assert_abs_diff_eq!(psi.entropy(1), 0.0);
}

fn check_translation<A>(psi: &ITEBD<A>)
where A: itebd::ScalarExt
{
    let close = |a: A, b: A| assert!((a - b).abs() < A::real(1e-9), "{a} != {b}");
    let x: nd::Array2<A> = ops::make_x();
    let z: nd::Array2<A> = ops::make_z();
    let n: nd::Array2<A> = ops::make_number();
    let xz = ops::kron(&x, &z);
    for site in [0_isize, 1] {
        for shift in [-4_isize, -2, 2, 6] {
            let other = site + shift;
            close(
                psi.expected_value(&n, site).unwrap(),
                psi.expected_value(&n, other).unwrap(),
            );
            close(
                psi.expected_value2(&x, &z, 3, site).unwrap(),
                psi.expected_value2(&x, &z, 3, other).unwrap(),
            );
            close(
                psi.string_order(&z, &x, &n, 2, site).unwrap(),
                psi.string_order(&z, &x, &n, 2, other).unwrap(),
            );
            close(
                psi.expected_value12(&xz, site).unwrap(),
                psi.expected_value12(&xz, other).unwrap(),
            );
        }
    }
}

#[test]
fn entangled_states_are_translation_invariant() {
    let mut rng = ChaCha8Rng::seed_from_u64(1729);
    for _ in 0..3 {
        let psi: ITEBD<f64> = ITEBD::random_bond(2, 3, &mut rng).unwrap();
        check_translation(&psi);
        check_translation(&psi.canonical_form().unwrap());
        let psi: ITEBD<C64> = ITEBD::random_bond(2, 4, &mut rng).unwrap();
        check_translation(&psi);
        check_translation(&psi.canonical_form().unwrap());
    }
}

#[test]
fn odd_and_even_sites_differ_on_entangled_states() {
    // a nonzero difference between the two sublattices, so the invariance
    // above is not trivially satisfied
    let mut rng = ChaCha8Rng::seed_from_u64(1730);
    let psi: ITEBD<f64> = ITEBD::random_bond(2, 3, &mut rng).unwrap();
    let z: nd::Array2<f64> = ops::make_z();
    let even = psi.expected_value(&z, 0).unwrap();
    let odd = psi.expected_value(&z, 1).unwrap();
    assert!((even - odd).abs() > 1e-6);
    assert_abs_diff_eq!(psi.expected_value(&z, -1).unwrap(), odd, epsilon = 1e-10);
    assert_abs_diff_eq!(psi.expected_value(&z, -2).unwrap(), even, epsilon = 1e-10);
}
