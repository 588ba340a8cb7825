use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::info;
use itebd::{ ITEBD, ITEBDResult, ops };
use lib::{ anneal, init_tracing };

fn main() -> ITEBDResult<()> {
    const DELTAS: [f64; 5] = [0.0, 0.5, 1.0, 1.5, 2.0];
    const MAX_DIM: usize = 24;
    const SEP: usize = 8;
    const SCHEDULE: [(f64, usize); 3] = [(0.1, 400), (0.01, 400), (0.001, 500)];

    init_tracing();
    let half = C64::from(0.5);
    let sz: nd::Array2<C64> = ops::ZMAT.mapv(|zk| zk * half);
    // exp(iπ Sz), the string operator of the Néel and Haldane-type orders
    let string: nd::Array2<C64>
        = nd::Array2::from_diag(&nd::array![C64::i(), -C64::i()]);

    println!("{}", ["delta", "e/site", "<SzSz>", "stag", "string", "S"].iter().join("\t"));
    for delta in DELTAS {
        let h12: nd::Array2<C64> = ops::xxz_h12(1.0, delta);
        // Néel product state
        let psi0: ITEBD<C64> = ITEBD::product2(
            &nd::array![C64::new(0.95, 0.0), C64::new(0.2, 0.1)],
            &nd::array![C64::new(0.2, -0.1), C64::new(0.95, 0.0)],
        )?;
        let psi = anneal(psi0, &h12, &SCHEDULE, MAX_DIM)?;
        let energy = psi.energy(&h12)? / 2.0;
        let nn = psi.expected_value2(&sz, &sz, 0, 0)?.re;
        let stag = (psi.expected_value(&sz, 0)? - psi.expected_value(&sz, 1)?).re / 2.0;
        let order = psi.string_order(&sz, &string, &sz, SEP, 0)?.re;
        let entropy = psi.entropy_total() / 2.0;
        if delta == 1.0 {
            info!(exact = 0.25 - std::f64::consts::LN_2, energy, "heisenberg energy per site");
        }
        let row = [
            format!("{:.2}", delta),
            format!("{:.8}", energy),
            format!("{:.6}", nn),
            format!("{:.6}", stag),
            format!("{:.6}", order),
            format!("{:.6}", entropy),
        ];
        println!("{}", row.iter().join("\t"));
    }
    Ok(())
}
