use itertools::Itertools;
use ndarray as nd;
use rayon::iter::{ IntoParallelIterator, ParallelIterator };
use tracing::info;
use itebd::{ ITEBD, ITEBDResult, ops };
use lib::{ anneal, init_tracing };

#[derive(Copy, Clone, Debug)]
struct Point {
    h: f64,
    energy: f64,
    mx: f64,
    mz: f64,
    entropy: f64,
    bond_dim: usize,
}

fn ground_state(h: f64, max_dim: usize, schedule: &[(f64, usize)])
    -> ITEBDResult<Point>
{
    let h12: nd::Array2<f64> = ops::ising_h12(1.0, h);
    let x: nd::Array2<f64> = ops::make_x();
    let z: nd::Array2<f64> = ops::make_z();
    // slightly polarized so that the ordered phase picks a sector
    let psi0: ITEBD<f64> = ITEBD::product(&nd::array![0.9, 0.4])?;
    let psi = anneal(psi0, &h12, schedule, max_dim)?;
    Ok(Point {
        h,
        energy: psi.energy(&h12)? / 2.0,
        mx: psi.expected_value(&x, 0)?,
        mz: psi.expected_value(&z, 0)?.abs(),
        entropy: psi.entropy(0),
        bond_dim: psi.max_bond_dimension(),
    })
}

fn main() -> ITEBDResult<()> {
    const H_MIN: f64 = 0.5;
    const H_MAX: f64 = 1.5;
    const NH: usize = 11;
    const MAX_DIM: usize = 16;
    const SCHEDULE: [(f64, usize); 3] = [(0.1, 300), (0.01, 300), (0.001, 500)];

    init_tracing();
    let fields: Vec<f64> = nd::Array1::linspace(H_MIN, H_MAX, NH).to_vec();
    let points: Vec<Point>
        = fields.into_par_iter()
        .map(|h| ground_state(h, MAX_DIM, &SCHEDULE))
        .collect::<ITEBDResult<Vec<Point>>>()?;

    info!(exact = -4.0 / std::f64::consts::PI, "critical energy per site");
    println!("{}", ["h", "e/site", "<X>", "|<Z>|", "S", "D"].iter().join("\t"));
    for p in points.iter() {
        let row = [
            format!("{:.3}", p.h),
            format!("{:.8}", p.energy),
            format!("{:.6}", p.mx),
            format!("{:.6}", p.mz),
            format!("{:.6}", p.entropy),
            format!("{}", p.bond_dim),
        ];
        println!("{}", row.iter().join("\t"));
    }
    Ok(())
}
