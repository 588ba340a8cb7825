//! Shared setup for the demonstration programs.

use ndarray as nd;
use tracing_subscriber::{
    EnvFilter,
    Layer,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use itebd::{
    ITEBD,
    ITEBDResult,
    ITimeConfig,
    ScalarExt,
    TracingReporter,
    evolve_itime_with,
};

/// Install a compact `fmt` subscriber, filtered by `RUST_LOG` and defaulting
/// to `info`.
pub fn init_tracing() {
    let filter
        = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer
        = fmt::layer()
        .compact()
        .with_target(false)
        .with_filter(filter);
    // fails only if a global subscriber is already set
    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}

/// Evolve `psi` in imaginary time through a sequence of `(dt, nsteps)` stages
/// with bond dimension at most `max_dim`, and return the result in canonical
/// form.
///
/// Each stage is logged at its start and end.
pub fn anneal<A>(
    psi: ITEBD<A>,
    h12: &nd::Array2<A>,
    schedule: &[(A::Real, usize)],
    max_dim: usize,
) -> ITEBDResult<ITEBD<A>>
where A: ScalarExt
{
    let mut psi = psi;
    for &(dt, nsteps) in schedule {
        let config = ITimeConfig {
            dt,
            nsteps,
            tolerance: A::real(1e-12),
            max_dim,
            report_interval: nsteps.max(1),
        };
        psi = evolve_itime_with(psi, h12, &config, &mut TracingReporter)?;
    }
    psi.canonical_form_exact()
}
