/// Profiler friendly version of the Biot-Savart Ewald evaluator.

use std::f64::consts::PI;

use criterion::{criterion_group, criterion_main, Criterion};

use vortex_filament::biot_savart::{BiotSavartCache, EvaluatorFlags, LongRangeBackend, ParamsBiotSavart};
use vortex_filament::cell_list::{NeighborBackend, Periods};
use vortex_filament::filament::{DiscretisationMethod, Filament};
use vortex_filament::quadrature::GaussLegendre;
use vortex_filament::vec3::Vec3;

fn ring(n: usize, radius: f64) -> Filament {
    let points: Vec<Vec3> = (0..n)
        .map(|k| {
            let theta = 2.0 * PI * k as f64 / n as f64;
            Vec3::new(radius * theta.cos(), radius * theta.sin(), 0.0)
        })
        .collect();
    Filament::init(points, DiscretisationMethod::CubicSpline, Vec3::zeros()).unwrap()
}

fn exact_sum_params() -> ParamsBiotSavart {
    ParamsBiotSavart::new(
        1.0,
        1e-4,
        0.5,
        Periods::periodic(2.0 * PI, 2.0 * PI, 2.0 * PI),
        Some([16, 16, 16]),
        1.0,
        1.0,
        GaussLegendre::new(4),
        GaussLegendre::new(4),
        NeighborBackend::CellLists,
        LongRangeBackend::ExactSum,
    )
    .unwrap()
}

fn nufft_params() -> ParamsBiotSavart {
    ParamsBiotSavart::new(
        1.0,
        1e-4,
        0.5,
        Periods::periodic(2.0 * PI, 2.0 * PI, 2.0 * PI),
        Some([16, 16, 16]),
        1.0,
        1.0,
        GaussLegendre::new(4),
        GaussLegendre::new(4),
        NeighborBackend::CellLists,
        LongRangeBackend::Nufft {
            tolerance: 1e-6,
            support: 4,
            oversampling: 1.5,
        },
    )
    .unwrap()
}

fn compute_on_nodes(params: &ParamsBiotSavart) {
    let filaments = vec![ring(64, 1.0)];
    let mut cache = BiotSavartCache::new(params);
    cache.compute_on_nodes(&filaments, params, EvaluatorFlags::Full, true);
}

fn my_benchmark(c: &mut Criterion) {
    let exact = exact_sum_params();
    c.bench_function("biot_savart_exact_sum", |b| b.iter(|| compute_on_nodes(&exact)));
    let nufft = nufft_params();
    c.bench_function("biot_savart_nufft", |b| b.iter(|| compute_on_nodes(&nufft)));
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = my_benchmark
}
criterion_main!(benches);
