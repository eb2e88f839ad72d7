/// Profiler friendly version of the time integrator's stepping loop.

use std::f64::consts::PI;

use criterion::{criterion_group, criterion_main, Criterion};

use vortex_filament::biot_savart::{LongRangeBackend, ParamsBiotSavart};
use vortex_filament::cell_list::{NeighborBackend, Periods};
use vortex_filament::filament::{DiscretisationMethod, Filament};
use vortex_filament::integrator::{ExplicitScheme, NoCallback, Problem, Scheme, TimeIntegrator};
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

fn params() -> ParamsBiotSavart {
    ParamsBiotSavart::new(
        1.0,
        1e-4,
        0.5,
        Periods::open(),
        None,
        1.5,
        0.5,
        GaussLegendre::new(4),
        GaussLegendre::new(4),
        NeighborBackend::Naive,
        LongRangeBackend::ExactSum,
    )
    .unwrap()
}

fn integrate(scheme: Scheme) {
    let problem = Problem::new(vec![ring(64, 1.0)], params(), 0.0, 1e-2);
    let integrator = TimeIntegrator::new(scheme, 1e-3);
    let mut state = integrator.init(problem).unwrap();
    let mut callback = NoCallback;
    for _ in 0..10 {
        state.step(&mut callback);
    }
}

fn my_benchmark(c: &mut Criterion) {
    c.bench_function("time_stepping_rk4", |b| {
        b.iter(|| integrate(Scheme::Explicit(ExplicitScheme::Rk4)))
    });
    c.bench_function("time_stepping_euler", |b| {
        b.iter(|| integrate(Scheme::Explicit(ExplicitScheme::Euler)))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = my_benchmark
}
criterion_main!(benches);
