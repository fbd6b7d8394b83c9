use criterion::{black_box, criterion_group, criterion_main, Criterion};

use crtbp::{
    Crtbp, CrtbpVariational, Dopri5, MemorySink, OdeSystem, Orbit, Propagator, Settings,
    Tolerances,
};

fn bench_rhs(c: &mut Criterion) {
    let system = CrtbpVariational(Crtbp::new(1e-3).unwrap());
    let y = {
        let mut y = [1e-8; 12];
        y[..6].copy_from_slice(&[1.019, 0.0, 0.0, 0.0, 0.2036, 0.0]);
        y
    };
    let mut dydt = [0.0; 12];

    c.bench_function("coupled_rhs", |b| {
        b.iter(|| {
            system.rhs(black_box(0.0), black_box(&y), &mut dydt);
            black_box(dydt[0])
        })
    });
}

fn bench_single_step(c: &mut Criterion) {
    let system = CrtbpVariational(Crtbp::new(1e-3).unwrap());
    let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));
    let y = {
        let mut y = [1e-8; 12];
        y[..6].copy_from_slice(&[1.019, 0.0, 0.0, 0.0, 0.2036, 0.0]);
        y
    };

    c.bench_function("dopri5_step_12d", |b| {
        b.iter(|| black_box(solver.step(&system, 0.0, black_box(&y), 1e-3)))
    });
}

fn bench_short_propagation(c: &mut Criterion) {
    let settings = Settings {
        mu: 1e-3,
        end_time: std::f64::consts::TAU,
        sample_every: 0,
        settle_time: 1e9,
        atol: 1e-10,
        rtol: 1e-10,
        ..Settings::default()
    };
    let propagator = Propagator::new(settings).unwrap();

    c.bench_function("propagate_one_period", |b| {
        b.iter(|| {
            let mut orbit = Orbit::circular_about_secondary("bench", propagator.system(), 0.02);
            let mut sink = MemorySink::default();
            black_box(propagator.integrate_single(&mut orbit, &mut sink))
        })
    });
}

fn bench_batch(c: &mut Criterion) {
    let settings = Settings {
        mu: 1e-3,
        end_time: std::f64::consts::TAU,
        sample_every: 0,
        settle_time: 1e9,
        atol: 1e-10,
        rtol: 1e-10,
        ..Settings::default()
    };
    let propagator = Propagator::new(settings).unwrap();

    c.bench_function("propagate_batch_16", |b| {
        b.iter(|| {
            let mut orbits: Vec<Orbit> = (0..16)
                .map(|i| {
                    Orbit::circular_about_secondary(
                        format!("bench-{}", i),
                        propagator.system(),
                        0.015 + 0.001 * i as f64,
                    )
                })
                .collect();
            black_box(propagator.integrate_batch(&mut orbits, |_| MemorySink::default()))
        })
    });
}

criterion_group!(
    benches,
    bench_rhs,
    bench_single_step,
    bench_short_propagation,
    bench_batch
);
criterion_main!(benches);
