//! Benchmarks for the CPU reference kernels and a full tick.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use nbody_sim::physics;
use nbody_sim::{ComputeBackend, CpuBackend, Pattern, SimConfig, Simulation, StepParams};

fn populated(capacity: usize, evolve: bool) -> Simulation<CpuBackend> {
    let config = SimConfig::default()
        .with_capacity(capacity)
        .with_seed(1)
        .with_evolve_mode(evolve);
    let mut sim = Simulation::cpu(config);
    sim.restart_with(Pattern::Galaxy, capacity);
    sim
}

fn bench_integrate(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_integrate");

    for capacity in [64, 256, 1024] {
        let sim = populated(capacity, false);
        let store = sim.store();
        let mut backend = CpuBackend::new(capacity);
        backend.upload(store.positions(), store.velocities());
        let params = StepParams {
            dt: 1.0,
            gravity: 3.0e-6,
        };

        group.bench_with_input(BenchmarkId::new("bodies", capacity), &capacity, |b, _| {
            b.iter(|| backend.integrate(black_box(params)))
        });
    }

    group.finish();
}

fn bench_collision_scan(c: &mut Criterion) {
    let sim = populated(1024, false);
    let store = sim.store();

    c.bench_function("collision_report_1024", |b| {
        b.iter(|| {
            for i in 0..store.active_count() {
                black_box(physics::collision_report(
                    i,
                    store.positions(),
                    store.velocities(),
                    store.active_count(),
                    physics::COLLISION_RADIUS,
                ));
            }
        })
    });
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for evolve in [false, true] {
        let mut sim = populated(256, evolve);
        let label = if evolve { "evolve" } else { "plain" };
        group.bench_function(label, |b| b.iter(|| black_box(sim.tick())));
    }

    group.finish();
}

criterion_group!(benches, bench_integrate, bench_collision_scan, bench_tick);
criterion_main!(benches);
