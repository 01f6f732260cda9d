//! # Family Maintenance Benchmark
//!
//! Measures the per-tick cost of keeping families in step with the entity
//! table, and of a system walking its family through pool handles.
//!
//! Run with: `cargo bench --package strata_core`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_core::{MovementSystem, Position, Timeline, Velocity, World, WorldConfig};

/// Entity counts for the scaling groups.
const COUNTS: [usize; 3] = [1_000, 10_000, 100_000];

fn world() -> World {
    let mut world = World::new(WorldConfig::default()).unwrap();
    world.register_component::<Position>().unwrap();
    world.register_component::<Velocity>().unwrap();
    world
}

fn populated(count: usize) -> World {
    let mut world = world();
    world.add_system(Timeline::Fixed, MovementSystem).unwrap();
    for i in 0..count {
        let e = world.create_entity();
        let f = i as f32;
        world.add_component(e, Position::new(f, f, f)).unwrap();
        world.add_component(e, Velocity::new(0.1, 0.2, 0.3)).unwrap();
    }
    world.refresh();
    world
}

/// Benchmark: spawn entities with two components, then refresh them into a family.
fn bench_spawn_and_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_and_refresh");

    for count in COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let world = populated(count);
                black_box(world.scene().entities().alive_count())
            });
        });
    }

    group.finish();
}

/// Benchmark: one fixed step of the movement system.
fn bench_movement_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_tick");

    for count in COUNTS {
        let mut world = populated(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                world.on_fixed_update(black_box(1.0 / 60.0));
            });
        });
    }

    group.finish();
}

/// Benchmark: refresh after toggling a component on every tenth entity.
fn bench_churn_refresh(c: &mut Criterion) {
    let mut world = populated(10_000);
    let ids: Vec<_> = world.scene().iter_entities().map(|e| e.id()).step_by(10).collect();
    let mut present = true;

    c.bench_function("churn_refresh_10k", |b| {
        b.iter(|| {
            for id in &ids {
                if present {
                    world.remove_component::<Velocity>(*id).unwrap();
                } else {
                    world.add_component(*id, Velocity::default()).unwrap();
                }
            }
            present = !present;
            black_box(world.refresh())
        });
    });
}

/// Benchmark: destroy and recreate a slice of entities.
fn bench_destroy_recreate(c: &mut Criterion) {
    c.bench_function("destroy_recreate_1k_of_10k", |b| {
        let mut world = populated(10_000);
        b.iter(|| {
            let victims: Vec<_> = world.scene().iter_entities().map(|e| e.id()).take(1_000).collect();
            for id in victims {
                world.destroy_entity(id);
            }
            world.refresh();
            for _ in 0..1_000 {
                let e = world.create_entity();
                world.add_component(e, Position::default()).unwrap();
                world.add_component(e, Velocity::default()).unwrap();
            }
            black_box(world.refresh())
        });
    });
}

criterion_group!(
    benches,
    bench_spawn_and_refresh,
    bench_movement_tick,
    bench_churn_refresh,
    bench_destroy_recreate,
);
criterion_main!(benches);
