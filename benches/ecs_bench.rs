#![allow(dead_code)]
//! Core storage benchmarks.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use esse_ecs::{Blueprint, Component, World};

#[derive(Debug, Copy, Clone)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Debug, Copy, Clone)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Velocity {}

#[derive(Debug, Copy, Clone)]
struct Health(u32);
impl Component for Health {}

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create");

    group.bench_function("create_1k_empty", |b| {
        b.iter(|| {
            let mut world = World::new();
            for _ in 0..1_000 {
                black_box(world.create_entity());
            }
        });
    });

    group.bench_function("blueprint_1k_two_components", |b| {
        let blueprint = Blueprint::new("bench")
            .with(Position {
                x: 0.0,
                y: 0.0,
                z: 0.0,
            })
            .with(Velocity {
                x: 1.0,
                y: 0.0,
                z: 0.0,
            });
        b.iter(|| {
            let mut world = World::new();
            black_box(blueprint.instantiate_many(&mut world, 1_000));
        });
    });

    group.finish();
}

fn bench_migration(c: &mut Criterion) {
    let mut group = c.benchmark_group("migration");

    group.bench_function("add_two_components_1k", |b| {
        b.iter(|| {
            let mut world = World::new();
            for i in 0..1_000 {
                let e = world.create_entity();
                world.add_component(
                    e,
                    Position {
                        x: i as f32,
                        y: 0.0,
                        z: 0.0,
                    },
                );
                world.add_component(e, Health(100));
            }
            black_box(world.entity_count());
        });
    });

    group.finish();
}

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("iteration");

    let mut world = World::new();
    for i in 0..100_000 {
        let e = world.create_entity();
        world.add_component(
            e,
            Position {
                x: i as f32,
                y: 0.0,
                z: 0.0,
            },
        );
        if i % 2 == 0 {
            world.add_component(
                e,
                Velocity {
                    x: 1.0,
                    y: 0.0,
                    z: 0.0,
                },
            );
        }
    }
    // Warm the plan cache so the loop measures pure iteration.
    let _ = world.query().with::<Position>().with::<Velocity>().count();

    group.bench_function("iterate_50k_matching_rows", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for chunk in world.query().with::<Position>().with::<Velocity>().chunks() {
                let positions = chunk.column::<Position>().unwrap();
                let velocities = chunk.column::<Velocity>().unwrap();
                for (p, v) in positions.iter().zip(velocities) {
                    sum += p.x + v.x;
                }
            }
            black_box(sum);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_create, bench_migration, bench_iteration);
criterion_main!(benches);
