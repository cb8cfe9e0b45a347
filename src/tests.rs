// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cross-module scenario tests.

use crate::debug::WorldInspector;
use crate::entity::Entity;
use crate::event::EventChannel;
use crate::prelude::*;
use crate::snapshot;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
    dz: f32,
}
impl Component for Velocity {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct A {
    value: i32,
}
impl Component for A {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct B {
    value: i32,
}
impl Component for B {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct C {
    value: i32,
}
impl Component for C {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Health(u32);
impl Component for Health {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct MoveIntent {
    dx: f32,
    dy: f32,
}
impl Component for MoveIntent {
    const ONE_FRAME: bool = true;
}

fn pos(v: f32) -> Position {
    Position { x: v, y: v, z: v }
}

/// S1: three entities with Position, destroy the middle one; the survivors
/// keep their data through the swap-remove. Both swap directions covered.
#[test]
fn s1_destroy_middle_entity_preserves_survivors() {
    let mut world = World::new();
    let entities: Vec<Entity> = (1..=3)
        .map(|i| {
            let e = world.create_entity();
            world.add_component(e, pos(i as f32));
            e
        })
        .collect();

    world.destroy_entity(entities[1]);

    let mut total = 0;
    let mut survivors: Vec<Entity> = Vec::new();
    for chunk in world.query().with::<Position>().chunks() {
        total += chunk.count();
        survivors.extend_from_slice(chunk.entities());
    }
    assert_eq!(total, 2);
    assert_eq!(survivors.len(), 2);
    assert!(survivors.contains(&entities[0]));
    assert!(survivors.contains(&entities[2]));
    assert_eq!(world.get_component::<Position>(entities[2]), Ok(&pos(3.0)));
    assert_eq!(world.get_component::<Position>(entities[0]), Ok(&pos(1.0)));
    WorldInspector::validate(&world).unwrap();
}

#[test]
fn s1_destroy_last_entity_is_the_trivial_swap() {
    let mut world = World::new();
    let entities: Vec<Entity> = (1..=3)
        .map(|i| {
            let e = world.create_entity();
            world.add_component(e, pos(i as f32));
            e
        })
        .collect();

    // The other swap order: the removed row is already the last one.
    world.destroy_entity(entities[2]);
    assert_eq!(world.query().with::<Position>().count(), 2);
    assert_eq!(world.get_component::<Position>(entities[0]), Ok(&pos(1.0)));
    assert_eq!(world.get_component::<Position>(entities[1]), Ok(&pos(2.0)));
    WorldInspector::validate(&world).unwrap();
}

/// S2: three migrations in a row; every value survives and the final
/// signature holds exactly those three bits.
#[test]
fn s2_chained_migrations_accumulate_components() {
    let mut world = World::new();
    let e = world.create_entity();
    world.add_component(e, A { value: 7 });
    world.add_component(e, B { value: 9 });
    world.add_component(e, C { value: 11 });

    assert_eq!(world.get_component::<A>(e), Ok(&A { value: 7 }));
    assert_eq!(world.get_component::<B>(e), Ok(&B { value: 9 }));
    assert_eq!(world.get_component::<C>(e), Ok(&C { value: 11 }));

    let signature = world.archetype_of(e).unwrap().signature().clone();
    assert_eq!(signature.count_ones(), 3);
    assert!(signature.has(world.register_component::<A>()));
    assert!(signature.has(world.register_component::<B>()));
    assert!(signature.has(world.register_component::<C>()));
}

/// S3: 1,000 entities with Position+Velocity and 500 with Position only.
#[test]
fn s3_with_without_row_counts() {
    let mut world = World::new();
    for i in 0..1_000 {
        let e = world.create_entity();
        world.add_component(e, pos(i as f32));
        world.add_component(
            e,
            Velocity {
                dx: 1.0,
                dy: 0.0,
                dz: 0.0,
            },
        );
    }
    for i in 0..500 {
        let e = world.create_entity();
        world.add_component(e, pos(i as f32));
    }

    assert_eq!(world.query().with::<Position>().with::<Velocity>().count(), 1_000);
    assert_eq!(
        world.query().with::<Position>().without::<Velocity>().count(),
        500
    );
    assert_eq!(world.query().with::<Position>().count(), 1_500);

    let mut velocity_rows = 0;
    for chunk in world.query().with::<Position>().with::<Velocity>().chunks() {
        assert_eq!(
            chunk.column::<Position>().unwrap().len(),
            chunk.column::<Velocity>().unwrap().len()
        );
        velocity_rows += chunk.count();
    }
    assert_eq!(velocity_rows, 1_000);
}

/// S4: overflowing a 1,024-entry channel with 1,500 publishes keeps the
/// newest 1,024; the first drained item is the 477th published.
#[test]
fn s4_event_channel_overflow_drops_oldest() {
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Numbered(u32);
    impl Component for Numbered {}

    let mut channel = EventChannel::<Numbered>::new();
    assert_eq!(channel.capacity(), 1_024);
    for i in 0..1_500 {
        channel.publish(Numbered(i));
    }

    let mut drained = Vec::new();
    channel.consume_all(|event| drained.push(event.0));
    assert_eq!(drained.len(), 1_024);
    assert_eq!(drained[0], 476, "first survivor is the 477th published");
    assert_eq!(*drained.last().unwrap(), 1_499);
}

/// S5: save 200 entities across four non-empty archetypes, load into an
/// empty world, compare everything observable plus the checksum.
#[test]
fn s5_snapshot_roundtrip_200_entities() {
    let mut world = World::new();
    let mut entities = Vec::new();
    for i in 0..200u32 {
        let e = world.create_entity();
        entities.push(e);
        match i % 4 {
            0 => world.add_component(e, pos(i as f32)),
            1 => {
                world.add_component(e, pos(i as f32));
                world.add_component(
                    e,
                    Velocity {
                        dx: i as f32,
                        dy: 0.0,
                        dz: 0.0,
                    },
                );
            }
            2 => {
                world.add_component(e, pos(i as f32));
                world.add_component(e, Health(i));
            }
            _ => world.add_component(e, Health(i)),
        }
    }

    let bytes = snapshot::save(&world, 1_700_000_000);
    let header = snapshot::peek_header(&bytes).unwrap();
    assert_eq!(header.entity_count, 200);

    let mut restored = World::new();
    snapshot::restore(&mut restored, &bytes).unwrap();

    assert_eq!(restored.entity_count(), 200);
    for &e in &entities {
        assert!(restored.is_alive(e));
        assert_eq!(
            restored.get_component::<Position>(e).ok(),
            world.get_component::<Position>(e).ok()
        );
        assert_eq!(
            restored.get_component::<Velocity>(e).ok(),
            world.get_component::<Velocity>(e).ok()
        );
        assert_eq!(
            restored.get_component::<Health>(e).ok(),
            world.get_component::<Health>(e).ok()
        );
        assert_eq!(
            restored.archetype_of(e).unwrap().id(),
            world.archetype_of(e).unwrap().id()
        );
    }
    assert_eq!(snapshot::checksum(&restored), header.checksum);
    WorldInspector::validate(&restored).unwrap();
}

/// S6: one-frame component clears to the zero record at the boundary while
/// archetype membership is preserved.
#[test]
fn s6_one_frame_component_zeroes_at_boundary() {
    let mut world = World::new();
    let e = world.create_entity();
    world.add_component(e, MoveIntent { dx: 4.0, dy: -2.0 });

    world.clear_one_frame();

    assert!(world.has_component::<MoveIntent>(e));
    assert_eq!(
        world.get_component::<MoveIntent>(e),
        Ok(&MoveIntent { dx: 0.0, dy: 0.0 })
    );
}

#[test]
fn generation_bumps_when_an_id_is_recycled() {
    let mut world = World::new();
    let first = world.create_entity();
    world.destroy_entity(first);

    let second = world.create_entity();
    assert_eq!(second.id(), first.id());
    assert_eq!(second.generation(), first.generation() + 1);
    assert!(!world.is_alive(first));
    assert!(world.is_alive(second));
}

#[test]
fn blueprint_instantiate_many_then_query() {
    let mut world = World::new();
    let soldier = Blueprint::new("soldier")
        .with(pos(0.0))
        .with(Health(100));
    let spawned = soldier.instantiate_many(&mut world, 600);

    assert_eq!(spawned.len(), 600);
    assert_eq!(world.query().with::<Position>().with::<Health>().count(), 600);
    // 600 rows span two chunks of the same archetype.
    let chunk_counts: Vec<usize> = world
        .query()
        .with::<Position>()
        .with::<Health>()
        .chunks()
        .map(|chunk| chunk.count())
        .collect();
    assert_eq!(chunk_counts, vec![CHUNK_CAPACITY, 600 - CHUNK_CAPACITY]);
    WorldInspector::validate(&world).unwrap();
}

#[test]
fn heavy_churn_keeps_chunks_dense() {
    let mut world = World::new();
    let mut entities = Vec::new();
    for i in 0..1_400 {
        let e = world.create_entity();
        world.add_component(e, pos(i as f32));
        entities.push(e);
    }
    for e in entities.iter().skip(1).step_by(2) {
        world.destroy_entity(*e);
    }
    WorldInspector::validate(&world).unwrap();
    assert_eq!(world.query().with::<Position>().count(), 700);

    // Refill; recycled ids come back LIFO and land in the dense tail.
    for i in 0..300 {
        let e = world.create_entity();
        world.add_component(e, pos(i as f32));
    }
    WorldInspector::validate(&world).unwrap();
    assert_eq!(world.query().with::<Position>().count(), 1_000);
}

#[test]
fn scheduler_drives_systems_against_the_world() {
    struct Integrate;
    impl System for Integrate {
        fn name(&self) -> &'static str {
            "integrate"
        }

        fn run(&mut self, world: &mut World) -> Result<()> {
            // Collect matching entities from chunks, then write through the
            // component API; systems mutate only via `&mut World`.
            let targets: Vec<Entity> = world
                .query()
                .with::<Position>()
                .with::<Velocity>()
                .chunks()
                .flat_map(|chunk| chunk.entities().to_vec())
                .collect();
            for e in targets {
                let v = *world.get_component::<Velocity>(e)?;
                let p = world.get_component_mut::<Position>(e)?;
                p.x += v.dx;
                p.y += v.dy;
                p.z += v.dz;
            }
            Ok(())
        }
    }

    let mut world = World::new();
    let e = world.create_entity();
    world.add_component(e, pos(0.0));
    world.add_component(
        e,
        Velocity {
            dx: 1.0,
            dy: 2.0,
            dz: 3.0,
        },
    );

    let mut scheduler = Scheduler::new();
    scheduler.add_system(Integrate, Phase::Update, 0);
    scheduler.run_frame(&mut world).unwrap();
    scheduler.run_frame(&mut world).unwrap();

    assert_eq!(
        world.get_component::<Position>(e),
        Ok(&Position {
            x: 2.0,
            y: 4.0,
            z: 6.0
        })
    );
}
