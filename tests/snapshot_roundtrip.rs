//! Snapshot codec integration tests: bit-exact round-trips, error surfaces,
//! and atomicity of failed restores.

use esse_ecs::prelude::*;
use esse_ecs::snapshot;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Transform {
    x: f32,
    y: f32,
    rotation: f32,
}
impl Component for Transform {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Physics {
    vx: f32,
    vy: f32,
}
impl Component for Physics {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Tagged;
impl Component for Tagged {}

fn build_world(entities: u32) -> (World, Vec<Entity>) {
    let mut world = World::new();
    let mut handles = Vec::new();
    for i in 0..entities {
        let e = world.create_entity();
        world.add_component(
            e,
            Transform {
                x: i as f32 * 0.5,
                y: -(i as f32),
                rotation: 0.25,
            },
        );
        if i % 3 == 0 {
            world.add_component(
                e,
                Physics {
                    vx: 1.0,
                    vy: f32::NEG_INFINITY, // floats round-trip bitwise
                },
            );
        }
        if i % 5 == 0 {
            world.add_component(e, Tagged);
        }
        handles.push(e);
    }
    // Some churn so the freelist and generations are non-trivial.
    for &e in handles.iter().step_by(7) {
        world.destroy_entity(e);
    }
    (world, handles)
}

#[test]
fn roundtrip_after_churn_matches_observably() {
    let (world, handles) = build_world(120);
    let bytes = snapshot::save(&world, 99);

    let mut restored = World::new();
    snapshot::restore(&mut restored, &bytes).unwrap();

    assert_eq!(restored.entity_count(), world.entity_count());
    assert_eq!(restored.archetype_count(), world.archetype_count());
    for &e in &handles {
        assert_eq!(restored.is_alive(e), world.is_alive(e));
        if !world.is_alive(e) {
            continue;
        }
        assert_eq!(
            restored.get_component::<Transform>(e).ok(),
            world.get_component::<Transform>(e).ok()
        );
        assert_eq!(
            restored.get_component::<Physics>(e).ok(),
            world.get_component::<Physics>(e).ok()
        );
        assert_eq!(
            restored.has_component::<Tagged>(e),
            world.has_component::<Tagged>(e)
        );
    }
    WorldInspector::validate(&restored).unwrap();
}

#[test]
fn restored_world_saves_to_identical_bytes() {
    let (world, _) = build_world(60);
    let bytes = snapshot::save(&world, 7);

    let mut restored = World::new();
    snapshot::restore(&mut restored, &bytes).unwrap();

    // Same process, same registry: a re-save of the restored world is
    // bit-exact, timestamp included.
    assert_eq!(snapshot::save(&restored, 7), bytes);
}

#[test]
fn recreated_entities_after_restore_get_fresh_ids() {
    let (world, _) = build_world(40);
    let bytes = snapshot::save(&world, 0);

    let mut restored = World::new();
    snapshot::restore(&mut restored, &bytes).unwrap();

    let count_before = restored.entity_count();
    let spawned = restored.create_entity();
    assert!(restored.is_alive(spawned));
    assert_eq!(restored.entity_count(), count_before + 1);
    WorldInspector::validate(&restored).unwrap();
}

#[test]
fn unknown_component_name_aborts_the_load() {
    let (world, _) = build_world(10);
    let mut bytes = snapshot::save(&world, 0);

    // Corrupt the first type-table name: the type count sits right after the
    // 80-byte header, the first entry's name bytes start 8 bytes further in.
    let name_start = 80 + 4 + 8;
    bytes[name_start] = b'?';

    let mut target = World::new();
    let sentinel = target.create_entity();
    match snapshot::restore(&mut target, &bytes) {
        Err(EcsError::UnknownComponent(_)) => {}
        other => panic!("expected UnknownComponent, got {other:?}"),
    }
    // Atomicity: the failed load touched nothing.
    assert!(target.is_alive(sentinel));
    assert_eq!(target.entity_count(), 1);
}

#[test]
fn header_errors_are_specific() {
    let (world, _) = build_world(5);
    let bytes = snapshot::save(&world, 3);

    let mut magic = bytes.clone();
    magic[2] = 0;
    assert_eq!(
        snapshot::peek_header(&magic),
        Err(EcsError::SnapshotMagicMismatch)
    );

    let mut version = bytes.clone();
    version[4] = 2;
    assert_eq!(
        snapshot::peek_header(&version),
        Err(EcsError::SnapshotVersionUnsupported(2))
    );

    assert_eq!(
        snapshot::peek_header(&bytes[..16]),
        Err(EcsError::SnapshotTruncated)
    );
}

#[test]
fn file_wrappers_roundtrip() {
    let (world, _) = build_world(25);
    let path = std::env::temp_dir().join("esse_ecs_snapshot_test.bin");

    snapshot::save_to_file(&world, &path, 1234).unwrap();
    let mut restored = World::new();
    snapshot::load_from_file(&mut restored, &path).unwrap();
    assert_eq!(restored.entity_count(), world.entity_count());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_file_surfaces_io_error() {
    let mut world = World::new();
    let result = snapshot::load_from_file(
        &mut world,
        std::path::Path::new("/definitely/not/a/real/path.bin"),
    );
    assert!(matches!(result, Err(EcsError::Io(_))));
}
