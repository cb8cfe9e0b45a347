//! World inspection and consistency probes.
//!
//! Read-only observers: nothing here mutates the world.

use crate::chunk::CHUNK_CAPACITY;
use crate::error::{EcsError, Result};
use crate::world::World;

/// World inspector for debugging
pub struct WorldInspector;

/// Archetype information for debugging
#[derive(Clone, Debug)]
pub struct ArchetypeInfo {
    pub id: u32,
    pub component_count: usize,
    pub entity_count: usize,
    pub chunk_count: usize,
}

impl WorldInspector {
    /// Get total entity count
    pub fn entity_count(world: &World) -> usize {
        world.entity_count()
    }

    /// Get archetype summary
    pub fn archetype_summary(world: &World) -> Vec<ArchetypeInfo> {
        world
            .archetypes()
            .iter()
            .map(|archetype| ArchetypeInfo {
                id: archetype.id(),
                component_count: archetype.component_types().len(),
                entity_count: archetype.len(),
                chunk_count: archetype.chunks().len(),
            })
            .collect()
    }

    /// Print world summary to console
    pub fn print_summary(world: &World) {
        println!("=== World Summary ===");
        println!("Entities: {}", world.entity_count());
        println!("Archetypes: {}", world.archetype_count());
        for info in Self::archetype_summary(world) {
            println!(
                "Archetype {}: {} entities, {} components, {} chunks",
                info.id, info.entity_count, info.component_count, info.chunk_count
            );
        }
    }

    /// Check the storage invariants, returning `ValidationFailure` with a
    /// description of the first breach:
    ///
    /// - the empty archetype exists at id 0,
    /// - chunk counts never exceed capacity and live rows are densely
    ///   packed (every chunk before the last live one is full),
    /// - per-archetype totals match the chunk counts,
    /// - every stored entity handle resolves back to its archetype and row,
    /// - the directory's live count matches the stored row total.
    pub fn validate(world: &World) -> Result<()> {
        let archetypes = world.archetypes();
        if archetypes.is_empty() || !archetypes[0].signature().is_empty() {
            return Err(EcsError::ValidationFailure(
                "empty archetype missing at id 0".to_string(),
            ));
        }

        let mut total_rows = 0usize;
        for archetype in archetypes {
            let mut counted = 0usize;
            for (index, chunk) in archetype.chunks().iter().enumerate() {
                if chunk.count() > CHUNK_CAPACITY {
                    return Err(EcsError::ValidationFailure(format!(
                        "archetype {} chunk {} overflows capacity",
                        archetype.id(),
                        index
                    )));
                }
                let expected = archetype
                    .len()
                    .saturating_sub(index * CHUNK_CAPACITY)
                    .min(CHUNK_CAPACITY);
                if chunk.count() != expected {
                    return Err(EcsError::ValidationFailure(format!(
                        "archetype {} chunk {} has {} rows, expected {} (not densely packed)",
                        archetype.id(),
                        index,
                        chunk.count(),
                        expected
                    )));
                }
                counted += chunk.count();

                for (local, &entity) in chunk.entities().iter().enumerate() {
                    let row = (index * CHUNK_CAPACITY + local) as u32;
                    match world.entity_location(entity) {
                        Some(location)
                            if location.archetype == archetype.id() && location.row == row => {}
                        _ => {
                            return Err(EcsError::ValidationFailure(format!(
                                "entity {entity} stored in archetype {} row {row} but the \
                                 directory disagrees",
                                archetype.id()
                            )))
                        }
                    }
                }
            }
            if counted != archetype.len() {
                return Err(EcsError::ValidationFailure(format!(
                    "archetype {} length {} does not match chunk total {}",
                    archetype.id(),
                    archetype.len(),
                    counted
                )));
            }
            total_rows += counted;
        }

        if total_rows != world.entity_count() {
            return Err(EcsError::ValidationFailure(format!(
                "directory holds {} live entities but archetypes store {} rows",
                world.entity_count(),
                total_rows
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    #[derive(Clone, Copy, Debug)]
    struct Pos {
        _x: f32,
    }
    impl Component for Pos {}

    #[test]
    fn fresh_world_validates() {
        let world = World::new();
        WorldInspector::validate(&world).unwrap();
    }

    #[test]
    fn validates_after_churn() {
        let mut world = World::new();
        let mut entities = Vec::new();
        for i in 0..700 {
            let e = world.create_entity();
            world.add_component(e, Pos { _x: i as f32 });
            entities.push(e);
        }
        for e in entities.iter().step_by(3) {
            world.destroy_entity(*e);
        }
        WorldInspector::validate(&world).unwrap();
    }

    #[test]
    fn summary_reports_archetypes() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Pos { _x: 0.0 });

        let summary = WorldInspector::archetype_summary(&world);
        assert_eq!(summary.len(), world.archetype_count());
        assert_eq!(summary[0].entity_count, 0);
        assert_eq!(summary[1].entity_count, 1);
        assert_eq!(WorldInspector::entity_count(&world), 1);
    }
}
