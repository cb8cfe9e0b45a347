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

//! World: central entity and archetype storage.
//!
//! The world owns the entity directory, every archetype, the query-plan
//! cache, and the event channel map. Mutation is single-threaded (`&mut
//! self`); shared references may be read from multiple threads, including
//! concurrent queries over overlapping archetypes, as long as nothing
//! mutates.
//!
//! Structural mutations (`add_component`, `remove_component`) migrate the
//! entity between archetypes: a row is appended to the target archetype,
//! column data for the intersection of the two component sets is byte-copied
//! using registry metadata, and the old row is removed by swap-remove with a
//! directory fixup for whichever entity got moved into the hole.

use std::any::TypeId;

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::archetype::{split_row, Archetype};
use crate::component::Component;
use crate::entity::{Entity, EntityDirectory, EntityLocation};
use crate::error::{EcsError, Result};
use crate::event::{AnyChannel, EventChannel};
use crate::query::{CachedPlan, PlanKey, QueryBuilder};
use crate::registry::{self, ComponentId};
use crate::signature::Signature;

/// Central ECS container.
pub struct World {
    pub(crate) directory: EntityDirectory,
    pub(crate) archetypes: Vec<Archetype>,
    archetype_index: AHashMap<Signature, u32>,
    /// Query plans, keyed by `(with, without)`. Boxed so references handed to
    /// iterators stay valid while the map grows; entries are never removed.
    pub(crate) plans: Mutex<AHashMap<PlanKey, Box<CachedPlan>>>,
    channels: AHashMap<TypeId, Box<dyn AnyChannel>>,
    /// Cached one-frame component ids, refreshed lazily from the registry.
    one_frame: Vec<ComponentId>,
    one_frame_seen: usize,
}

impl World {
    /// Create a new, empty world. The empty archetype is bootstrapped at id
    /// 0; entities are born there.
    pub fn new() -> Self {
        let mut world = World {
            directory: EntityDirectory::new(),
            archetypes: Vec::with_capacity(64),
            archetype_index: AHashMap::with_capacity(64),
            plans: Mutex::new(AHashMap::with_capacity(32)),
            channels: AHashMap::new(),
            one_frame: Vec::new(),
            one_frame_seen: 0,
        };
        world.ensure_archetype(Signature::empty());
        world
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity with no components. Id assignment is deterministic:
    /// most recently destroyed id first, else the next monotonic id.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.directory.allocate();
        let row = self.archetypes[0].add_entity(entity);
        self.directory
            .set_location(entity, EntityLocation { archetype: 0, row });
        entity
    }

    /// Destroy an entity. Stale or dead handles are a silent no-op.
    pub fn destroy_entity(&mut self, entity: Entity) {
        let Some(location) = self.directory.location(entity) else {
            debug!(entity = %entity, "destroy_entity on dead handle ignored");
            return;
        };
        if let Some(moved) = self.archetypes[location.archetype as usize].remove_entity(location.row)
        {
            self.directory.set_row(moved, location.row);
        }
        self.directory.free(entity);
    }

    /// Whether `entity` is live (generation matches and not destroyed).
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.directory.is_alive(entity)
    }

    // -- component API ------------------------------------------------------

    /// Register `T` with the process-wide registry. Idempotent; queries and
    /// component operations register on first use anyway, so calling this is
    /// only required before snapshot restore resolves types by name.
    pub fn register_component<T: Component>(&self) -> ComponentId {
        registry::register::<T>()
    }

    /// Attach `value` to `entity`, migrating it to the archetype that also
    /// contains `T`. If `T` is already present the existing slot is
    /// overwritten in place (duplicate adds are not an error). Stale handles
    /// are a silent no-op.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        let id = registry::register::<T>();
        let Some(location) = self.directory.location(entity) else {
            debug!(entity = %entity, component = registry::meta(id).name,
                   "add_component on dead handle ignored");
            return;
        };

        let archetype = &mut self.archetypes[location.archetype as usize];
        if archetype.signature().has(id) {
            let (chunk, local) = split_row(location.row);
            if let Some(slot) = archetype.chunks_mut()[chunk].get_mut::<T>(local) {
                *slot = value;
            }
            return;
        }

        let target = archetype.signature().with(id);
        self.migrate(
            entity,
            location,
            target,
            Some((id, &value as *const T as *const u8)),
        );
    }

    /// Detach `T` from `entity`, migrating it to the archetype without `T`.
    /// A missing component or a stale handle is a silent no-op.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        let id = registry::register::<T>();
        let Some(location) = self.directory.location(entity) else {
            debug!(entity = %entity, component = registry::meta(id).name,
                   "remove_component on dead handle ignored");
            return;
        };

        let archetype = &self.archetypes[location.archetype as usize];
        if !archetype.signature().has(id) {
            return;
        }

        let target = archetype.signature().without(id);
        self.migrate(entity, location, target, None);
    }

    /// Borrow `entity`'s `T` directly from its column.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T> {
        let id = registry::register::<T>();
        let location = self
            .directory
            .location(entity)
            .ok_or(EcsError::EntityDead(entity))?;
        let archetype = &self.archetypes[location.archetype as usize];
        let (chunk, local) = split_row(location.row);
        archetype.chunks()[chunk]
            .get::<T>(local)
            .ok_or(EcsError::ComponentMissing {
                entity,
                component: registry::meta(id).name,
            })
    }

    /// Mutably borrow `entity`'s `T` directly from its column.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        let id = registry::register::<T>();
        let location = self
            .directory
            .location(entity)
            .ok_or(EcsError::EntityDead(entity))?;
        let archetype = &mut self.archetypes[location.archetype as usize];
        let (chunk, local) = split_row(location.row);
        archetype.chunks_mut()[chunk]
            .get_mut::<T>(local)
            .ok_or(EcsError::ComponentMissing {
                entity,
                component: registry::meta(id).name,
            })
    }

    /// Whether `entity` is live and its archetype contains `T`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let id = registry::register::<T>();
        match self.directory.location(entity) {
            Some(location) => self.archetypes[location.archetype as usize]
                .signature()
                .has(id),
            None => false,
        }
    }

    /// Overwrite an existing `T`. Unlike `add_component` this never
    /// migrates: a missing component surfaces [`EcsError::ComponentMissing`].
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        *self.get_component_mut::<T>(entity)? = value;
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    /// Start building a `(with, without)` query.
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    // -- events and the frame boundary --------------------------------------

    /// The event channel for payload type `T`, created on first use with the
    /// default capacity.
    pub fn events<T: Component>(&mut self) -> &mut EventChannel<T> {
        let entry = self
            .channels
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(EventChannel::<T>::new()));
        entry
            .as_any_mut()
            .downcast_mut::<EventChannel<T>>()
            .expect("channel map entry matches its payload type")
    }

    /// The frame boundary for one-frame data: drains every event channel
    /// whose payload type is one-frame and zeroes every one-frame component
    /// column across all archetypes. Archetype membership is preserved;
    /// `has_component` keeps answering true and the value reads as the zero
    /// record. Systems that consume one-frame data must run before this.
    pub fn clear_one_frame(&mut self) {
        self.one_frame_seen =
            registry::collect_one_frame_since(self.one_frame_seen, &mut self.one_frame);

        for channel in self.channels.values_mut() {
            if channel.one_frame() {
                channel.clear_all();
            }
        }

        if self.one_frame.is_empty() {
            return;
        }
        for archetype in &mut self.archetypes {
            archetype.clear_one_frame_columns(&self.one_frame);
        }
    }

    // -- introspection ------------------------------------------------------

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.directory.len()
    }

    /// Number of archetypes ever created (they are never destroyed).
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// All archetypes, in creation order.
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// The archetype with the given id.
    pub fn archetype(&self, id: u32) -> Option<&Archetype> {
        self.archetypes.get(id as usize)
    }

    /// The archetype a live entity belongs to.
    pub fn archetype_of(&self, entity: Entity) -> Option<&Archetype> {
        let location = self.directory.location(entity)?;
        self.archetypes.get(location.archetype as usize)
    }

    /// A live entity's location, or `None` for stale/dead handles.
    pub fn entity_location(&self, entity: Entity) -> Option<EntityLocation> {
        self.directory.location(entity)
    }

    // -- internals ----------------------------------------------------------

    /// Look up or create the archetype for `signature`. Column order of a new
    /// archetype is the signature's ids in ascending order.
    pub(crate) fn ensure_archetype(&mut self, signature: Signature) -> u32 {
        if let Some(&id) = self.archetype_index.get(&signature) {
            return id;
        }
        let id = self.archetypes.len() as u32;
        self.archetypes.push(Archetype::new(id, signature.clone()));
        self.archetype_index.insert(signature, id);
        id
    }

    /// Move `entity` from its current archetype to the one identified by
    /// `target`, copying the column data for every component type present in
    /// both. `new_value` is written into the target row afterwards (the
    /// component being added, if any).
    fn migrate(
        &mut self,
        entity: Entity,
        from: EntityLocation,
        target: Signature,
        new_value: Option<(ComponentId, *const u8)>,
    ) {
        let target_id = self.ensure_archetype(target);
        let source_id = from.archetype;
        debug_assert_ne!(source_id, target_id);

        let (source, dest) = if (source_id as usize) < target_id as usize {
            let (left, right) = self.archetypes.split_at_mut(target_id as usize);
            (&mut left[source_id as usize], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(source_id as usize);
            (&mut right[0], &mut left[target_id as usize])
        };

        let new_row = dest.add_entity(entity);
        let (src_chunk, src_local) = split_row(from.row);
        let (dst_chunk, dst_local) = split_row(new_row);

        // Byte-copy the intersection of the two component sets.
        let shared: smallvec::SmallVec<[ComponentId; 8]> = dest
            .component_types()
            .iter()
            .copied()
            .filter(|&id| source.signature().has(id))
            .collect();
        for id in shared {
            let (source_chunks, dest_chunks) = (source.chunks(), dest.chunks_mut());
            dest_chunks[dst_chunk].copy_component_from(
                &source_chunks[src_chunk],
                id,
                src_local,
                dst_local,
            );
        }

        if let Some((id, value)) = new_value {
            // Safety: `value` points at the component being added, alive for
            // the duration of this call and of the type registered under `id`.
            unsafe { dest.chunks_mut()[dst_chunk].write_from_ptr(id, dst_local, value) };
        }

        let moved = source.remove_entity(from.row);

        if let Some(moved) = moved {
            self.directory.set_row(moved, from.row);
        }
        self.directory.set_location(
            entity,
            EntityLocation {
                archetype: target_id,
                row: new_row,
            },
        );
    }

    /// Drop every archetype, the archetype index, and all cached plans.
    /// Snapshot restore rebuilds them wholesale; the directory is reset
    /// separately. Event channels are untouched.
    pub(crate) fn reset_storage(&mut self) {
        self.archetypes.clear();
        self.archetype_index.clear();
        self.plans.lock().clear();
    }
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}
