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

//! Blueprints: named component sets instantiated as entities in one batch.
//!
//! A blueprint is a thin batching wrapper over component adds: the target
//! archetype is resolved once from the blueprint's signature, and each
//! instantiated entity gets a single row append plus direct column writes
//! instead of one migration per component.

use crate::archetype::split_row;
use crate::component::Component;
use crate::entity::{Entity, EntityLocation};
use crate::registry::{self, ComponentId};
use crate::signature::Signature;
use crate::world::World;

/// A named list of `(component id, value bytes)`.
pub struct Blueprint {
    name: String,
    parts: Vec<(ComponentId, Vec<u8>)>,
    signature: Signature,
}

impl Blueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Blueprint {
            name: name.into(),
            parts: Vec::new(),
            signature: Signature::empty(),
        }
    }

    /// Add a component value to the blueprint.
    ///
    /// # Panics
    /// Panics if the blueprint already contains `T`; each component type can
    /// appear once.
    pub fn with<T: Component>(mut self, value: T) -> Self {
        let id = registry::register::<T>();
        assert!(
            !self.signature.has(id),
            "duplicate component type {} in blueprint '{}'",
            registry::meta(id).name,
            self.name
        );
        let size = std::mem::size_of::<T>();
        let mut bytes = vec![0u8; size];
        // Safety: T is Copy and `bytes` is exactly `size_of::<T>()` long.
        unsafe {
            std::ptr::copy_nonoverlapping(&value as *const T as *const u8, bytes.as_mut_ptr(), size)
        };
        self.signature = self.signature.with(id);
        self.parts.push((id, bytes));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_count(&self) -> usize {
        self.parts.len()
    }

    /// Create one entity carrying every component in the blueprint.
    pub fn instantiate(&self, world: &mut World) -> Entity {
        let archetype = world.ensure_archetype(self.signature.clone());
        self.spawn_one(world, archetype)
    }

    /// Create `count` entities from this blueprint. The target archetype is
    /// resolved once for the whole batch.
    pub fn instantiate_many(&self, world: &mut World, count: usize) -> Vec<Entity> {
        let archetype = world.ensure_archetype(self.signature.clone());
        (0..count).map(|_| self.spawn_one(world, archetype)).collect()
    }

    fn spawn_one(&self, world: &mut World, archetype_id: u32) -> Entity {
        let entity = world.directory.allocate();
        let archetype = &mut world.archetypes[archetype_id as usize];
        let row = archetype.add_entity(entity);
        let (chunk, local) = split_row(row);
        let chunk = &mut archetype.chunks_mut()[chunk];
        for (id, bytes) in &self.parts {
            chunk.write_bytes(*id, local, bytes);
        }
        world.directory.set_location(
            entity,
            EntityLocation {
                archetype: archetype_id,
                row,
            },
        );
        entity
    }
}
