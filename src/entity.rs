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

//! Entity handles and the live-entity directory.
//!
//! An [`Entity`] packs `{id: u32, generation: u32}` into 64 bits. Id 0 is
//! the null handle. The generation increments every time an id is recycled,
//! so a stale handle fails every lookup fast.

use std::fmt;

/// Generational entity handle.
///
/// Layout: `[generation: u32 | id: u32]`. Two handles are equal iff both
/// fields match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(u64);

impl Entity {
    /// The reserved null handle (id 0).
    pub const NULL: Entity = Entity(0);

    #[inline]
    pub(crate) fn new(id: u32, generation: u32) -> Self {
        debug_assert!(id != 0, "entity id 0 is reserved for the null handle");
        Entity((generation as u64) << 32 | id as u64)
    }

    /// The id portion (low 32 bits).
    #[inline]
    pub fn id(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Whether this is the null handle.
    #[inline]
    pub fn is_null(self) -> bool {
        self.id() == 0
    }

    /// Raw 64-bit representation (snapshot wire form).
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Reconstruct from the raw representation.
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Entity(bits)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.id(), self.generation())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id(), self.generation())
    }
}

/// Where a live entity's data lives: archetype id plus a global row within
/// that archetype (`chunk = row / 512`, `local = row % 512`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype: u32,
    pub row: u32,
}

/// Marks a directory slot whose entity is dead.
pub(crate) const NIL_ROW: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    archetype: u32,
    row: u32,
}

/// Maps each live entity id to its location and holds its generation.
///
/// Slots are indexed by `id - 1`. Reclaimable ids sit on a LIFO freelist so
/// id assignment is deterministic: most recently freed first, else the next
/// monotonic id.
#[derive(Debug, Default)]
pub(crate) struct EntityDirectory {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle. The caller must follow up with `set_location`
    /// before the entity is observable as alive.
    pub fn allocate(&mut self) -> Entity {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            let slot = &self.slots[(id - 1) as usize];
            debug_assert_eq!(slot.row, NIL_ROW);
            Entity::new(id, slot.generation)
        } else {
            assert!(
                self.slots.len() < u32::MAX as usize,
                "entity id space exhausted"
            );
            let id = self.slots.len() as u32 + 1;
            self.slots.push(Slot {
                generation: 0,
                archetype: 0,
                row: NIL_ROW,
            });
            Entity::new(id, 0)
        }
    }

    /// Free a live entity: bump its generation, null its row, recycle the
    /// id. Returns false for stale or dead handles.
    pub fn free(&mut self, entity: Entity) -> bool {
        let Some(index) = self.live_index(entity) else {
            return false;
        };
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.row = NIL_ROW;
        self.free.push(entity.id());
        self.live -= 1;
        true
    }

    /// The location of a live entity, or `None` for stale/dead handles.
    #[inline]
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        let index = self.live_index(entity)?;
        let slot = &self.slots[index];
        Some(EntityLocation {
            archetype: slot.archetype,
            row: slot.row,
        })
    }

    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        if let Some(index) = self.slot_index(entity) {
            let slot = &mut self.slots[index];
            slot.archetype = location.archetype;
            slot.row = location.row;
        }
    }

    /// Fix up the row of an entity moved by a swap-remove.
    pub fn set_row(&mut self, entity: Entity, row: u32) {
        if let Some(index) = self.live_index(entity) {
            self.slots[index].row = row;
        }
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.live_index(entity).is_some()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Index into `slots` when the handle's generation matches, whether or
    /// not the slot is live.
    fn slot_index(&self, entity: Entity) -> Option<usize> {
        let index = (entity.id() as usize).checked_sub(1)?;
        let slot = self.slots.get(index)?;
        (slot.generation == entity.generation()).then_some(index)
    }

    fn live_index(&self, entity: Entity) -> Option<usize> {
        let index = self.slot_index(entity)?;
        (self.slots[index].row != NIL_ROW).then_some(index)
    }

    // -- snapshot restore support -------------------------------------------

    /// Reset to `slot_count` dead slots with generation 0 and an empty
    /// freelist.
    pub(crate) fn reset_with_capacity(&mut self, slot_count: usize) {
        self.slots.clear();
        self.slots.resize(
            slot_count,
            Slot {
                generation: 0,
                archetype: 0,
                row: NIL_ROW,
            },
        );
        self.free.clear();
        self.live = 0;
    }

    /// Install a restored entity at its exact id and generation.
    pub(crate) fn install(&mut self, entity: Entity, location: EntityLocation) {
        let index = (entity.id() - 1) as usize;
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.row, NIL_ROW, "restored entity id installed twice");
        slot.generation = entity.generation();
        slot.archetype = location.archetype;
        slot.row = location.row;
        self.live += 1;
    }

    /// Push every dead slot's id onto the freelist, ascending.
    pub(crate) fn finish_restore(&mut self) {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.row == NIL_ROW {
                self.free.push(index as u32 + 1);
            }
        }
    }
}
