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

//! Archetype storage: a signature plus an ordered list of chunks.
//!
//! An archetype owns the rows of every entity that shares its exact
//! component set. Rows are addressed globally: `chunk = row / 512`,
//! `local = row % 512`. Live rows are exactly `[0, len)`, so every chunk
//! except the last live one is full; removal moves the globally-last row
//! into the hole. Empty tail chunks are kept and must be tolerated by
//! iteration.

use smallvec::SmallVec;

use crate::chunk::{Chunk, CHUNK_CAPACITY};
use crate::entity::Entity;
use crate::registry::{self, ComponentId, TypeMeta};
use crate::signature::Signature;

/// Split a global row into `(chunk_index, local_row)`.
#[inline]
pub(crate) fn split_row(row: u32) -> (usize, usize) {
    let row = row as usize;
    (row / CHUNK_CAPACITY, row % CHUNK_CAPACITY)
}

/// All entities sharing one exact component set, and their storage.
pub struct Archetype {
    id: u32,
    signature: Signature,
    /// Component ids in ascending order; the column order of every chunk.
    types: SmallVec<[ComponentId; 8]>,
    metas: SmallVec<[TypeMeta; 8]>,
    chunks: Vec<Chunk>,
    len: usize,
    /// Index of the first chunk that may have room.
    cursor: usize,
}

impl Archetype {
    pub(crate) fn new(id: u32, signature: Signature) -> Self {
        let types: SmallVec<[ComponentId; 8]> = signature.ones().collect();
        let metas = types.iter().map(|&id| registry::meta(id)).collect();
        Archetype {
            id,
            signature,
            types,
            metas,
            chunks: Vec::new(),
            len: 0,
            cursor: 0,
        }
    }

    /// Stable id, assigned in creation order. Id 0 is the empty archetype.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Component ids in column order (ascending).
    #[inline]
    pub fn component_types(&self) -> &[ComponentId] {
        &self.types
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunks in append order. Tail chunks may be empty after deletions.
    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub(crate) fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    #[inline]
    pub fn has_component(&self, id: ComponentId) -> bool {
        self.signature.has(id)
    }

    /// The entity at a global row.
    pub fn entity_at(&self, row: u32) -> Entity {
        let (chunk, local) = split_row(row);
        self.chunks[chunk].entity(local)
    }

    /// Append a row for `entity`, filling the first non-full chunk or
    /// allocating a new one. This is the only steady-state allocation path;
    /// it amortizes against `CHUNK_CAPACITY` inserts.
    pub(crate) fn add_entity(&mut self, entity: Entity) -> u32 {
        while self.cursor < self.chunks.len() && self.chunks[self.cursor].is_full() {
            self.cursor += 1;
        }
        if self.cursor == self.chunks.len() {
            self.chunks.push(Chunk::new(&self.metas));
        }
        let local = self.chunks[self.cursor].push(entity);
        self.len += 1;
        (self.cursor * CHUNK_CAPACITY + local) as u32
    }

    /// Remove the entity at global `row`, keeping live rows densely packed:
    /// the globally-last row moves into the hole (a plain within-chunk
    /// swap-remove when both share a chunk, a cross-chunk move otherwise).
    /// Returns the moved entity so the caller can fix its directory row.
    pub(crate) fn remove_entity(&mut self, row: u32) -> Option<Entity> {
        let row = row as usize;
        debug_assert!(row < self.len);
        let last = self.len - 1;
        let (chunk, local) = (row / CHUNK_CAPACITY, row % CHUNK_CAPACITY);
        let (last_chunk, last_local) = (last / CHUNK_CAPACITY, last % CHUNK_CAPACITY);

        let moved = if chunk == last_chunk {
            self.chunks[chunk].swap_remove(local)
        } else {
            let (head, tail) = self.chunks.split_at_mut(last_chunk);
            let dst = &mut head[chunk];
            let src = &mut tail[0];
            let moved = src.entity(last_local);
            dst.move_row_from(src, last_local, local);
            src.pop_row();
            Some(moved)
        };

        self.len -= 1;
        let open = self.len / CHUNK_CAPACITY;
        if open < self.cursor {
            self.cursor = open;
        }
        moved
    }

    /// Zero the live rows of every listed column present in this archetype.
    pub(crate) fn clear_one_frame_columns(&mut self, ids: &[ComponentId]) {
        for &id in ids {
            if !self.signature.has(id) {
                continue;
            }
            for chunk in &mut self.chunks {
                chunk.zero_column(id);
            }
        }
    }
}
