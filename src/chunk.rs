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

//! Fixed-capacity struct-of-arrays chunks.
//!
//! A [`Chunk`] owns one contiguous, type-erased column per component type of
//! its parent archetype, each allocated at full capacity up front, plus a
//! parallel entity array and a live-row count. Rows `[0, count)` are live;
//! the rest of each column is unspecified. Removal swaps the last row into
//! the hole, so live rows stay densely packed.
//!
//! # Safety
//!
//! Columns store raw bytes; every access goes through the per-chunk
//! `ComponentId -> column` map, and the `Component` bound (`Copy + 'static`)
//! guarantees the stored bytes are plain data with no destructor. Typed
//! views check the element size in debug builds.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use rustc_hash::FxHashMap;

use crate::component::Component;
use crate::entity::Entity;
use crate::registry::{self, ComponentId, TypeMeta};

/// Rows per chunk.
pub const CHUNK_CAPACITY: usize = 512;

/// One type-erased column: `CHUNK_CAPACITY` slots of `size` bytes at
/// alignment `align`.
struct Column {
    data: NonNull<u8>,
    size: usize,
    align: usize,
}

// Safety: a column is plain bytes of `Component` values, and `Component`
// requires `Send + Sync`. The raw pointer carries no thread affinity.
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    fn new(meta: &TypeMeta) -> Self {
        if meta.size == 0 {
            // ZST column: a dangling, aligned pointer and no allocation.
            let dangling = meta.align as *mut u8;
            return Column {
                data: NonNull::new(dangling).unwrap_or(NonNull::dangling()),
                size: 0,
                align: meta.align,
            };
        }
        let layout = Layout::from_size_align(meta.size * CHUNK_CAPACITY, meta.align)
            .expect("column layout overflow");
        // Zeroed so rows never expose garbage before their first write.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let data = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        Column {
            data,
            size: meta.size,
            align: meta.align,
        }
    }

    #[inline]
    fn ptr_at(&self, row: usize) -> *mut u8 {
        debug_assert!(row < CHUNK_CAPACITY);
        if self.size == 0 {
            self.data.as_ptr()
        } else {
            unsafe { self.data.as_ptr().add(row * self.size) }
        }
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if self.size == 0 {
            return;
        }
        let layout = Layout::from_size_align(self.size * CHUNK_CAPACITY, self.align)
            .expect("column layout was valid at construction");
        unsafe { alloc::dealloc(self.data.as_ptr(), layout) };
    }
}

/// A fixed-capacity struct-of-arrays block within an archetype.
pub struct Chunk {
    entities: Vec<Entity>,
    columns: Vec<Column>,
    /// O(1) component id -> column index.
    index: FxHashMap<ComponentId, usize>,
}

impl Chunk {
    pub(crate) fn new(metas: &[TypeMeta]) -> Self {
        let columns = metas.iter().map(Column::new).collect();
        let mut index = FxHashMap::default();
        for (i, meta) in metas.iter().enumerate() {
            index.insert(meta.id, i);
        }
        Chunk {
            entities: Vec::with_capacity(CHUNK_CAPACITY),
            columns,
            index,
        }
    }

    /// Number of live rows.
    #[inline]
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    /// Always [`CHUNK_CAPACITY`].
    #[inline]
    pub fn capacity(&self) -> usize {
        CHUNK_CAPACITY
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entities.len() == CHUNK_CAPACITY
    }

    /// The entity occupying `row`.
    ///
    /// # Panics
    /// Panics if `row >= count()`.
    #[inline]
    pub fn entity(&self, row: usize) -> Entity {
        self.entities[row]
    }

    /// The live entity handles, in row order.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Whether this chunk stores a column for `id`.
    pub fn has_column(&self, id: ComponentId) -> bool {
        self.index.contains_key(&id)
    }

    /// Typed view of the live rows of `T`'s column, or `None` if the parent
    /// archetype does not store `T`.
    pub fn column<T: Component>(&self) -> Option<&[T]> {
        let &col = self.index.get(&registry::register::<T>())?;
        let column = &self.columns[col];
        debug_assert_eq!(column.size, std::mem::size_of::<T>());
        // Safety: the column was created from T's TypeMeta, so the pointer is
        // aligned for T and holds `count` initialized (or zeroed) values.
        Some(unsafe {
            std::slice::from_raw_parts(column.ptr_at(0) as *const T, self.count())
        })
    }

    /// Mutable typed view of the live rows of `T`'s column.
    pub fn column_mut<T: Component>(&mut self) -> Option<&mut [T]> {
        let &col = self.index.get(&registry::register::<T>())?;
        let count = self.count();
        let column = &mut self.columns[col];
        debug_assert_eq!(column.size, std::mem::size_of::<T>());
        // Safety: as in `column`, plus `&mut self` guarantees exclusivity.
        Some(unsafe { std::slice::from_raw_parts_mut(column.ptr_at(0) as *mut T, count) })
    }

    /// Live bytes of the column for `id` (`count * size`), for migration and
    /// snapshot encoding.
    pub fn column_raw(&self, id: ComponentId) -> Option<&[u8]> {
        let &col = self.index.get(&id)?;
        let column = &self.columns[col];
        // Safety: rows [0, count) are initialized or zeroed by construction.
        Some(unsafe {
            std::slice::from_raw_parts(column.ptr_at(0), self.count() * column.size)
        })
    }

    /// One row of `T`.
    pub fn get<T: Component>(&self, row: usize) -> Option<&T> {
        self.column::<T>()?.get(row)
    }

    /// One mutable row of `T`.
    pub fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        self.column_mut::<T>()?.get_mut(row)
    }

    /// The bytes of a single row of `id`'s column.
    pub(crate) fn component_bytes(&self, id: ComponentId, row: usize) -> Option<&[u8]> {
        debug_assert!(row < self.count());
        let &col = self.index.get(&id)?;
        let column = &self.columns[col];
        // Safety: row is live, so its bytes are initialized (or zeroed).
        Some(unsafe { std::slice::from_raw_parts(column.ptr_at(row), column.size) })
    }

    /// Overwrite a single row of `id`'s column from `bytes`.
    ///
    /// # Panics
    /// Panics if `bytes` does not match the column's element size.
    pub(crate) fn write_bytes(&mut self, id: ComponentId, row: usize, bytes: &[u8]) {
        debug_assert!(row < self.count());
        let Some(&col) = self.index.get(&id) else {
            return;
        };
        let column = &mut self.columns[col];
        assert_eq!(bytes.len(), column.size, "component byte size mismatch");
        if column.size == 0 {
            return;
        }
        // Safety: destination is a live row slot sized `column.size`.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), column.ptr_at(row), column.size) };
    }

    /// Overwrite a single row of `id`'s column from a raw component value.
    ///
    /// # Safety
    /// `src` must point to a valid value of the type registered under `id`.
    pub(crate) unsafe fn write_from_ptr(&mut self, id: ComponentId, row: usize, src: *const u8) {
        debug_assert!(row < self.count());
        let Some(&col) = self.index.get(&id) else {
            return;
        };
        let column = &mut self.columns[col];
        if column.size > 0 {
            ptr::copy_nonoverlapping(src, column.ptr_at(row), column.size);
        }
    }

    /// Copy the row `src_row` of `src`'s column for `id` into this chunk's
    /// `dst_row`. Used by migration for the columns both archetypes share.
    pub(crate) fn copy_component_from(
        &mut self,
        src: &Chunk,
        id: ComponentId,
        src_row: usize,
        dst_row: usize,
    ) {
        let (Some(&si), Some(&di)) = (src.index.get(&id), self.index.get(&id)) else {
            return;
        };
        let from = &src.columns[si];
        let to = &self.columns[di];
        debug_assert_eq!(from.size, to.size);
        if from.size == 0 {
            return;
        }
        // Safety: both rows are live slots of columns with identical layout;
        // src and self are distinct chunks, so the ranges cannot overlap.
        unsafe { ptr::copy_nonoverlapping(from.ptr_at(src_row), to.ptr_at(dst_row), from.size) };
    }

    /// Move row `src_row` of `src` (same archetype schema) into `dst_row`
    /// here, entity handle included. The source row's bookkeeping is left to
    /// the caller (`pop_row`).
    pub(crate) fn move_row_from(&mut self, src: &mut Chunk, src_row: usize, dst_row: usize) {
        debug_assert_eq!(self.columns.len(), src.columns.len());
        debug_assert!(dst_row < self.count() && src_row < src.count());
        for (to, from) in self.columns.iter().zip(&src.columns) {
            debug_assert_eq!(to.size, from.size);
            if from.size == 0 {
                continue;
            }
            // Safety: identical schema, live rows, distinct chunks.
            unsafe {
                ptr::copy_nonoverlapping(from.ptr_at(src_row), to.ptr_at(dst_row), from.size)
            };
        }
        self.entities[dst_row] = src.entities[src_row];
    }

    /// Append an entity, returning its local row. The caller is responsible
    /// for never pushing into a full chunk (archetypes append a fresh chunk
    /// instead).
    pub(crate) fn push(&mut self, entity: Entity) -> usize {
        debug_assert!(!self.is_full(), "chunk overflow");
        let row = self.entities.len();
        self.entities.push(entity);
        row
    }

    /// Swap-remove `row` within this chunk: if it is not the last live row,
    /// the last row's data moves into it for every column and the entity
    /// array. Returns the moved entity so the directory can be fixed up.
    pub(crate) fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        let last = self.entities.len() - 1;
        self.entities.swap_remove(row);
        if row == last {
            return None;
        }
        for column in &mut self.columns {
            if column.size == 0 {
                continue;
            }
            // Safety: row != last, both were live, ranges are disjoint.
            unsafe {
                ptr::copy_nonoverlapping(column.ptr_at(last), column.ptr_at(row), column.size)
            };
        }
        Some(self.entities[row])
    }

    /// Drop the last live row's bookkeeping (its column bytes become
    /// unspecified). Pairs with `move_row_from` for cross-chunk moves.
    pub(crate) fn pop_row(&mut self) {
        self.entities.pop();
    }

    /// Zero the live rows of `id`'s column (one-frame clearing).
    pub(crate) fn zero_column(&mut self, id: ComponentId) {
        let Some(&col) = self.index.get(&id) else {
            return;
        };
        let column = &mut self.columns[col];
        if column.size == 0 || self.entities.is_empty() {
            return;
        }
        // Safety: zeroing live rows of a Copy column; all-zero is the
        // documented cleared value for one-frame components.
        unsafe { ptr::write_bytes(column.ptr_at(0), 0, self.entities.len() * column.size) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }
    impl Component for Pos {}

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Tag;
    impl Component for Tag {}

    fn chunk_for<T: Component>() -> (Chunk, ComponentId) {
        let id = registry::register::<T>();
        (Chunk::new(&[registry::meta(id)]), id)
    }

    fn entity(id: u32) -> Entity {
        Entity::new(id, 0)
    }

    #[test]
    fn push_and_typed_access() {
        let (mut chunk, _) = chunk_for::<Pos>();
        let row = chunk.push(entity(1));
        chunk.write_bytes(
            registry::register::<Pos>(),
            row,
            &{
                let v = Pos { x: 1.0, y: 2.0 };
                let mut b = [0u8; std::mem::size_of::<Pos>()];
                unsafe {
                    ptr::copy_nonoverlapping(
                        &v as *const Pos as *const u8,
                        b.as_mut_ptr(),
                        b.len(),
                    )
                };
                b
            },
        );
        assert_eq!(chunk.count(), 1);
        assert_eq!(chunk.get::<Pos>(0), Some(&Pos { x: 1.0, y: 2.0 }));
        assert_eq!(chunk.column::<Pos>().unwrap().len(), 1);
    }

    #[test]
    fn swap_remove_moves_last_row() {
        let (mut chunk, _) = chunk_for::<Pos>();
        for i in 0..3 {
            let row = chunk.push(entity(i + 1));
            chunk.column_mut::<Pos>().unwrap()[row] = Pos {
                x: i as f32,
                y: 0.0,
            };
        }

        let moved = chunk.swap_remove(0);
        assert_eq!(moved, Some(entity(3)));
        assert_eq!(chunk.count(), 2);
        assert_eq!(chunk.get::<Pos>(0), Some(&Pos { x: 2.0, y: 0.0 }));
        assert_eq!(chunk.entity(0), entity(3));

        // Removing the last row moves nothing.
        assert_eq!(chunk.swap_remove(1), None);
        assert_eq!(chunk.count(), 1);
    }

    #[test]
    fn zst_columns_store_no_bytes() {
        let (mut chunk, id) = chunk_for::<Tag>();
        chunk.push(entity(1));
        chunk.push(entity(2));
        assert_eq!(chunk.column::<Tag>().unwrap().len(), 2);
        assert_eq!(chunk.column_raw(id).unwrap().len(), 0);
    }

    #[test]
    fn zero_column_clears_live_rows() {
        let (mut chunk, id) = chunk_for::<Pos>();
        let row = chunk.push(entity(1));
        chunk.column_mut::<Pos>().unwrap()[row] = Pos { x: 5.0, y: 6.0 };
        chunk.zero_column(id);
        assert_eq!(chunk.get::<Pos>(0), Some(&Pos { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn missing_column_is_none() {
        let (chunk, _) = chunk_for::<Pos>();
        assert!(chunk.column::<Tag>().is_none());
    }
}
