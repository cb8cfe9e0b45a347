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

//! Process-wide component type registry
//!
//! Every component type used by a world is assigned a dense [`ComponentId`]
//! on first registration. Registration is idempotent and callable from any
//! thread; the first caller wins and later calls return the same id. Ids
//! are never reused.

use std::any::TypeId;
use std::fmt;
use std::sync::OnceLock;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::component::Component;

/// Dense, process-wide component type id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u16);

impl ComponentId {
    /// The id as a bit/array index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        ComponentId(index as u16)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

/// Metadata cached per registered component type.
///
/// `name` is the Rust type path and is what snapshot files store in their
/// type table; loads resolve stored names against the live registry.
#[derive(Clone, Copy, Debug)]
pub struct TypeMeta {
    pub id: ComponentId,
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    pub one_frame: bool,
}

struct RegistryInner {
    by_type: AHashMap<TypeId, ComponentId>,
    by_name: AHashMap<&'static str, ComponentId>,
    metas: Vec<TypeMeta>,
}

fn registry() -> &'static RwLock<RegistryInner> {
    static REGISTRY: OnceLock<RwLock<RegistryInner>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        RwLock::new(RegistryInner {
            by_type: AHashMap::new(),
            by_name: AHashMap::new(),
            metas: Vec::new(),
        })
    })
}

/// Register `T`, returning its dense id.
///
/// Idempotent and thread-safe: concurrent registrations of the same type
/// race to the write lock and the loser observes the winner's id.
pub fn register<T: Component>() -> ComponentId {
    let key = TypeId::of::<T>();
    if let Some(&id) = registry().read().by_type.get(&key) {
        return id;
    }

    let mut inner = registry().write();
    // Re-check under the write lock; another thread may have won the race.
    if let Some(&id) = inner.by_type.get(&key) {
        return id;
    }

    assert!(
        inner.metas.len() <= u16::MAX as usize,
        "component type id space exhausted"
    );
    let id = ComponentId::from_index(inner.metas.len());
    let meta = TypeMeta {
        id,
        name: std::any::type_name::<T>(),
        size: std::mem::size_of::<T>(),
        align: std::mem::align_of::<T>(),
        one_frame: T::ONE_FRAME,
    };
    inner.metas.push(meta);
    inner.by_type.insert(key, id);
    inner.by_name.entry(meta.name).or_insert(id);
    id
}

/// Metadata for a registered id.
///
/// # Panics
/// Panics if `id` was never handed out by [`register`].
pub fn meta(id: ComponentId) -> TypeMeta {
    registry().read().metas[id.index()]
}

/// Whether the type behind `id` is tagged one-frame.
pub fn is_one_frame(id: ComponentId) -> bool {
    meta(id).one_frame
}

/// Resolve a registered type by its name (snapshot restore path).
pub fn lookup_name(name: &str) -> Option<ComponentId> {
    registry().read().by_name.get(name).copied()
}

/// Number of registered component types.
pub fn type_count() -> usize {
    registry().read().metas.len()
}

/// Append the one-frame ids registered at or after index `from` to `out`,
/// returning the registry length scanned up to. Worlds use this to keep a
/// cached one-frame list without re-walking the whole registry each frame.
pub(crate) fn collect_one_frame_since(from: usize, out: &mut Vec<ComponentId>) -> usize {
    let inner = registry().read();
    for meta in &inner.metas[from..] {
        if meta.one_frame {
            out.push(meta.id);
        }
    }
    inner.metas.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug)]
    struct Pos {
        _x: f32,
        _y: f32,
    }
    impl Component for Pos {}

    #[derive(Clone, Copy, Debug)]
    struct Intent {
        _dx: f32,
    }
    impl Component for Intent {
        const ONE_FRAME: bool = true;
    }

    #[test]
    fn registration_is_idempotent() {
        let a = register::<Pos>();
        let b = register::<Pos>();
        assert_eq!(a, b);
    }

    #[test]
    fn meta_matches_type() {
        let id = register::<Pos>();
        let meta = meta(id);
        assert_eq!(meta.size, std::mem::size_of::<Pos>());
        assert_eq!(meta.align, std::mem::align_of::<Pos>());
        assert!(!meta.one_frame);
    }

    #[test]
    fn one_frame_flag_recorded() {
        let id = register::<Intent>();
        assert!(is_one_frame(id));
    }

    #[test]
    fn name_lookup_roundtrips() {
        let id = register::<Pos>();
        assert_eq!(lookup_name(meta(id).name), Some(id));
        assert_eq!(lookup_name("no::such::Type"), None);
    }

    #[test]
    fn concurrent_registration_agrees() {
        #[derive(Clone, Copy)]
        struct Raced(u64);
        impl Component for Raced {}

        let ids: Vec<ComponentId> = std::thread::scope(|s| {
            (0..8)
                .map(|_| s.spawn(|| register::<Raced>()))
                .collect::<Vec<_>>()
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect()
        });
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
