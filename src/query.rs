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

//! Query planning and chunk iteration.
//!
//! A query is a `(with, without)` predicate over archetype signatures. An
//! archetype matches when its signature is a superset of `with` and disjoint
//! from `without`. Compiled plans are cached in the world keyed by the
//! signature pair; when the world has grown, only the archetypes added since
//! the plan was last touched are tested (never a full rescan).
//!
//! Iteration yields chunks, not entities: consumers take typed column spans
//! per chunk and run their inner loops over them. The iterator itself is two
//! indices plus borrowed references and performs no allocation.

use crate::archetype::Archetype;
use crate::chunk::Chunk;
use crate::component::Component;
use crate::entity::Entity;
use crate::registry;
use crate::signature::Signature;
use crate::world::World;

pub(crate) type PlanKey = (Signature, Signature);

/// Cached list of archetypes matching one `(with, without)` pair.
pub(crate) struct CachedPlan {
    with: Signature,
    without: Signature,
    pub(crate) matches: Vec<u32>,
    pub(crate) seen_archetypes: usize,
}

impl CachedPlan {
    pub(crate) fn new(with: Signature, without: Signature) -> Self {
        CachedPlan {
            with,
            without,
            matches: Vec::new(),
            seen_archetypes: 0,
        }
    }

    fn matches_archetype(&self, archetype: &Archetype) -> bool {
        archetype.signature().is_superset_of(&self.with)
            && !archetype.signature().has_intersection(&self.without)
    }

    /// Test only the archetypes created since the last update.
    pub(crate) fn update(&mut self, archetypes: &[Archetype]) {
        if archetypes.len() <= self.seen_archetypes {
            return;
        }
        for archetype in &archetypes[self.seen_archetypes..] {
            if self.matches_archetype(archetype) {
                self.matches.push(archetype.id());
            }
        }
        self.seen_archetypes = archetypes.len();
    }
}

/// Builder for a `(with, without)` query over a world.
///
/// ```ignore
/// for chunk in world.query().with::<Position>().without::<Frozen>().chunks() {
///     let positions = chunk.column::<Position>().unwrap();
///     for pos in positions {
///         // ...
///     }
/// }
/// ```
pub struct QueryBuilder<'w> {
    pub(crate) world: &'w World,
    pub(crate) with: Signature,
    pub(crate) without: Signature,
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        QueryBuilder {
            world,
            with: Signature::empty(),
            without: Signature::empty(),
        }
    }

    /// Require `T` to be present.
    pub fn with<T: Component>(mut self) -> Self {
        self.with = self.with.with(registry::register::<T>());
        self
    }

    /// Require `T` to be absent.
    pub fn without<T: Component>(mut self) -> Self {
        self.without = self.without.with(registry::register::<T>());
        self
    }

    /// Resolve (and cache) the plan for this query.
    pub(crate) fn plan(&self) -> &'w CachedPlan {
        let world = self.world;
        let mut plans = world.plans.lock();
        let key = (self.with.clone(), self.without.clone());

        if let Some(plan) = plans.get(&key) {
            if plan.seen_archetypes == world.archetypes.len() {
                let plan: *const CachedPlan = &**plan;
                drop(plans);
                // Safety: plans are boxed and never removed for the world's
                // lifetime, so the pointee is stable. The plan is fresh, and
                // it can only become stale again through archetype creation,
                // which needs `&mut World` and therefore cannot overlap the
                // `&'w World` borrow this reference is tied to.
                return unsafe { &*plan };
            }
        }

        // Missing or stale. A stale plan implies archetypes were added since
        // it was last updated, which required `&mut World`; no shared
        // references into the plan can exist at that point, so taking `&mut`
        // here cannot alias an outstanding iterator.
        let plan = plans
            .entry(key)
            .or_insert_with(|| Box::new(CachedPlan::new(self.with.clone(), self.without.clone())));
        plan.update(&world.archetypes);
        let plan: *const CachedPlan = &**plan;
        drop(plans);
        // Safety: as above.
        unsafe { &*plan }
    }

    /// Lazy iterator over the non-empty chunks of matching archetypes, in
    /// archetype-creation order then chunk order.
    pub fn chunks(self) -> ChunkIter<'w> {
        let plan = self.plan();
        ChunkIter {
            world: self.world,
            plan,
            archetype_cursor: 0,
            chunk_cursor: 0,
        }
    }

    /// Total number of matching rows.
    pub fn count(self) -> usize {
        let world = self.world;
        self.plan()
            .matches
            .iter()
            .map(|&id| world.archetypes[id as usize].len())
            .sum()
    }

    /// Whether any row matches.
    pub fn any(self) -> bool {
        let world = self.world;
        self.plan()
            .matches
            .iter()
            .any(|&id| !world.archetypes[id as usize].is_empty())
    }

    /// The first matching entity in iteration order, if any.
    pub fn first_entity(self) -> Option<Entity> {
        let world = self.world;
        for &id in &self.plan().matches {
            for chunk in world.archetypes[id as usize].chunks() {
                if chunk.count() > 0 {
                    return Some(chunk.entity(0));
                }
            }
        }
        None
    }
}

/// Iterator over the non-empty chunks matched by a query.
///
/// State is two cursors plus borrowed references; `next` never allocates.
pub struct ChunkIter<'w> {
    world: &'w World,
    plan: &'w CachedPlan,
    archetype_cursor: usize,
    chunk_cursor: usize,
}

impl<'w> Iterator for ChunkIter<'w> {
    type Item = &'w Chunk;

    fn next(&mut self) -> Option<&'w Chunk> {
        loop {
            let &archetype_id = self.plan.matches.get(self.archetype_cursor)?;
            let archetype = &self.world.archetypes[archetype_id as usize];
            while self.chunk_cursor < archetype.chunks().len() {
                let chunk = &archetype.chunks()[self.chunk_cursor];
                self.chunk_cursor += 1;
                if chunk.count() > 0 {
                    return Some(chunk);
                }
            }
            self.archetype_cursor += 1;
            self.chunk_cursor = 0;
        }
    }
}
