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

//! esse_ecs - Chunked archetype Entity Component System
//!
//! Entities are generational 64-bit handles. Components are plain `Copy`
//! records stored per archetype in fixed-capacity (512-row) struct-of-arrays
//! chunks. Structural mutation migrates an entity between archetypes; the
//! cached `(with, without)` query planner hands out chunks whose typed
//! column spans feed tight, allocation-free inner loops.

pub mod archetype;
pub mod blueprint;
pub mod chunk;
pub mod component;
pub mod debug;
pub mod entity;
pub mod error;
pub mod event;
pub mod prelude;
pub mod query;
pub mod registry;
pub mod schedule;
pub mod signature;
pub mod snapshot;
pub mod world;

#[cfg(feature = "parallel")]
pub mod parallel;

// Re-exports for convenience
pub use archetype::Archetype;
pub use blueprint::Blueprint;
pub use chunk::{Chunk, CHUNK_CAPACITY};
pub use component::Component;
pub use debug::{ArchetypeInfo, WorldInspector};
pub use entity::{Entity, EntityLocation};
pub use error::{EcsError, Result};
pub use event::{EventChannel, EVENT_CHANNEL_CAPACITY};
pub use query::{ChunkIter, QueryBuilder};
pub use registry::{ComponentId, TypeMeta};
pub use schedule::{BoxedSystem, Phase, Scheduler, System};
pub use signature::Signature;
pub use world::World;

#[cfg(test)]
mod tests;
