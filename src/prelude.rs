//! Convenient re-exports of commonly used types.
//!
//! ```ignore
//! use esse_ecs::prelude::*;
//! ```

pub use crate::blueprint::Blueprint;
pub use crate::chunk::{Chunk, CHUNK_CAPACITY};
pub use crate::component::Component;
pub use crate::debug::WorldInspector;
pub use crate::entity::Entity;
pub use crate::error::{EcsError, Result};
pub use crate::event::EventChannel;
pub use crate::query::QueryBuilder;
pub use crate::registry::ComponentId;
pub use crate::schedule::{Phase, Scheduler, System};
pub use crate::world::World;
