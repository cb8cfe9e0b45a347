//! Read-only parallel chunk visitation (feature `parallel`).
//!
//! The core promises exactly one kind of parallelism: concurrent reads.
//! `par_chunks` fans the matching archetypes out over rayon's pool; the
//! closure only ever sees shared chunk references, and the `&World` borrow
//! held by the query keeps every structural mutation out for the duration.

use rayon::prelude::*;

use crate::chunk::Chunk;
use crate::query::QueryBuilder;

impl<'w> QueryBuilder<'w> {
    /// Visit every non-empty matching chunk from rayon's thread pool.
    /// Parallelism is per archetype; chunks within one archetype are visited
    /// in order.
    pub fn par_chunks<F>(self, visit: F)
    where
        F: Fn(&Chunk) + Send + Sync,
    {
        let world = self.world;
        let plan = self.plan();
        plan.matches.par_iter().for_each(|&archetype_id| {
            let archetype = &world.archetypes[archetype_id as usize];
            for chunk in archetype.chunks() {
                if chunk.count() > 0 {
                    visit(chunk);
                }
            }
        });
    }
}
