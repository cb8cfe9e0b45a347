//! Frame scheduling
//!
//! Systems run against the world in a deterministic order defined by their
//! `(phase, order)` metadata; ties break by insertion order. The scheduler
//! holds exclusive world access for the whole frame and calls
//! `World::clear_one_frame` at the end of it, which is the single boundary
//! at which one-frame data disappears.

use crate::error::Result;
use crate::world::World;

/// Canonical frame phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    PreUpdate,
    Update,
    PostUpdate,
    Presentation,
}

/// A unit of game logic driven once per frame.
pub trait System: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&mut self, world: &mut World) -> Result<()>;
}

/// Boxed system
pub type BoxedSystem = Box<dyn System>;

struct FnSystem<F> {
    name: &'static str,
    run: F,
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut World) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self, world: &mut World) -> Result<()> {
        (self.run)(world)
    }
}

struct Entry {
    system: BoxedSystem,
    phase: Phase,
    order: i32,
    sequence: usize,
}

/// Orders systems by `(phase, order)` and drives them through frames.
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
    sorted: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system with its ordering metadata.
    pub fn add_system(&mut self, system: impl System + 'static, phase: Phase, order: i32) {
        let sequence = self.entries.len();
        self.entries.push(Entry {
            system: Box::new(system),
            phase,
            order,
            sequence,
        });
        self.sorted = false;
    }

    /// Add a closure as a system.
    pub fn add_fn(
        &mut self,
        name: &'static str,
        phase: Phase,
        order: i32,
        run: impl FnMut(&mut World) -> Result<()> + Send + Sync + 'static,
    ) {
        self.add_system(FnSystem { name, run }, phase, order);
    }

    pub fn system_count(&self) -> usize {
        self.entries.len()
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.entries
                .sort_by_key(|entry| (entry.phase, entry.order, entry.sequence));
            self.sorted = true;
        }
    }

    /// Run one frame: every system in order, then the one-frame boundary.
    /// A failing system aborts the frame before the boundary and surfaces
    /// its error.
    pub fn run_frame(&mut self, world: &mut World) -> Result<()> {
        self.ensure_sorted();
        for entry in &mut self.entries {
            entry.system.run(world)?;
        }
        world.clear_one_frame();
        Ok(())
    }

    /// Run only the systems of one phase. Does not touch the one-frame
    /// boundary; hosts driving phases manually call `clear_one_frame`
    /// themselves at the end of the frame.
    pub fn run_phase(&mut self, world: &mut World, phase: Phase) -> Result<()> {
        self.ensure_sorted();
        for entry in &mut self.entries {
            if entry.phase == phase {
                entry.system.run(world)?;
            }
        }
        Ok(())
    }

    /// System names in execution order (diagnostics).
    pub fn execution_order(&mut self) -> Vec<&'static str> {
        self.ensure_sorted();
        self.entries
            .iter()
            .map(|entry| entry.system.name())
            .collect()
    }
}
