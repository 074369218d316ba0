//! Virtual clock.

use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

use canopy_core::Environment;

/// Environment whose time only moves when told to.
///
/// Clones share the clock, so a test can hold one handle while the runtime
/// holds another.
#[derive(Debug, Clone)]
pub struct SimEnv {
    base: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Clock starting at zero elapsed time.
    pub fn new() -> Self {
        Self { base: Instant::now(), elapsed: Rc::new(Cell::new(Duration::ZERO)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    /// Time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        self.base + self.elapsed.get()
    }
}
