//! Environment abstraction.
//!
//! The engine never reads the clock directly. Event timestamps come from an
//! [`Environment`] supplied by the caller, so tests and simulations can run
//! on virtual time with the same code that runs in production.

use std::time::Instant;

/// Source of monotonic time.
pub trait Environment {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// Environment backed by the system monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
