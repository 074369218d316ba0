//! Deterministic test harness for the Canopy runtime.
//!
//! In-memory implementations of the Surface and Environment traits, the
//! component fixtures tests share, and a reference model for property-based
//! testing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod memory_surface;
pub mod model;
pub mod sim_env;

pub use memory_surface::MemorySurface;
pub use model::{
    ModelWorld, ObservableState, Operation, OperationError, OperationResult, Slot, ThemeAction,
    Widget,
};
pub use sim_env::SimEnv;
