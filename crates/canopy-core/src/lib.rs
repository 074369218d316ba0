//! Canopy reconciliation engine
//!
//! Turns component descriptor trees into an ordered stream of surface
//! patches, and keeps the instance tree, global store and event bus
//! consistent while doing so.
//!
//! # Architecture
//!
//! The engine never touches a native UI tree. Rendering produces plain
//! [`canopy_proto::Descriptor`] values, reconciliation diffs them against
//! the record of what was last applied, and the resulting
//! [`canopy_proto::Patch`]es are handed to a [`Surface`] in order. Time is
//! supplied through an [`Environment`], so the same code runs against a
//! real clock, a virtual clock in simulation, or an in-memory surface in
//! tests.
//!
//! Everything runs synchronously on the caller's stack. A public operation
//! returns only after the render, reconcile, apply and hook sequence it
//! triggered has completed, including any nested updates triggered from
//! hooks and handlers.
//!
//! # Components
//!
//! - [`runtime`]: Runtime, lifecycle scheduler and public operations
//! - [`component`]: Component definitions, hooks and the hook context
//! - [`registry`]: Component registry
//! - [`instance`]: Live instances and the instance tree
//! - [`mod@reconcile`]: Tree reconciliation into surface patches
//! - [`diff`]: Property diffs and keyed-children checks
//! - [`store`]: Global store and reducer actions
//! - [`bus`]: Event bus with bounded history
//! - [`surface`]: Render surface seam and listener bookkeeping
//! - [`mod@env`]: Environment abstraction (time)
//! - [`error`]: Runtime error types

pub mod bus;
pub mod component;
pub mod diff;
pub mod env;
pub mod error;
pub mod instance;
pub mod mounted;
pub mod reconcile;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod store;
pub mod surface;

pub use bus::{EventBus, EventHandler, Subscription};
pub use component::{Cleanup, ComponentDefinition, Context};
pub use env::{Environment, SystemEnv};
pub use error::RuntimeError;
pub use instance::{ComponentInstance, InstanceId, InstanceSnapshot, InstanceTree};
pub use mounted::Mounted;
pub use registry::Registry;
pub use runtime::{Runtime, RuntimeConfig};
pub use state::State;
pub use store::Store;
pub use surface::{ListenerBinding, PatchApplier, Surface, SurfaceError};
