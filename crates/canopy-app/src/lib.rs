//! Application layer for Canopy
//!
//! Collaborators that sit on top of the runtime's public operation set and
//! never reach into reconciliation: the batch orchestrator, the router and
//! the remote-control bridge.
//!
//! # Components
//!
//! - [`App`]: Runtime facade with batches and routing
//! - [`BatchOp`]: One step of a batch
//! - [`Router`]: Trait resolving paths to components, with [`RouteTable`]
//! - [`Navigator`]: Host-side navigation handle
//! - [`Bridge`]: JSON request/response bridge for remote inspectors

mod action;
mod app;
mod bridge;
mod router;

pub use action::BatchOp;
pub use app::App;
pub use bridge::{Bridge, Request, Response};
pub use router::{Navigator, RouteTable, Router};
