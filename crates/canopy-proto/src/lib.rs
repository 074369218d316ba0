//! Wire format for the Canopy UI runtime.
//!
//! Everything that crosses the boundary between the reconciliation engine and
//! the outside world is defined here as plain serializable data: descriptor
//! trees going in, patch streams going out to a render surface, and event
//! records going out to observers and remote inspectors.
//!
//! None of these types hold behavior or native handles. Event handlers are
//! referenced by name and surface nodes by [`NodeKey`], so a live tree can be
//! shipped to an inspector as JSON (or CBOR) without loss.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod descriptor;
pub mod errors;
pub mod event;
pub mod patch;

pub use descriptor::{Child, Descriptor, Key, PropValue, Props, TagRef};
pub use errors::{ProtocolError, Result};
pub use event::{EventPayload, EventRecord};
pub use patch::{NodeKey, Patch, PatchKind};
