//! Event records and the built-in event vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload carried by an event.
pub type EventPayload = Map<String, Value>;

/// Subscription type that receives every event.
pub const WILDCARD: &str = "*";

/// Local state of an instance changed.
pub const STATE_CHANGE: &str = "state:change";
/// Store snapshot replaced by a dispatch.
pub const STORE_CHANGE: &str = "store:change";
/// Instance mounted.
pub const COMPONENT_MOUNT: &str = "component:mount";
/// Instance completed an update pass.
pub const COMPONENT_UPDATE: &str = "component:update";
/// Instance removed from the tree.
pub const COMPONENT_UNMOUNT: &str = "component:unmount";
/// Navigation is about to happen.
pub const ROUTE_BEFORE: &str = "route:before";
/// Navigation swapped the routed component.
pub const ROUTE_CHANGE: &str = "route:change";
/// Navigation finished.
pub const ROUTE_AFTER: &str = "route:after";
/// Batch started.
pub const BATCH_START: &str = "batch:start";
/// Batch ran every operation.
pub const BATCH_END: &str = "batch:end";

/// One entry of the event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event type
    #[serde(rename = "type")]
    pub kind: String,
    /// Event payload
    #[serde(default)]
    pub payload: EventPayload,
    /// Monotonic time of emission, microseconds since the bus was created
    pub timestamp: u64,
}

impl EventRecord {
    /// Payload field lookup.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }
}
