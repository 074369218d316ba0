//! Batch operations.

use canopy_core::{InstanceId, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a batch.
///
/// Each variant maps onto one runtime primitive. The wire form is tagged by
/// `type`, e.g. `{"type": "set-state", "id": "Counter-1", "state": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BatchOp {
    /// Merge a partial into an instance's state
    SetState {
        /// Target instance
        id: InstanceId,
        /// Partial state
        state: State,
    },
    /// Dispatch a store action
    Dispatch {
        /// Action name
        action: String,
        /// Optional payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Unmount an instance
    RemoveComponent {
        /// Target instance
        id: InstanceId,
    },
    /// Navigate the router
    Navigate {
        /// Target path
        path: String,
    },
}

impl BatchOp {
    /// Short operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetState { .. } => "set-state",
            Self::Dispatch { .. } => "dispatch",
            Self::RemoveComponent { .. } => "remove-component",
            Self::Navigate { .. } => "navigate",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wire_form_is_tagged_by_type() {
        let ops: Vec<BatchOp> = serde_json::from_value(json!([
            { "type": "set-state", "id": "Counter-1", "state": { "count": 3 } },
            { "type": "dispatch", "action": "add" },
            { "type": "remove-component", "id": "Badge-2" },
            { "type": "navigate", "path": "/about" }
        ]))
        .unwrap();

        assert_eq!(ops.iter().map(BatchOp::name).collect::<Vec<_>>(), vec![
            "set-state",
            "dispatch",
            "remove-component",
            "navigate"
        ]);
        assert_eq!(ops[1], BatchOp::Dispatch { action: "add".into(), payload: None });
    }
}
