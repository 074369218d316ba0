//! Remote-control bridge.
//!
//! Maps JSON requests onto the runtime's public operations so an external
//! inspector can drive an [`App`] over any message transport. The bridge
//! only translates; transport, framing and timeouts belong to the host.

use canopy_core::{InstanceId, RuntimeError, State};
use canopy_proto::{EventPayload, NodeKey, codec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{App, action::BatchOp};

/// Request from a remote inspector, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    /// Mount a registered component under an anchor node
    Mount {
        /// Component name
        component: String,
        /// Anchor node, the surface root when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor: Option<NodeKey>,
    },
    /// Unmount an instance
    Unmount {
        /// Target instance
        id: InstanceId,
    },
    /// Merge a partial into an instance's state
    SetState {
        /// Target instance
        id: InstanceId,
        /// Partial state
        state: State,
    },
    /// Read an instance's state
    GetState {
        /// Target instance
        id: InstanceId,
    },
    /// Dispatch a store action
    Dispatch {
        /// Action name
        action: String,
        /// Optional payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Read the store snapshot
    StoreState,
    /// List registered component names
    RegisteredNames,
    /// Snapshot the instance tree
    InstanceTree,
    /// Emit a custom event
    Emit {
        /// Event type
        #[serde(rename = "type")]
        kind: String,
        /// Event payload
        #[serde(default)]
        payload: EventPayload,
    },
    /// Read the retained event history
    EventHistory,
    /// Run a batch
    Batch {
        /// Operations in order
        ops: Vec<BatchOp>,
    },
    /// Navigate the router
    Navigate {
        /// Target path
        path: String,
    },
    /// Fire a surface event on a node
    DispatchEvent {
        /// Node carrying the listener
        node: NodeKey,
        /// Event property name, e.g. `onClick`
        event: String,
        /// Event payload
        #[serde(default)]
        payload: Value,
    },
}

/// Reply to a [`Request`], tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Response {
    /// Operation succeeded
    Ok {
        /// Operation result, omitted when there is none
        #[serde(default, skip_serializing_if = "Value::is_null")]
        result: Value,
    },
    /// Operation failed
    Error {
        /// Stable error kind, e.g. `NotFoundError`
        kind: String,
        /// Human-readable description
        message: String,
    },
}

impl Response {
    fn ok(result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Self::Ok { result },
            Err(err) => Self::Error { kind: "ProtocolError".into(), message: err.to_string() },
        }
    }

    fn done() -> Self {
        Self::Ok { result: Value::Null }
    }

    fn from_error(err: &RuntimeError) -> Self {
        Self::Error { kind: err.kind().to_string(), message: err.to_string() }
    }

    /// True for `Ok` replies.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Executes bridge requests against an [`App`].
pub struct Bridge;

impl Bridge {
    /// Execute one request.
    pub fn handle(app: &mut App, request: Request) -> Response {
        debug!(?request, "bridge request");
        let result = match request {
            Request::Mount { component, anchor } => {
                app.mount(&component, anchor.unwrap_or(NodeKey::ROOT)).map(Response::ok)
            },
            Request::Unmount { id } => app.unmount(&id).map(|()| Response::done()),
            Request::SetState { id, state } => app.set_state(&id, state).map(|()| Response::done()),
            Request::GetState { id } => Ok(Response::ok(app.get_state(&id))),
            Request::Dispatch { action, payload } => {
                app.dispatch(&action, payload).map(|()| Response::done())
            },
            Request::StoreState => Ok(Response::ok(app.store_state())),
            Request::RegisteredNames => Ok(Response::ok(app.registered_names())),
            Request::InstanceTree => Ok(Response::ok(app.instance_tree())),
            Request::Emit { kind, payload } => Ok(Response::ok(app.emit(&kind, payload))),
            Request::EventHistory => Ok(Response::ok(app.event_history())),
            Request::Batch { ops } => app.batch(&ops).map(|()| Response::done()),
            Request::Navigate { path } => app.navigate(&path).map(|()| Response::done()),
            Request::DispatchEvent { node, event, payload } => {
                app.dispatch_event(node, &event, &payload).map(Response::ok)
            },
        };
        result.unwrap_or_else(|err| Response::from_error(&err))
    }

    /// Decode a JSON request, execute it and encode the reply.
    pub fn handle_json(app: &mut App, input: &str) -> String {
        let response = match codec::from_json::<Request>(input) {
            Ok(request) => Self::handle(app, request),
            Err(err) => Response::Error { kind: "ProtocolError".into(), message: err.to_string() },
        };
        codec::to_json(&response).unwrap_or_else(|err| {
            format!(r#"{{"status":"error","kind":"ProtocolError","message":"{err}"}}"#)
        })
    }
}
