//! Surface patch protocol.
//!
//! Patches are the only way the engine mutates a render surface. Each patch
//! addresses surface nodes through engine-allocated [`NodeKey`]s; the surface
//! owns the mapping from keys to native handles.
//!
//! Invariants:
//! - Patches are applied in emission order.
//! - Creation is parent-first: a node is created and placed before any of its
//!   children are inserted into it.
//! - Removal is child-first: every descendant of a removed node is removed by
//!   its own `RemoveNode` before the node itself.
//! - `ReplaceNode` puts an already created node in the position of `old` and
//!   drops `old`. Descendants of `old` have been removed beforehand.
//! - Keys are never reused within one runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identity of one surface node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub u32);

impl NodeKey {
    /// Reserved key of the surface's own root container.
    pub const ROOT: Self = Self(0);
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coarse patch classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    /// `CreateElement`, `CreateText`, `InsertChild`
    Create,
    /// `RemoveNode`
    Remove,
    /// `ReplaceNode`
    Replace,
    /// `SetProp`, `RemoveProp`, `AttachListener`, `DetachListener`
    UpdateProps,
    /// `ReorderChildren`
    Reorder,
    /// `SetText`
    SetText,
}

/// One surface mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Patch {
    /// Create a detached element node.
    CreateElement {
        /// New node
        node: NodeKey,
        /// Element tag
        tag: String,
    },
    /// Create a detached text node.
    CreateText {
        /// New node
        node: NodeKey,
        /// Text content
        text: String,
    },
    /// Insert a detached node into `parent` at `index`.
    InsertChild {
        /// Parent node
        parent: NodeKey,
        /// Node being inserted
        node: NodeKey,
        /// Position among the parent's children after insertion
        index: usize,
    },
    /// Detach and drop a node. Its descendants have already been removed.
    RemoveNode {
        /// Removed node
        node: NodeKey,
    },
    /// Put `node` where `old` is and drop `old`.
    ReplaceNode {
        /// Node being replaced
        old: NodeKey,
        /// Replacement node, already created
        node: NodeKey,
    },
    /// Add or update a property.
    SetProp {
        /// Target node
        node: NodeKey,
        /// Property name
        name: String,
        /// New value
        value: Value,
    },
    /// Remove a property.
    RemoveProp {
        /// Target node
        node: NodeKey,
        /// Property name
        name: String,
    },
    /// Attach an event listener that routes to a component handler.
    AttachListener {
        /// Target node
        node: NodeKey,
        /// Event property name, e.g. `onClick`
        event: String,
        /// Handler name on the owning component
        handler: String,
    },
    /// Detach the listener bound to `event`.
    DetachListener {
        /// Target node
        node: NodeKey,
        /// Event property name
        event: String,
    },
    /// Reorder the children of `parent` to `order` (keyed reconciliation).
    ReorderChildren {
        /// Parent node
        parent: NodeKey,
        /// Children in their new order
        order: Vec<NodeKey>,
    },
    /// Replace the content of a text node.
    SetText {
        /// Target text node
        node: NodeKey,
        /// New content
        text: String,
    },
}

impl Patch {
    /// Classify this patch.
    pub fn kind(&self) -> PatchKind {
        match self {
            Self::CreateElement { .. } | Self::CreateText { .. } | Self::InsertChild { .. } => {
                PatchKind::Create
            },
            Self::RemoveNode { .. } => PatchKind::Remove,
            Self::ReplaceNode { .. } => PatchKind::Replace,
            Self::SetProp { .. }
            | Self::RemoveProp { .. }
            | Self::AttachListener { .. }
            | Self::DetachListener { .. } => PatchKind::UpdateProps,
            Self::ReorderChildren { .. } => PatchKind::Reorder,
            Self::SetText { .. } => PatchKind::SetText,
        }
    }

    /// Node this patch acts on (the parent for insertion and reordering).
    pub fn target(&self) -> NodeKey {
        match self {
            Self::CreateElement { node, .. }
            | Self::CreateText { node, .. }
            | Self::RemoveNode { node }
            | Self::SetProp { node, .. }
            | Self::RemoveProp { node, .. }
            | Self::AttachListener { node, .. }
            | Self::DetachListener { node, .. }
            | Self::SetText { node, .. } => *node,
            Self::InsertChild { parent, .. } | Self::ReorderChildren { parent, .. } => *parent,
            Self::ReplaceNode { old, .. } => *old,
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateElement { node, tag } => write!(f, "create-element {node} <{tag}>"),
            Self::CreateText { node, text } => write!(f, "create-text {node} {text:?}"),
            Self::InsertChild { parent, node, index } => {
                write!(f, "insert-child {parent}[{index}] <- {node}")
            },
            Self::RemoveNode { node } => write!(f, "remove-node {node}"),
            Self::ReplaceNode { old, node } => write!(f, "replace-node {old} -> {node}"),
            Self::SetProp { node, name, value } => write!(f, "set-prop {node} {name}={value}"),
            Self::RemoveProp { node, name } => write!(f, "remove-prop {node} {name}"),
            Self::AttachListener { node, event, handler } => {
                write!(f, "attach-listener {node} {event} -> {handler}")
            },
            Self::DetachListener { node, event } => write!(f, "detach-listener {node} {event}"),
            Self::ReorderChildren { parent, order } => {
                write!(f, "reorder-children {parent} [")?;
                for (i, key) in order.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}")?;
                }
                f.write_str("]")
            },
            Self::SetText { node, text } => write!(f, "set-text {node} {text:?}"),
        }
    }
}
