//! Render surface seam.
//!
//! The engine never touches a native tree. It emits [`Patch`]es and hands
//! them, in order, to a [`Surface`] implementation. [`PatchApplier`] sits in
//! between and keeps the listener table used to route surface events back to
//! component handlers.

use std::collections::HashMap;

use canopy_proto::{NodeKey, Patch};
use thiserror::Error;
use tracing::trace;

use crate::instance::InstanceId;

/// Errors a surface reports when a patch cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// Patch references a node the surface does not know
    #[error("unknown node {0}")]
    UnknownNode(NodeKey),

    /// Creation reused a live key
    #[error("node {0} already exists")]
    DuplicateNode(NodeKey),

    /// Insertion index past the end of the parent's children
    #[error("index {index} out of bounds for {parent} with {len} children")]
    IndexOutOfBounds {
        /// Parent node
        parent: NodeKey,
        /// Requested index
        index: usize,
        /// Current child count
        len: usize,
    },

    /// Text patch addressed at an element
    #[error("node {0} is not a text node")]
    NotText(NodeKey),

    /// Property or child patch addressed at a text node
    #[error("node {0} is not an element")]
    NotElement(NodeKey),

    /// Node removed or replaced while it still has children
    #[error("node {0} still has children")]
    HasChildren(NodeKey),

    /// Node inserted while already attached to a parent
    #[error("node {0} is already attached")]
    AlreadyAttached(NodeKey),

    /// Reorder list is not a permutation of the parent's children
    #[error("reorder of {0} does not match its children")]
    ReorderMismatch(NodeKey),
}

/// Mutable render target.
///
/// Implementations apply patches in the order given. A patch that cannot be
/// applied must be rejected without partially applying it.
pub trait Surface {
    /// Apply one patch.
    fn apply(&mut self, patch: &Patch) -> Result<(), SurfaceError>;
}

/// Where a surface listener routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerBinding {
    /// Instance whose render attached the listener
    pub instance: InstanceId,
    /// Handler name on that instance's definition
    pub handler: String,
}

/// Owns the surface and the listener table.
pub struct PatchApplier {
    surface: Box<dyn Surface>,
    listeners: HashMap<(NodeKey, String), ListenerBinding>,
    applied: u64,
}

impl PatchApplier {
    /// Wrap a surface.
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self { surface, listeners: HashMap::new(), applied: 0 }
    }

    /// Apply `patch` on behalf of `owner` and update listener bookkeeping.
    pub fn apply(&mut self, patch: &Patch, owner: &InstanceId) -> Result<(), SurfaceError> {
        trace!(%patch, %owner, "apply patch");
        self.surface.apply(patch)?;

        match patch {
            Patch::AttachListener { node, event, handler } => {
                let binding = ListenerBinding { instance: owner.clone(), handler: handler.clone() };
                self.listeners.insert((*node, event.clone()), binding);
            },
            Patch::DetachListener { node, event } => {
                self.listeners.remove(&(*node, event.clone()));
            },
            Patch::RemoveNode { node } | Patch::ReplaceNode { old: node, .. } => {
                self.listeners.retain(|(bound, _), _| bound != node);
            },
            _ => {},
        }

        self.applied += 1;
        Ok(())
    }

    /// Listener bound to `event` on `node`.
    pub fn listener(&self, node: NodeKey, event: &str) -> Option<&ListenerBinding> {
        self.listeners.get(&(node, event.to_string()))
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of patches applied so far.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}
