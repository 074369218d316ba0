//! Runtime error types.

use thiserror::Error;

use crate::{instance::InstanceId, surface::SurfaceError};

/// Errors raised by runtime operations.
///
/// Every error is synchronous and reaches the immediate caller. The runtime
/// performs no retry and no silent recovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A component with this name is already registered
    #[error("component `{name}` is already registered")]
    DuplicateName {
        /// Conflicting component name
        name: String,
    },

    /// Dispatched action is not declared on the store
    #[error("unknown store action `{action}`")]
    UnknownAction {
        /// Requested action name
        action: String,
    },

    /// No live instance has this id
    #[error("no instance with id `{id}`")]
    NotFound {
        /// Requested instance id
        id: InstanceId,
    },

    /// A descriptor references a component that was never registered
    #[error("component `{name}` is not registered")]
    UnknownComponent {
        /// Referenced component name
        name: String,
    },

    /// A listener fired for a handler its component does not declare
    #[error("component `{component}` has no handler `{handler}`")]
    UnknownHandler {
        /// Component owning the listener
        component: String,
        /// Handler name carried by the descriptor
        handler: String,
    },

    /// Store operation requested but no store was configured
    #[error("no store configured")]
    NoStoreConfigured,

    /// Navigation requested but no routes were configured
    #[error("no routes configured")]
    NoRoutesConfigured,

    /// Re-entrant updates nested deeper than the configured limit
    #[error("update depth limit of {limit} exceeded")]
    UpdateDepthExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Render surface rejected a patch
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// Application code failed inside a hook or handler
    #[error("{component}: {reason}")]
    Handler {
        /// Component whose hook or handler failed
        component: String,
        /// Failure description
        reason: String,
    },
}

impl RuntimeError {
    /// Stable identifier of the error kind, used by remote bridges.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateName { .. } => "DuplicateNameError",
            Self::UnknownAction { .. } => "UnknownActionError",
            Self::NotFound { .. } => "NotFoundError",
            Self::UnknownComponent { .. } => "UnknownComponentError",
            Self::UnknownHandler { .. } => "UnknownHandlerError",
            Self::NoStoreConfigured => "NoStoreConfiguredError",
            Self::NoRoutesConfigured => "NoRoutesConfiguredError",
            Self::UpdateDepthExceeded { .. } => "UpdateDepthExceededError",
            Self::Surface(_) => "SurfaceError",
            Self::Handler { .. } => "HandlerError",
        }
    }
}
