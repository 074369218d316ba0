//! Component definitions, lifecycle hooks and the hook context.

use std::{collections::BTreeMap, fmt, rc::Rc};

use canopy_proto::{Descriptor, EventPayload, EventRecord};
use serde_json::Value;

use crate::{
    error::RuntimeError,
    instance::InstanceId,
    runtime::Runtime,
    state::State,
};

/// Render step: `(state, store_state) -> descriptor`. Must be free of side
/// effects; the scheduler relies on it for determinism.
pub type RenderFn = Rc<dyn Fn(&State, Option<&State>) -> Descriptor>;

/// Event handler bound through a descriptor handler reference.
pub type HandlerFn = Rc<dyn Fn(&mut Context<'_>, &Value) -> Result<(), RuntimeError>>;

/// Hook run after the first render has been applied. May hand back a
/// [`Cleanup`] that is released before `on_unmount`.
pub type MountHook = Rc<dyn Fn(&mut Context<'_>) -> Result<Option<Cleanup>, RuntimeError>>;

/// Hook run after every update pass with the state from before the pass.
pub type UpdateHook = Rc<dyn Fn(&mut Context<'_>, &State) -> Result<(), RuntimeError>>;

/// Hook run before the instance's nodes are removed.
pub type UnmountHook = Rc<dyn Fn(&mut Context<'_>)>;

/// Immutable description of a component.
#[derive(Clone)]
pub struct ComponentDefinition {
    name: String,
    initial_state: State,
    render: RenderFn,
    handlers: BTreeMap<String, HandlerFn>,
    on_mount: Option<MountHook>,
    on_update: Option<UpdateHook>,
    on_unmount: Option<UnmountHook>,
}

impl ComponentDefinition {
    /// Define a component with its initial state and render step.
    pub fn new(
        name: impl Into<String>,
        initial_state: State,
        render: impl Fn(&State, Option<&State>) -> Descriptor + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            initial_state,
            render: Rc::new(render),
            handlers: BTreeMap::new(),
            on_mount: None,
            on_update: None,
            on_unmount: None,
        }
    }

    /// Declare a named event handler.
    #[must_use]
    pub fn handler(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&mut Context<'_>, &Value) -> Result<(), RuntimeError> + 'static,
    ) -> Self {
        self.handlers.insert(name.into(), Rc::new(handler));
        self
    }

    /// Set the mount hook.
    #[must_use]
    pub fn on_mount(
        mut self,
        hook: impl Fn(&mut Context<'_>) -> Result<Option<Cleanup>, RuntimeError> + 'static,
    ) -> Self {
        self.on_mount = Some(Rc::new(hook));
        self
    }

    /// Set the update hook.
    #[must_use]
    pub fn on_update(
        mut self,
        hook: impl Fn(&mut Context<'_>, &State) -> Result<(), RuntimeError> + 'static,
    ) -> Self {
        self.on_update = Some(Rc::new(hook));
        self
    }

    /// Set the unmount hook.
    #[must_use]
    pub fn on_unmount(mut self, hook: impl Fn(&mut Context<'_>) + 'static) -> Self {
        self.on_unmount = Some(Rc::new(hook));
        self
    }

    /// Unique component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State every new instance starts from.
    pub fn initial_state(&self) -> &State {
        &self.initial_state
    }

    /// Run the render step.
    pub fn render(&self, state: &State, store: Option<&State>) -> Descriptor {
        (self.render)(state, store)
    }

    /// Look up a handler by name.
    pub fn handler_fn(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.get(name).cloned()
    }

    /// Names of all declared handlers.
    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub(crate) fn mount_hook(&self) -> Option<MountHook> {
        self.on_mount.clone()
    }

    pub(crate) fn update_hook(&self) -> Option<UpdateHook> {
        self.on_update.clone()
    }

    pub(crate) fn unmount_hook(&self) -> Option<UnmountHook> {
        self.on_unmount.clone()
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("initial_state", &self.initial_state)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("on_mount", &self.on_mount.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_unmount", &self.on_unmount.is_some())
            .finish_non_exhaustive()
    }
}

/// Resource handle returned by a mount hook.
///
/// `release` runs the wrapped closure at most once. The runtime releases it
/// before invoking `on_unmount`.
pub struct Cleanup {
    release: Option<Box<dyn FnOnce()>>,
}

impl Cleanup {
    /// Wrap a release closure.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    /// Run the release closure unless it already ran.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// True once `release` has run.
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup").field("released", &self.is_released()).finish()
    }
}

/// Access to the runtime from hooks and handlers, scoped to one instance.
///
/// Every call goes through the same synchronous scheduler as external
/// callers, so a hook calling [`Context::set_state`] re-renders before the
/// call returns.
pub struct Context<'rt> {
    runtime: &'rt mut Runtime,
    id: InstanceId,
}

impl<'rt> Context<'rt> {
    pub(crate) fn new(runtime: &'rt mut Runtime, id: InstanceId) -> Self {
        Self { runtime, id }
    }

    /// Id of the instance this context belongs to.
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Copy of the instance's current state.
    pub fn state(&self) -> State {
        self.runtime.get_state(&self.id)
    }

    /// Merge `partial` into this instance's state and re-render.
    pub fn set_state(&mut self, partial: State) -> Result<(), RuntimeError> {
        let id = self.id.clone();
        self.runtime.set_state(&id, partial)
    }

    /// Copy of the current store snapshot.
    pub fn store_state(&self) -> State {
        self.runtime.store_state()
    }

    /// Dispatch a store action.
    pub fn dispatch(&mut self, action: &str, payload: Option<Value>) -> Result<(), RuntimeError> {
        self.runtime.dispatch(action, payload)
    }

    /// Emit an event on the runtime's bus.
    pub fn emit(&mut self, kind: &str, payload: EventPayload) -> EventRecord {
        self.runtime.emit(kind, payload)
    }

    /// Full runtime access for operations not covered above.
    pub fn runtime(&mut self) -> &mut Runtime {
        self.runtime
    }
}
