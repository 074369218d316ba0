//! Application facade.

use std::rc::Rc;

use canopy_core::{
    Cleanup, ComponentDefinition, InstanceId, InstanceSnapshot, Runtime, RuntimeError, State,
    Subscription,
};
use canopy_proto::{
    EventPayload, EventRecord, NodeKey,
    event::{BATCH_END, BATCH_START, ROUTE_AFTER, ROUTE_BEFORE, ROUTE_CHANGE},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    action::BatchOp,
    router::{Navigator, Router},
};

struct Routing {
    router: Box<dyn Router>,
    anchor: NodeKey,
    navigator: Navigator,
    path: Option<String>,
    instance: Option<InstanceId>,
}

/// A runtime plus the collaborators layered on top of it: batches and
/// routing.
pub struct App {
    runtime: Runtime,
    routing: Option<Routing>,
}

impl App {
    /// Wrap a runtime.
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime, routing: None }
    }

    /// Install a router whose views mount under the surface root.
    #[must_use]
    pub fn with_router(self, router: impl Router + 'static) -> Self {
        self.with_router_at(router, NodeKey::ROOT)
    }

    /// Install a router whose views mount under `anchor`. The anchor should
    /// be a container the router owns exclusively.
    ///
    /// Installing a router attaches a [`Navigator`]; it detaches when the
    /// application root unmounts.
    #[must_use]
    pub fn with_router_at(mut self, router: impl Router + 'static, anchor: NodeKey) -> Self {
        let navigator = Navigator::new();
        let listener = navigator.clone();
        self.runtime.set_navigation_cleanup(Cleanup::new(move || listener.detach()));
        self.routing =
            Some(Routing {
                router: Box::new(router),
                anchor,
                navigator,
                path: None,
                instance: None,
            });
        self
    }

    /// Underlying runtime.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Underlying runtime, mutable.
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    /// Register a component definition.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if the name is taken.
    pub fn register(
        &mut self,
        definition: ComponentDefinition,
    ) -> Result<Rc<ComponentDefinition>, RuntimeError> {
        self.runtime.register(definition)
    }

    /// Registered component names in registration order.
    pub fn registered_names(&self) -> Vec<String> {
        self.runtime.registry().names()
    }

    /// Mount a registered component as a root under `anchor`.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` for unregistered names, plus mount failures.
    pub fn mount(&mut self, name: &str, anchor: NodeKey) -> Result<InstanceId, RuntimeError> {
        self.runtime.mount_registered(name, anchor)
    }

    /// Unmount an instance.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not live.
    pub fn unmount(&mut self, id: &InstanceId) -> Result<(), RuntimeError> {
        self.runtime.unmount(id)?;
        if let Some(routing) = self.routing.as_mut()
            && routing.instance.as_ref() == Some(id)
        {
            routing.instance = None;
        }
        Ok(())
    }

    /// Merge a partial into an instance's state.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not live.
    pub fn set_state(&mut self, id: &InstanceId, partial: State) -> Result<(), RuntimeError> {
        self.runtime.set_state(id, partial)
    }

    /// Copy of an instance's state; empty for unknown ids.
    pub fn get_state(&self, id: &InstanceId) -> State {
        self.runtime.get_state(id)
    }

    /// Dispatch a store action.
    ///
    /// # Errors
    ///
    /// `NoStoreConfigured` or `UnknownAction`.
    pub fn dispatch(&mut self, action: &str, payload: Option<Value>) -> Result<(), RuntimeError> {
        self.runtime.dispatch(action, payload)
    }

    /// Copy of the store snapshot.
    pub fn store_state(&self) -> State {
        self.runtime.store_state()
    }

    /// Instance tree snapshot.
    pub fn instance_tree(&self) -> Vec<InstanceSnapshot> {
        self.runtime.instance_tree()
    }

    /// Subscribe to events.
    pub fn on(
        &self,
        kind: impl Into<String>,
        handler: impl Fn(&EventRecord) + 'static,
    ) -> Subscription {
        self.runtime.on(kind, handler)
    }

    /// Emit an event.
    pub fn emit(&self, kind: &str, payload: EventPayload) -> EventRecord {
        self.runtime.emit(kind, payload)
    }

    /// Retained events, oldest first.
    pub fn event_history(&self) -> Vec<EventRecord> {
        self.runtime.event_history()
    }

    /// Route a surface event to its handler.
    ///
    /// # Errors
    ///
    /// Whatever the handler returns.
    pub fn dispatch_event(
        &mut self,
        node: NodeKey,
        event: &str,
        payload: &Value,
    ) -> Result<bool, RuntimeError> {
        self.runtime.dispatch_event(node, event, payload)
    }

    /// Run `ops` in order.
    ///
    /// Emits `batch:start` with the operation count, then runs each
    /// operation. The first failure stops the batch and is returned;
    /// operations already applied stay applied and `batch:end` is not
    /// emitted. On success `batch:end` carries the same count.
    ///
    /// # Errors
    ///
    /// The error of the first failing operation.
    pub fn batch(&mut self, ops: &[BatchOp]) -> Result<(), RuntimeError> {
        debug!(count = ops.len(), "batch start");
        self.runtime.emit(BATCH_START, count_payload(ops.len()));

        for (index, op) in ops.iter().enumerate() {
            if let Err(err) = self.apply(op) {
                debug!(index, op = op.name(), %err, "batch stopped");
                return Err(err);
            }
        }

        self.runtime.emit(BATCH_END, count_payload(ops.len()));
        Ok(())
    }

    fn apply(&mut self, op: &BatchOp) -> Result<(), RuntimeError> {
        match op {
            BatchOp::SetState { id, state } => self.set_state(id, state.clone()),
            BatchOp::Dispatch { action, payload } => self.dispatch(action, payload.clone()),
            BatchOp::RemoveComponent { id } => self.unmount(id),
            BatchOp::Navigate { path } => self.navigate(path),
        }
    }

    /// Navigate to `path`.
    ///
    /// Emits `route:before`, unmounts the current routed view, mounts the
    /// resolved component, then emits `route:change` and `route:after`. A
    /// path no route matches is ignored.
    ///
    /// # Errors
    ///
    /// `NoRoutesConfigured` without a router, plus mount and unmount
    /// failures.
    pub fn navigate(&mut self, path: &str) -> Result<(), RuntimeError> {
        let routing = self.routing.as_ref().ok_or(RuntimeError::NoRoutesConfigured)?;
        let Some(component) = routing.router.resolve(path) else {
            warn!(path, "no route matches");
            return Ok(());
        };
        let definition = self
            .runtime
            .registry()
            .get(&component)
            .ok_or_else(|| RuntimeError::UnknownComponent { name: component.clone() })?;
        let from = routing.path.clone().map_or(Value::Null, Value::String);
        let anchor = routing.anchor;
        let previous = routing.instance.clone();
        debug!(path, %component, "navigate");

        let mut before = EventPayload::new();
        before.insert("from".into(), from.clone());
        before.insert("to".into(), Value::String(path.to_string()));
        self.runtime.emit(ROUTE_BEFORE, before);

        if let Some(previous) = previous
            && self.runtime.instance(&previous).is_some()
        {
            self.runtime.unmount(&previous)?;
        }
        let id = self.runtime.mount_outlet(definition, anchor)?;

        if let Some(routing) = self.routing.as_mut() {
            routing.path = Some(path.to_string());
            routing.instance = Some(id.clone());
        }

        let mut change = EventPayload::new();
        change.insert("from".into(), from);
        change.insert("to".into(), Value::String(path.to_string()));
        change.insert("component".into(), Value::String(component));
        change.insert("id".into(), Value::String(id.to_string()));
        self.runtime.emit(ROUTE_CHANGE, change);

        let mut after = EventPayload::new();
        after.insert("path".into(), Value::String(path.to_string()));
        self.runtime.emit(ROUTE_AFTER, after);
        Ok(())
    }

    /// Current routed path.
    pub fn current_path(&self) -> Option<&str> {
        self.routing.as_ref().and_then(|routing| routing.path.as_deref())
    }

    /// Instance currently mounted by the router.
    pub fn current_route(&self) -> Option<&InstanceId> {
        self.routing.as_ref().and_then(|routing| routing.instance.as_ref())
    }

    /// Navigation handle for hosts, `None` without a router.
    pub fn navigator(&self) -> Option<Navigator> {
        self.routing.as_ref().map(|routing| routing.navigator.clone())
    }

    /// Run queued navigation requests. Returns how many ran.
    ///
    /// # Errors
    ///
    /// The first navigation failure; later requests stay queued.
    pub fn process_navigation(&mut self) -> Result<usize, RuntimeError> {
        let Some(navigator) = self.navigator() else {
            return Ok(0);
        };
        let mut processed = 0;
        while let Some(path) = navigator.next() {
            self.navigate(&path)?;
            processed += 1;
        }
        Ok(processed)
    }
}

fn count_payload(count: usize) -> EventPayload {
    let mut payload = EventPayload::new();
    payload.insert("count".into(), Value::from(count));
    payload
}
