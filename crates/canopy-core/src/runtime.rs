//! The runtime: registry, instance tree, store, bus and surface wired
//! together behind one synchronous scheduler.
//!
//! Every state change runs a full update pass before the call returns:
//!
//! 1. merge the partial into local state
//! 2. render with the new state and the current store snapshot
//! 3. reconcile against the previous mounted record and apply the patches
//! 4. record the new mounted tree and descriptor
//! 5. emit `state:change` (local changes only) and `component:update`
//! 6. call `on_update` with the previous state
//!
//! Hooks and handlers receive a [`Context`] and may call back into the
//! runtime. Nesting is bounded by [`RuntimeConfig::max_update_depth`].
//!
//! An instance is busy while it or one of its descendants is reconciling.
//! A state change aimed at a busy instance is merged immediately and
//! rendered once the instance is no longer busy; an unmount is held back the
//! same way. Both are settled at the end of every pass.
//!
//! A pass that fails leaves the surface and the instance's mounted record in
//! agreement. A reference to an unregistered component is caught before
//! anything changes. A failure in a nested component is confined to that
//! component's slot, and a mount that fails is unwound.

use std::{mem, rc::Rc};

use canopy_proto::{
    Child, Descriptor, EventPayload, EventRecord, NodeKey, Patch,
    event::{COMPONENT_MOUNT, COMPONENT_UNMOUNT, COMPONENT_UPDATE, STATE_CHANGE, STORE_CHANGE},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    bus::{EventBus, Subscription},
    component::{Cleanup, ComponentDefinition, Context},
    env::{Environment, SystemEnv},
    error::RuntimeError,
    instance::{ComponentInstance, InstanceId, InstanceSnapshot, InstanceTree},
    mounted::Mounted,
    reconcile::Placement,
    registry::Registry,
    state::{State, merge},
    store::Store,
    surface::{PatchApplier, Surface},
};

/// Runtime tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of event records the bus retains
    pub history_capacity: usize,
    /// Maximum nesting of update passes triggered from hooks and handlers
    pub max_update_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { history_capacity: 100, max_update_depth: 64 }
    }
}

/// Why an update pass runs. Only local changes announce `state:change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// `set_state` or props forwarded by a parent
    Local,
    /// Store dispatch
    Store,
    /// Render postponed while the instance was reconciling
    Deferred,
}

/// The UI runtime.
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) registry: Registry,
    pub(crate) tree: InstanceTree,
    pub(crate) store: Option<Store>,
    pub(crate) bus: EventBus,
    pub(crate) applier: PatchApplier,
    pub(crate) pending: Vec<(Patch, InstanceId)>,
    pub(crate) next_node: u32,
    pub(crate) rendering: Vec<InstanceId>,
    pub(crate) replacing: Vec<NodeKey>,
    pub(crate) failure: Option<RuntimeError>,
    depth: usize,
    deferred: Vec<InstanceId>,
    unmounts: Vec<InstanceId>,
    app_root: Option<InstanceId>,
    navigation: Option<Cleanup>,
}

impl Runtime {
    /// Runtime over `surface` with the default configuration and the system
    /// clock.
    pub fn new(surface: impl Surface + 'static) -> Self {
        Self::with_config(surface, RuntimeConfig::default(), SystemEnv)
    }

    /// Runtime with explicit configuration and environment.
    pub fn with_config(
        surface: impl Surface + 'static,
        config: RuntimeConfig,
        env: impl Environment + 'static,
    ) -> Self {
        let bus = EventBus::new(config.history_capacity, Rc::new(env));
        Self {
            config,
            registry: Registry::new(),
            tree: InstanceTree::new(),
            store: None,
            bus,
            applier: PatchApplier::new(Box::new(surface)),
            pending: Vec::new(),
            next_node: 0,
            rendering: Vec::new(),
            replacing: Vec::new(),
            failure: None,
            depth: 0,
            deferred: Vec::new(),
            unmounts: Vec::new(),
            app_root: None,
            navigation: None,
        }
    }

    /// Attach the global store.
    #[must_use]
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the global store.
    pub fn set_store(&mut self, store: Store) {
        self.store = Some(store);
    }

    /// Active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
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
        self.registry.register(definition)
    }

    /// The component registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mount `definition` as a root under `anchor`. The new root is placed
    /// after any roots already mounted there.
    ///
    /// # Errors
    ///
    /// Propagates render, surface and hook failures.
    pub fn mount(
        &mut self,
        definition: Rc<ComponentDefinition>,
        anchor: NodeKey,
    ) -> Result<InstanceId, RuntimeError> {
        let id = self.mount_root(definition, anchor)?;
        if self.app_root.is_none() && self.tree.contains(&id) {
            self.app_root = Some(id.clone());
        }
        Ok(id)
    }

    /// Mount a root that never becomes the application root. Routed views
    /// are mounted this way so replacing them leaves the navigation
    /// listener alone.
    ///
    /// # Errors
    ///
    /// Same as [`Runtime::mount`].
    pub fn mount_outlet(
        &mut self,
        definition: Rc<ComponentDefinition>,
        anchor: NodeKey,
    ) -> Result<InstanceId, RuntimeError> {
        self.mount_root(definition, anchor)
    }

    fn mount_root(
        &mut self,
        definition: Rc<ComponentDefinition>,
        anchor: NodeKey,
    ) -> Result<InstanceId, RuntimeError> {
        let place = Placement::At { parent: anchor, index: self.root_index(anchor, None) };
        self.mount_instance(definition, None, None, Some(anchor), place)
    }

    /// Mount a registered component by name.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if `name` is not registered.
    pub fn mount_registered(
        &mut self,
        name: &str,
        anchor: NodeKey,
    ) -> Result<InstanceId, RuntimeError> {
        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownComponent { name: name.to_string() })?;
        self.mount(definition, anchor)
    }

    /// Unmount an instance and its descendants. A busy instance is unmounted
    /// as soon as its pass finishes.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not live.
    pub fn unmount(&mut self, id: &InstanceId) -> Result<(), RuntimeError> {
        let parent = self
            .tree
            .get(id)
            .ok_or_else(|| RuntimeError::NotFound { id: id.clone() })?
            .parent
            .clone();

        if self.is_busy(id) {
            debug!(%id, "instance is reconciling, deferring unmount");
            if !self.unmounts.contains(id) {
                self.unmounts.push(id.clone());
            }
            return Ok(());
        }

        self.unmount_instance(id, false)?;

        if let Some(parent) = parent
            && let Some(parent) = self.tree.get_mut(&parent)
        {
            parent.mounted.detach_instance(id);
        }
        Ok(())
    }

    /// Merge `partial` into an instance's state and re-render it.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not live, plus anything the pass raises.
    pub fn set_state(&mut self, id: &InstanceId, partial: State) -> Result<(), RuntimeError> {
        if !self.tree.contains(id) {
            return Err(RuntimeError::NotFound { id: id.clone() });
        }
        self.update_pass(id, Some(&partial), Origin::Local, None)
    }

    /// Copy of an instance's state. Unknown ids yield an empty map.
    pub fn get_state(&self, id: &InstanceId) -> State {
        self.tree.get(id).map(|instance| instance.state.clone()).unwrap_or_default()
    }

    /// Dispatch a store action, then re-render every root. Children pick up
    /// the new snapshot through their parents' passes.
    ///
    /// # Errors
    ///
    /// `NoStoreConfigured` without a store, `UnknownAction` for undeclared
    /// actions. Both leave the store untouched.
    pub fn dispatch(&mut self, action: &str, payload: Option<Value>) -> Result<(), RuntimeError> {
        let store = self.store.as_mut().ok_or(RuntimeError::NoStoreConfigured)?;
        let (prev, next) = store.apply(action, payload.as_ref())?;
        debug!(action, "store dispatch");

        let mut event = EventPayload::new();
        event.insert("action".into(), Value::String(action.to_string()));
        event.insert("payload".into(), payload.unwrap_or(Value::Null));
        event.insert("prev".into(), Value::Object((*prev).clone()));
        event.insert("next".into(), Value::Object((*next).clone()));
        self.bus.emit(STORE_CHANGE, event);

        for root in self.tree.root_ids() {
            if self.tree.contains(&root) {
                self.update_pass(&root, None, Origin::Store, None)?;
            }
        }
        Ok(())
    }

    /// Copy of the store snapshot, empty without a store.
    pub fn store_state(&self) -> State {
        self.store.as_ref().map(Store::state).unwrap_or_default()
    }

    /// The configured store.
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// Snapshot of all roots and their descendants.
    pub fn instance_tree(&self) -> Vec<InstanceSnapshot> {
        self.tree.snapshot()
    }

    /// Look up a live instance.
    pub fn instance(&self, id: &InstanceId) -> Option<&ComponentInstance> {
        self.tree.get(id)
    }

    /// Surface node at the top of an instance's rendered output.
    pub fn surface_node(&self, id: &InstanceId) -> Option<NodeKey> {
        self.tree.get(id).and_then(|instance| self.tree.surface_root(&instance.mounted))
    }

    /// Subscribe to bus events.
    pub fn on(
        &self,
        kind: impl Into<String>,
        handler: impl Fn(&EventRecord) + 'static,
    ) -> Subscription {
        self.bus.on(kind, handler)
    }

    /// Emit a bus event.
    pub fn emit(&self, kind: &str, payload: EventPayload) -> EventRecord {
        self.bus.emit(kind, payload)
    }

    /// Retained event records, oldest first.
    pub fn event_history(&self) -> Vec<EventRecord> {
        self.bus.history()
    }

    /// The event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Route a surface event to the handler bound on `node`.
    ///
    /// Returns `Ok(false)` when nothing listens for `event` on `node`.
    ///
    /// # Errors
    ///
    /// `UnknownHandler` if the owning component lacks the handler, plus
    /// whatever the handler returns.
    pub fn dispatch_event(
        &mut self,
        node: NodeKey,
        event: &str,
        payload: &Value,
    ) -> Result<bool, RuntimeError> {
        let Some(binding) = self.applier.listener(node, event).cloned() else {
            return Ok(false);
        };
        let definition = self
            .tree
            .get(&binding.instance)
            .ok_or_else(|| RuntimeError::NotFound { id: binding.instance.clone() })?
            .definition
            .clone();
        let handler = definition.handler_fn(&binding.handler).ok_or_else(|| {
            RuntimeError::UnknownHandler {
                component: definition.name().to_string(),
                handler: binding.handler.clone(),
            }
        })?;

        debug!(
            %node,
            event,
            handler = %binding.handler,
            instance = %binding.instance,
            "surface event"
        );
        let mut ctx = Context::new(self, binding.instance);
        handler(&mut ctx, payload)?;
        Ok(true)
    }

    /// Number of listeners currently bound on the surface.
    pub fn listener_count(&self) -> usize {
        self.applier.listener_count()
    }

    /// Hand over a resource released when the first mounted root unmounts.
    /// A previously registered one is released first.
    pub fn set_navigation_cleanup(&mut self, cleanup: Cleanup) {
        if let Some(mut previous) = self.navigation.replace(cleanup) {
            previous.release();
        }
    }

    /// First root mounted on this runtime, while it is live.
    pub fn app_root(&self) -> Option<&InstanceId> {
        self.app_root.as_ref()
    }

    fn enter(&mut self) -> Result<(), RuntimeError> {
        if self.depth >= self.config.max_update_depth {
            warn!(limit = self.config.max_update_depth, "update depth exceeded");
            return Err(RuntimeError::UpdateDepthExceeded { limit: self.config.max_update_depth });
        }
        self.depth += 1;
        Ok(())
    }

    /// True while `id` or one of its descendants is reconciling.
    fn is_busy(&self, id: &InstanceId) -> bool {
        self.rendering.iter().any(|rendering| self.tree.descends_from(rendering, id))
    }

    /// Run the unmounts and renders held back for instances that are no
    /// longer busy.
    fn settle(&mut self) -> Result<(), RuntimeError> {
        while let Some(pos) = self.unmounts.iter().position(|id| !self.is_busy(id)) {
            let id = self.unmounts.remove(pos);
            if self.tree.contains(&id) {
                self.unmount(&id)?;
            }
        }
        while let Some(pos) = self.deferred.iter().position(|id| !self.is_busy(id)) {
            let id = self.deferred.remove(pos);
            if self.tree.contains(&id) {
                self.update_pass(&id, None, Origin::Deferred, None)?;
            }
        }
        Ok(())
    }

    /// Re-render `id`. `place` is where its output goes if it currently
    /// shows nothing; `None` works it out from the tree.
    pub(crate) fn update_pass(
        &mut self,
        id: &InstanceId,
        partial: Option<&State>,
        origin: Origin,
        place: Option<Placement>,
    ) -> Result<(), RuntimeError> {
        if self.is_busy(id) {
            self.defer(id, partial, origin);
            return Ok(());
        }

        self.enter()?;
        let result = self.run_update(id, partial, origin, place);
        self.depth -= 1;
        let settled = self.settle();
        result.and(settled)
    }

    fn defer(&mut self, id: &InstanceId, partial: Option<&State>, origin: Origin) {
        let Some(instance) = self.tree.get_mut(id) else {
            return;
        };
        debug!(%id, "instance is reconciling, deferring render");
        if let Some(partial) = partial {
            let prev = instance.state.clone();
            instance.state = merge(&prev, partial);
            let next = instance.state.clone();
            let component = instance.name().to_string();
            if origin == Origin::Local {
                self.emit_state_change(&component, id, prev, next);
            }
        }
        if !self.deferred.contains(id) {
            self.deferred.push(id.clone());
        }
    }

    /// Reconcile `id` against `descriptor` with the instance marked as
    /// rendering. Returns the new mounted tree and the first contained
    /// failure of a nested component.
    fn reconcile_pass(
        &mut self,
        id: &InstanceId,
        old: Mounted,
        descriptor: &Descriptor,
        place: Placement,
    ) -> (Result<Mounted, RuntimeError>, Option<RuntimeError>) {
        let outer = self.failure.take();
        let depth = self.rendering.len();
        self.rendering.push(id.clone());
        let reconciled = self.reconcile(id, old, &Child::Node(descriptor.clone()), place);
        self.rendering.truncate(depth);
        let failed = mem::replace(&mut self.failure, outer);
        (reconciled, failed)
    }

    fn run_update(
        &mut self,
        id: &InstanceId,
        partial: Option<&State>,
        origin: Origin,
        place: Option<Placement>,
    ) -> Result<(), RuntimeError> {
        let store = self.store.as_ref().map(Store::snapshot);
        let instance =
            self.tree.get_mut(id).ok_or_else(|| RuntimeError::NotFound { id: id.clone() })?;

        let prev = instance.state.clone();
        if let Some(partial) = partial {
            instance.state = merge(&prev, partial);
        }
        let next = instance.state.clone();
        let definition = Rc::clone(&instance.definition);

        let descriptor = definition.render(&next, store.as_deref());
        if let Err(err) = self.check_references(&descriptor) {
            if let Some(instance) = self.tree.get_mut(id) {
                instance.state = prev;
            }
            return Err(err);
        }

        let place = place.unwrap_or_else(|| self.placement_of(id));
        let old = self
            .tree
            .get_mut(id)
            .map(|instance| mem::take(&mut instance.mounted))
            .unwrap_or_default();
        let (reconciled, failed) = self.reconcile_pass(id, old, &descriptor, place);
        let mounted = reconciled?;

        if let Some(instance) = self.tree.get_mut(id) {
            instance.mounted = mounted;
            instance.last_descriptor = Some(descriptor);
        }
        self.flush()?;

        if self.tree.contains(id) {
            let component = definition.name().to_string();
            if origin == Origin::Local && partial.is_some() {
                self.emit_state_change(&component, id, prev.clone(), next);
            }
            self.bus.emit(COMPONENT_UPDATE, lifecycle_payload(&component, id));
        }
        if let Some(err) = failed {
            return Err(err);
        }
        if !self.tree.contains(id) {
            return Ok(());
        }

        if let Some(hook) = definition.update_hook() {
            let mut ctx = Context::new(self, id.clone());
            hook(&mut ctx, &prev)?;
        }
        Ok(())
    }

    pub(crate) fn mount_instance(
        &mut self,
        definition: Rc<ComponentDefinition>,
        overrides: Option<State>,
        parent: Option<InstanceId>,
        anchor: Option<NodeKey>,
        place: Placement,
    ) -> Result<InstanceId, RuntimeError> {
        self.enter()?;
        let result = self.run_mount(definition, overrides, parent, anchor, place);
        self.depth -= 1;
        let settled = self.settle();
        let id = result?;
        settled?;
        Ok(id)
    }

    fn run_mount(
        &mut self,
        definition: Rc<ComponentDefinition>,
        overrides: Option<State>,
        parent: Option<InstanceId>,
        anchor: Option<NodeKey>,
        place: Placement,
    ) -> Result<InstanceId, RuntimeError> {
        let state = match overrides {
            Some(overrides) => merge(definition.initial_state(), &overrides),
            None => definition.initial_state().clone(),
        };
        let store = self.store.as_ref().map(Store::snapshot);
        let descriptor = definition.render(&state, store.as_deref());
        self.check_references(&descriptor)?;

        let id = self.tree.next_id(definition.name());
        debug!(%id, "mounting");
        let instance = ComponentInstance::new(id.clone(), Rc::clone(&definition), state, parent);
        self.tree.insert(instance, anchor);

        let (reconciled, failed) = self.reconcile_pass(&id, Mounted::Empty, &descriptor, place);
        let mounted = match reconciled {
            Ok(mounted) => mounted,
            Err(err) => {
                self.discard(&id)?;
                return Err(err);
            },
        };

        if let Some(instance) = self.tree.get_mut(&id) {
            instance.mounted = mounted;
            instance.last_descriptor = Some(descriptor);
        }
        self.flush()?;
        if let Some(err) = failed {
            self.discard(&id)?;
            return Err(err);
        }

        if !self.tree.contains(&id) {
            return Ok(id);
        }
        self.bus.emit(COMPONENT_MOUNT, lifecycle_payload(definition.name(), &id));

        if let Some(hook) = definition.mount_hook() {
            let mut ctx = Context::new(self, id.clone());
            match hook(&mut ctx) {
                Ok(Some(mut cleanup)) => match self.tree.get_mut(&id) {
                    Some(instance) => instance.cleanup = Some(cleanup),
                    None => cleanup.release(),
                },
                Ok(None) => {},
                Err(err) => {
                    if self.tree.contains(&id) {
                        self.unmount_instance(&id, false)?;
                    }
                    return Err(err);
                },
            }
        }
        Ok(id)
    }

    /// Unwind a mount that failed before announcing itself: remove whatever
    /// it put on the surface and drop it from the tree without running
    /// hooks.
    fn discard(&mut self, id: &InstanceId) -> Result<(), RuntimeError> {
        self.deferred.retain(|deferred| deferred != id);
        self.unmounts.retain(|unmount| unmount != id);
        let Some(instance) = self.tree.get_mut(id) else {
            return Ok(());
        };
        debug!(%id, "discarding failed mount");
        let mounted = mem::take(&mut instance.mounted);
        self.teardown(id, mounted, false)?;
        self.flush()?;
        self.tree.remove(id);
        Ok(())
    }

    /// Remove an instance: release its cleanup, run `on_unmount`, tear down
    /// its rendered output, drop it from the tree and emit
    /// `component:unmount`. With `keep_root` the top surface node stays in
    /// place for a following `ReplaceNode`.
    pub(crate) fn unmount_instance(
        &mut self,
        id: &InstanceId,
        keep_root: bool,
    ) -> Result<(), RuntimeError> {
        let instance =
            self.tree.get_mut(id).ok_or_else(|| RuntimeError::NotFound { id: id.clone() })?;
        let definition = Rc::clone(&instance.definition);
        let cleanup = instance.cleanup.take();
        debug!(%id, "unmounting");

        self.flush()?;
        if let Some(mut cleanup) = cleanup {
            cleanup.release();
        }
        if let Some(hook) = definition.unmount_hook() {
            let mut ctx = Context::new(self, id.clone());
            hook(&mut ctx);
        }

        let Some(instance) = self.tree.get_mut(id) else {
            return Ok(());
        };
        let mounted = mem::take(&mut instance.mounted);
        self.teardown(id, mounted, keep_root)?;
        self.flush()?;

        self.tree.remove(id);
        self.deferred.retain(|deferred| deferred != id);
        self.bus.emit(COMPONENT_UNMOUNT, lifecycle_payload(definition.name(), id));

        if self.app_root.as_ref() == Some(id) {
            self.app_root = None;
            if let Some(mut navigation) = self.navigation.take() {
                navigation.release();
            }
        }
        Ok(())
    }

    /// Apply every queued patch in order.
    pub(crate) fn flush(&mut self) -> Result<(), RuntimeError> {
        for (patch, owner) in mem::take(&mut self.pending) {
            self.applier.apply(&patch, &owner)?;
        }
        Ok(())
    }

    fn emit_state_change(&self, component: &str, id: &InstanceId, prev: State, next: State) {
        let mut payload = lifecycle_payload(component, id);
        payload.insert("prev".into(), Value::Object(prev));
        payload.insert("next".into(), Value::Object(next));
        self.bus.emit(STATE_CHANGE, payload);
    }
}

fn lifecycle_payload(component: &str, id: &InstanceId) -> EventPayload {
    let mut payload = EventPayload::new();
    payload.insert("component".into(), Value::String(component.to_string()));
    payload.insert("id".into(), Value::String(id.to_string()));
    payload
}
