//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! runtime renders and records exactly what the reference model predicts.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    RealWorld      Compare
//!      (reference)   (App + surface) Observables
//! ```

use std::{collections::HashMap, time::Duration};

use canopy_app::App;
use canopy_core::{InstanceId, RuntimeConfig, RuntimeError, state::from_value};
use canopy_harness::{
    MemorySurface, ModelWorld, ObservableState, Operation, OperationError, OperationResult,
    SimEnv, Slot, ThemeAction, Widget, fixtures,
    model::{item_label, pick},
};
use canopy_proto::{NodeKey, Patch, PatchKind};
use proptest::prelude::*;
use serde_json::{Value, json};

const HISTORY: usize = 32;

/// Real system wrapper that mirrors ModelWorld's interface.
struct RealWorld {
    app: App,
    surface: MemorySurface,
    env: SimEnv,
    /// Every instance ever mounted, in mount order
    mounted: Vec<(InstanceId, Widget)>,
}

impl RealWorld {
    fn new() -> Self {
        let surface = MemorySurface::new();
        let env = SimEnv::new();
        let config = RuntimeConfig { history_capacity: HISTORY, ..RuntimeConfig::default() };
        let app = fixtures::demo_app(surface.clone(), config, env.clone()).unwrap();
        Self { app, surface, env, mounted: Vec::new() }
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Mount { widget } => match self.app.mount(widget.component(), NodeKey::ROOT) {
                Ok(id) => {
                    self.mounted.push((id.clone(), *widget));
                    OperationResult::Mounted(id.to_string())
                },
                Err(err) => OperationResult::Error(OperationError::from(&err)),
            },
            Operation::Click { target } => self.with_target(Widget::Counter, *target, |world, id| {
                let root = world.root(id)?;
                let button =
                    world.surface.children(root).get(1).copied().ok_or_else(|| not_found(id))?;
                world.click(button)
            }),
            Operation::SetCount { target, count } => {
                self.with_target(Widget::Counter, *target, |world, id| {
                    world.app.set_state(id, from_value(json!({ "count": count })))
                })
            },
            Operation::SetItems { target, items } => {
                let items: Vec<String> = items.iter().map(|item| item_label(*item)).collect();
                self.with_target(Widget::TodoList, *target, |world, id| {
                    world.app.set_state(id, from_value(json!({ "items": items })))
                })
            },
            Operation::ClickLabel { target } => {
                self.with_target(Widget::ThemeLabel, *target, |world, id| {
                    let root = world.root(id)?;
                    world.click(root)
                })
            },
            Operation::Dispatch { action } => {
                let result = match action {
                    ThemeAction::Toggle => self.app.dispatch("toggle", None),
                    ThemeAction::Set { dark } => {
                        let theme = if *dark { "dark" } else { "light" };
                        self.app.dispatch("set", Some(json!(theme)))
                    },
                    ThemeAction::Unknown => self.app.dispatch("shuffle", None),
                };
                into_result(result)
            },
            Operation::Unmount { target } => {
                let ids: Vec<InstanceId> = self.mounted.iter().map(|(id, _)| id.clone()).collect();
                match pick(&ids, *target) {
                    Some(id) => into_result(self.app.unmount(id)),
                    None => OperationResult::Error(OperationError::NoTarget),
                }
            },
            Operation::AdvanceTime { micros } => {
                self.env.advance(Duration::from_micros(u64::from(*micros)));
                OperationResult::Ok
            },
        }
    }

    fn with_target(
        &mut self,
        widget: Widget,
        target: Slot,
        f: impl FnOnce(&mut Self, &InstanceId) -> Result<(), RuntimeError>,
    ) -> OperationResult {
        let candidates: Vec<InstanceId> = self
            .mounted
            .iter()
            .filter(|(_, kind)| *kind == widget)
            .map(|(id, _)| id.clone())
            .collect();
        match pick(&candidates, target) {
            Some(id) => into_result(f(self, id)),
            None => OperationResult::Error(OperationError::NoTarget),
        }
    }

    fn root(&self, id: &InstanceId) -> Result<NodeKey, RuntimeError> {
        self.app.runtime().surface_node(id).ok_or_else(|| not_found(id))
    }

    fn click(&mut self, node: NodeKey) -> Result<(), RuntimeError> {
        let handled = self.app.dispatch_event(node, "onClick", &Value::Null)?;
        assert!(handled, "no listener on {node}");
        Ok(())
    }

    fn observable_state(&self) -> ObservableState {
        let history = self.app.event_history();
        ObservableState {
            render: self.surface.render(),
            states: self
                .mounted
                .iter()
                .filter(|(id, _)| self.app.runtime().instance(id).is_some())
                .map(|(id, _)| (id.to_string(), Value::Object(self.app.get_state(id))))
                .collect(),
            store: Value::Object(self.app.store_state()),
            events: history.iter().map(|record| record.kind.clone()).collect(),
            last_timestamp: history.last().map(|record| record.timestamp),
            listeners: self.app.runtime().listener_count(),
        }
    }
}

fn not_found(id: &InstanceId) -> RuntimeError {
    RuntimeError::NotFound { id: id.clone() }
}

fn into_result(result: Result<(), RuntimeError>) -> OperationResult {
    match result {
        Ok(()) => OperationResult::Ok,
        Err(err) => OperationResult::Error(OperationError::from(&err)),
    }
}

fn widget_strategy() -> impl Strategy<Value = Widget> {
    prop_oneof![Just(Widget::Counter), Just(Widget::TodoList), Just(Widget::ThemeLabel)]
}

fn theme_action_strategy() -> impl Strategy<Value = ThemeAction> {
    prop_oneof![
        Just(ThemeAction::Toggle),
        any::<bool>().prop_map(|dark| ThemeAction::Set { dark }),
        Just(ThemeAction::Unknown),
    ]
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => widget_strategy().prop_map(|widget| Operation::Mount { widget }),
        3 => any::<Slot>().prop_map(|target| Operation::Click { target }),
        2 => (any::<Slot>(), any::<i16>())
            .prop_map(|(target, count)| Operation::SetCount { target, count }),
        3 => (any::<Slot>(), prop::collection::vec(0..8u8, 0..6))
            .prop_map(|(target, items)| Operation::SetItems { target, items }),
        1 => any::<Slot>().prop_map(|target| Operation::ClickLabel { target }),
        1 => theme_action_strategy().prop_map(|action| Operation::Dispatch { action }),
        2 => any::<Slot>().prop_map(|target| Operation::Unmount { target }),
        1 => (1..5_000u32).prop_map(|micros| Operation::AdvanceTime { micros }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Runtime output matches the model after every operation.
    #[test]
    fn prop_runtime_matches_model(ops in prop::collection::vec(operation_strategy(), 0..40)) {
        let mut model = ModelWorld::new(HISTORY);
        let mut real = RealWorld::new();

        for op in &ops {
            let model_result = model.apply(op);
            let real_result = real.apply(op);
            prop_assert_eq!(&model_result, &real_result, "result mismatch for {:?}", op);

            prop_assert_eq!(
                model.observable_state(),
                real.observable_state(),
                "state mismatch after {:?}",
                op
            );
            prop_assert!(real.surface.detached_nodes().is_empty(), "detached nodes after {:?}", op);
        }
    }

    /// Reordering a keyed list keeps the surface nodes of surviving items.
    #[test]
    fn prop_keyed_reorder_preserves_nodes(
        order in Just((0..8u8).collect::<Vec<_>>()).prop_shuffle(),
        keep in 0..=8usize,
    ) {
        let mut real = RealWorld::new();
        let id = real.app.mount("TodoList", NodeKey::ROOT).unwrap();
        let all: Vec<String> = (0..8u8).map(item_label).collect();
        real.app.set_state(&id, from_value(json!({ "items": all }))).unwrap();
        let before = item_nodes(&real.surface);
        real.surface.take_log();

        let next: Vec<String> = order[..keep].iter().map(|item| item_label(*item)).collect();
        real.app.set_state(&id, from_value(json!({ "items": next }))).unwrap();

        let after = item_nodes(&real.surface);
        prop_assert_eq!(after.len(), keep);
        for (text, node) in &after {
            prop_assert_eq!(before.get(text), Some(node), "item {} was recreated", text);
        }
        let created =
            real.surface.patches().iter().filter(|patch| patch.kind() == PatchKind::Create).count();
        prop_assert_eq!(created, 0);
    }
}

/// Map each list item's text to its `li` node.
fn item_nodes(surface: &MemorySurface) -> HashMap<String, NodeKey> {
    surface
        .find_by_tag("li")
        .into_iter()
        .filter_map(|li| {
            let text = surface.children(li).first().and_then(|child| surface.text(*child))?;
            Some((text, li))
        })
        .collect()
}

#[cfg(test)]
mod smoke_tests {
    use super::*;

    /// Basic walk through every operation.
    #[test]
    fn runtime_and_model_agree_on_a_session() {
        let ops = [
            Operation::Mount { widget: Widget::Counter },
            Operation::Mount { widget: Widget::TodoList },
            Operation::Click { target: 0 },
            Operation::AdvanceTime { micros: 1_500 },
            Operation::SetItems { target: 0, items: vec![2, 0, 2] },
            Operation::Mount { widget: Widget::ThemeLabel },
            Operation::ClickLabel { target: 0 },
            Operation::Dispatch { action: ThemeAction::Unknown },
            Operation::Unmount { target: 0 },
            Operation::Click { target: 0 },
            Operation::SetCount { target: 0, count: -4 },
        ];
        let mut model = ModelWorld::new(HISTORY);
        let mut real = RealWorld::new();

        for op in &ops {
            assert_eq!(model.apply(op), real.apply(op), "result mismatch for {op:?}");
        }

        let state = real.observable_state();
        assert_eq!(state, model.observable_state());
        assert_eq!(
            state.render,
            r#"<ul><li>i2</li><li>i0</li><li>i2</li></ul><p class="dark" @onClick=toggle>dark</p>"#
        );
        assert_eq!(state.last_timestamp, Some(1_500));
    }

    /// Unmounting a root removes its nodes children first.
    #[test]
    fn unmount_removes_children_first() {
        let mut real = RealWorld::new();
        real.apply(&Operation::Mount { widget: Widget::Counter });
        real.surface.take_log();

        assert!(real.apply(&Operation::Unmount { target: 0 }).is_ok());

        let removed: Vec<NodeKey> = real
            .surface
            .patches()
            .iter()
            .filter_map(|patch| match patch {
                Patch::RemoveNode { node } => Some(*node),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![NodeKey(3), NodeKey(2), NodeKey(5), NodeKey(4), NodeKey(1)]);
        assert_eq!(real.surface.node_count(), 0);
        assert_eq!(real.app.runtime().listener_count(), 0);
    }
}
