//! Error recovery tests
//!
//! Failed passes and re-entrant unmounts against the strict in-memory
//! surface. After every step the surface must match the instance tree with
//! no orphaned nodes, and the next operation must work normally.

use std::{cell::Cell, rc::Rc};

use canopy_core::{
    ComponentDefinition, InstanceId, Runtime, RuntimeConfig, RuntimeError, State,
    state::from_value,
};
use canopy_harness::{MemorySurface, SimEnv};
use canopy_proto::{Descriptor, NodeKey, event};
use serde_json::{Value, json};

fn runtime() -> (Runtime, MemorySurface) {
    let surface = MemorySurface::new();
    let runtime = Runtime::with_config(surface.clone(), RuntimeConfig::default(), SimEnv::new());
    (runtime, surface)
}

fn assert_clean(surface: &MemorySurface) {
    assert_eq!(surface.detached_nodes(), Vec::<NodeKey>::new());
}

fn mounted_components(runtime: &Runtime) -> Vec<String> {
    runtime
        .event_history()
        .into_iter()
        .filter(|record| record.kind == event::COMPONENT_MOUNT)
        .filter_map(|record| {
            record.payload.get("component").and_then(Value::as_str).map(String::from)
        })
        .collect()
}

/// `<div><p>{n}</p></div>`, plus a reference to an unregistered component
/// while `n` is 1.
fn flaky() -> ComponentDefinition {
    ComponentDefinition::new("Flaky", from_value(json!({ "n": 0 })), |state, _| {
        let n = state.get("n").and_then(Value::as_i64).unwrap_or(0);
        Descriptor::element("div")
            .child(Descriptor::element("p").child(n))
            .child((n == 1).then(|| Descriptor::component("Ghost")))
    })
}

#[test]
fn failed_update_leaves_the_surface_untouched() {
    let (mut runtime, surface) = runtime();
    let definition = runtime.register(flaky()).unwrap();
    let id = runtime.mount(definition, NodeKey::ROOT).unwrap();
    surface.take_log();

    assert_eq!(
        runtime.set_state(&id, from_value(json!({ "n": 1 }))),
        Err(RuntimeError::UnknownComponent { name: "Ghost".into() })
    );
    assert!(surface.take_log().is_empty());
    assert_eq!(runtime.get_state(&id).get("n"), Some(&json!(0)));
    assert_eq!(surface.render(), "<div><p>0</p></div>");

    runtime.set_state(&id, from_value(json!({ "n": 2 }))).unwrap();
    assert_eq!(surface.render(), "<div><p>2</p></div>");
    assert_clean(&surface);
}

#[test]
fn failed_mount_leaves_nothing_behind() {
    let (mut runtime, surface) = runtime();
    let broken = runtime
        .register(ComponentDefinition::new("Broken", State::new(), |_, _| {
            Descriptor::element("section")
                .child(Descriptor::element("span").child("x"))
                .child(Descriptor::component("Ghost"))
        }))
        .unwrap();
    let working = runtime.register(flaky()).unwrap();

    assert_eq!(
        runtime.mount(broken, NodeKey::ROOT),
        Err(RuntimeError::UnknownComponent { name: "Ghost".into() })
    );
    assert_eq!(surface.node_count(), 0);
    assert!(runtime.instance_tree().is_empty());
    assert!(runtime.app_root().is_none());

    let id = runtime.mount(working, NodeKey::ROOT).unwrap();
    assert_eq!(id, InstanceId::from("Flaky-1"));
    assert_eq!(surface.render(), "<div><p>0</p></div>");
    assert_eq!(runtime.app_root(), Some(&id));
    assert_clean(&surface);
}

#[test]
fn child_mount_hook_failure_unwinds_the_parent() {
    let (mut runtime, surface) = runtime();
    runtime
        .register(
            ComponentDefinition::new("Fragile", State::new(), |_, _| {
                Descriptor::element("u").child("!")
            })
            .on_mount(|_| {
                Err(RuntimeError::Handler {
                    component: "Fragile".into(),
                    reason: "refused to mount".into(),
                })
            }),
        )
        .unwrap();
    let frame = runtime
        .register(ComponentDefinition::new("Frame", State::new(), |_, _| {
            Descriptor::element("div").child("frame").child(Descriptor::component("Fragile"))
        }))
        .unwrap();

    let err = runtime.mount(frame, NodeKey::ROOT).unwrap_err();

    assert_eq!(err.kind(), "HandlerError");
    assert_eq!(err.to_string(), "Fragile: refused to mount");
    assert_eq!(surface.node_count(), 0);
    assert!(runtime.instance_tree().is_empty());
    assert_eq!(mounted_components(&runtime), vec!["Fragile"]);
    assert_clean(&surface);
}

#[test]
fn child_unmounting_itself_on_mount_frees_its_slot() {
    let (mut runtime, surface) = runtime();
    let mounts = Rc::new(Cell::new(0));
    let seen = Rc::clone(&mounts);
    runtime
        .register(
            ComponentDefinition::new("Toast", State::new(), |_, _| {
                Descriptor::element("b").child("hi")
            })
            .on_mount(move |ctx| {
                seen.set(seen.get() + 1);
                if seen.get() == 1 {
                    let id = ctx.id().clone();
                    ctx.runtime().unmount(&id)?;
                }
                Ok(None)
            }),
        )
        .unwrap();
    let shell = runtime
        .register(ComponentDefinition::new(
            "Shell",
            from_value(json!({ "label": "a" })),
            |state, _| {
                let label = state.get("label").and_then(Value::as_str).unwrap_or_default();
                Descriptor::element("div")
                    .child(Descriptor::element("i").child(label))
                    .child(Descriptor::component("Toast"))
            },
        ))
        .unwrap();

    let id = runtime.mount(shell, NodeKey::ROOT).unwrap();
    assert_eq!(surface.render(), "<div><i>a</i></div>");
    assert_eq!(runtime.instance_tree()[0].children.len(), 0);
    assert_clean(&surface);

    runtime.set_state(&id, from_value(json!({ "label": "b" }))).unwrap();
    assert_eq!(mounts.get(), 2);
    assert_eq!(surface.render(), "<div><i>b</i><b>hi</b></div>");
    assert_eq!(runtime.instance_tree()[0].children[0].id, InstanceId::from("Toast-3"));

    runtime.set_state(&id, from_value(json!({ "label": "c" }))).unwrap();
    assert_eq!(mounts.get(), 2);
    assert_eq!(surface.render(), "<div><i>c</i><b>hi</b></div>");
    assert_clean(&surface);
}

#[test]
fn unmounting_a_reconciling_ancestor_waits_for_its_pass() {
    let (mut runtime, surface) = runtime();
    runtime
        .register(
            ComponentDefinition::new("Closer", State::new(), |_, _| {
                Descriptor::element("s").child("bye")
            })
            .on_mount(|ctx| {
                let id = ctx.id().clone();
                let parent = ctx.runtime().instance(&id).and_then(|i| i.parent().cloned());
                if let Some(parent) = parent {
                    ctx.runtime().unmount(&parent)?;
                }
                Ok(None)
            }),
        )
        .unwrap();
    let dialog = runtime
        .register(ComponentDefinition::new("Dialog", State::new(), |_, _| {
            Descriptor::element("div").child(Descriptor::component("Closer"))
        }))
        .unwrap();

    let id = runtime.mount(dialog, NodeKey::ROOT).unwrap();

    assert!(runtime.instance(&id).is_none());
    assert!(runtime.instance_tree().is_empty());
    assert!(runtime.app_root().is_none());
    assert_eq!(surface.node_count(), 0);
    assert_eq!(mounted_components(&runtime), vec!["Closer", "Dialog"]);
    assert_clean(&surface);
}
