//! Pure diff helpers: property diffs and the keyed-children check.

use std::collections::{BTreeSet, HashSet};

use canopy_proto::{Child, NodeKey, Patch, PropValue, Props};

use crate::{mounted::Mounted, state::State};

/// Patches turning `old` props into `new` props on `node`.
///
/// Names are visited in sorted order. Handler references become listener
/// patches, everything else becomes property patches. Unchanged entries
/// produce nothing.
pub fn diff_props(node: NodeKey, old: &Props, new: &Props) -> Vec<Patch> {
    let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let mut patches = Vec::new();

    for name in names {
        match (old.get(name), new.get(name)) {
            (Some(before), Some(after)) if before == after => {},
            (before, after) => {
                match before {
                    Some(PropValue::Handler { .. }) => {
                        patches.push(Patch::DetachListener { node, event: name.clone() });
                    },
                    Some(PropValue::Value(_)) if !matches!(after, Some(PropValue::Value(_))) => {
                        patches.push(Patch::RemoveProp { node, name: name.clone() });
                    },
                    _ => {},
                }
                match after {
                    Some(PropValue::Handler { handler }) => patches.push(Patch::AttachListener {
                        node,
                        event: name.clone(),
                        handler: handler.clone(),
                    }),
                    Some(PropValue::Value(value)) => patches.push(Patch::SetProp {
                        node,
                        name: name.clone(),
                        value: value.clone(),
                    }),
                    None => {},
                }
            },
        }
    }

    patches
}

/// Props forwarded to a nested component, as a state partial.
pub fn props_to_state(props: &Props) -> State {
    props.iter().map(|(name, value)| (name.clone(), value.clone().into_state_value())).collect()
}

/// Outcome of inspecting a sibling list for keyed reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Every sibling on both sides has a unique key
    Keyed,
    /// No usable keys, match by position
    Positional,
    /// Keys present but duplicated within a list
    Duplicate,
}

/// Decide how to match `old` against `new`.
///
/// Keyed matching requires every child on both sides to carry a key, unique
/// within its list. Mixed lists match by position.
pub fn key_mode(old: &[Mounted], new: &[Child]) -> KeyMode {
    if old.is_empty() && new.is_empty() {
        return KeyMode::Positional;
    }
    if !old.iter().all(|m| m.key().is_some()) || !new.iter().all(|c| c.key().is_some()) {
        return KeyMode::Positional;
    }

    let mut seen_old = HashSet::with_capacity(old.len());
    let mut seen_new = HashSet::with_capacity(new.len());
    let unique_old = old.iter().filter_map(Mounted::key).all(|key| seen_old.insert(key));
    let unique_new = new.iter().filter_map(Child::key).all(|key| seen_new.insert(key));
    if unique_old && unique_new { KeyMode::Keyed } else { KeyMode::Duplicate }
}

#[cfg(test)]
mod tests {
    use canopy_proto::Descriptor;
    use serde_json::json;

    use super::*;

    fn props(pairs: &[(&str, PropValue)]) -> Props {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn prop_changes_map_to_patches() {
        let node = NodeKey(4);
        let old = props(&[
            ("class", "a".into()),
            ("title", "keep".into()),
            ("hidden", true.into()),
            ("onClick", PropValue::handler("inc")),
        ]);
        let new = props(&[
            ("class", "b".into()),
            ("title", "keep".into()),
            ("onClick", PropValue::handler("dec")),
            ("onInput", PropValue::handler("typed")),
        ]);

        let rendered: Vec<String> =
            diff_props(node, &old, &new).iter().map(ToString::to_string).collect();
        insta::assert_debug_snapshot!(rendered, @r#"
        [
            "set-prop #4 class=\"b\"",
            "remove-prop #4 hidden",
            "detach-listener #4 onClick",
            "attach-listener #4 onClick -> dec",
            "attach-listener #4 onInput -> typed",
        ]
        "#);
    }

    #[test]
    fn value_to_handler_switches_namespaces() {
        let node = NodeKey(1);
        let old = props(&[("onClick", json!("legacy").into())]);
        let new = props(&[("onClick", PropValue::handler("go"))]);

        assert_eq!(
            diff_props(node, &old, &new),
            vec![
                Patch::RemoveProp { node, name: "onClick".into() },
                Patch::AttachListener { node, event: "onClick".into(), handler: "go".into() },
            ]
        );
    }

    #[test]
    fn identical_props_produce_nothing() {
        let same = props(&[("a", 1_i64.into()), ("on", PropValue::handler("h"))]);
        assert!(diff_props(NodeKey(1), &same, &same).is_empty());
    }

    #[test]
    fn key_mode_requires_every_child_keyed() {
        let keyed = |k: &str| Mounted::Component {
            instance: k.into(),
            name: "X".into(),
            key: Some(k.into()),
        };
        let old = vec![keyed("a"), keyed("b")];

        let all: Vec<Child> =
            vec![
                Descriptor::element("li").key("b").into(),
                Descriptor::element("li").key("a").into(),
            ];
        assert_eq!(key_mode(&old, &all), KeyMode::Keyed);

        let mixed: Vec<Child> = vec![Descriptor::element("li").key("a").into(), Child::text("x")];
        assert_eq!(key_mode(&old, &mixed), KeyMode::Positional);

        let dup: Vec<Child> =
            vec![
                Descriptor::element("li").key("a").into(),
                Descriptor::element("li").key("a").into(),
            ];
        assert_eq!(key_mode(&old, &dup), KeyMode::Duplicate);
    }

    #[test]
    fn forwarded_handlers_become_names() {
        let state = props_to_state(&props(&[
            ("label", "Save".into()),
            ("onSave", PropValue::handler("save")),
        ]));
        assert_eq!(state["label"], json!("Save"));
        assert_eq!(state["onSave"], json!("save"));
    }
}
