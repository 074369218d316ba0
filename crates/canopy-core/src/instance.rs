//! Live component instances and the instance tree.

use std::{collections::HashMap, fmt, rc::Rc};

use canopy_proto::{Descriptor, NodeKey};
use serde::{Deserialize, Serialize};

use crate::{
    component::{Cleanup, ComponentDefinition},
    mounted::Mounted,
    state::State,
};

/// Instance identity, `"<ComponentName>-<N>"`.
///
/// `N` comes from a per-runtime counter and is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    fn allocate(name: &str, n: u64) -> Self {
        Self(format!("{name}-{n}"))
    }

    /// String form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One mounted component.
pub struct ComponentInstance {
    pub(crate) id: InstanceId,
    pub(crate) definition: Rc<ComponentDefinition>,
    pub(crate) state: State,
    pub(crate) last_descriptor: Option<Descriptor>,
    pub(crate) mounted: Mounted,
    pub(crate) cleanup: Option<Cleanup>,
    pub(crate) parent: Option<InstanceId>,
}

impl ComponentInstance {
    pub(crate) fn new(
        id: InstanceId,
        definition: Rc<ComponentDefinition>,
        state: State,
        parent: Option<InstanceId>,
    ) -> Self {
        Self {
            id,
            definition,
            state,
            last_descriptor: None,
            mounted: Mounted::Empty,
            cleanup: None,
            parent,
        }
    }

    /// Instance id.
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Component name.
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Component definition.
    pub fn definition(&self) -> &Rc<ComponentDefinition> {
        &self.definition
    }

    /// Current local state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Descriptor produced by the most recent completed render.
    pub fn last_descriptor(&self) -> Option<&Descriptor> {
        self.last_descriptor.as_ref()
    }

    /// Parent instance, `None` for roots.
    pub fn parent(&self) -> Option<&InstanceId> {
        self.parent.as_ref()
    }

    /// Ids of the child instances in document order.
    pub fn child_ids(&self) -> Vec<InstanceId> {
        let mut out = Vec::new();
        self.mounted.collect_instances(&mut out);
        out
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

/// Serializable view of one instance and its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    /// Instance id
    pub id: InstanceId,
    /// Component name
    pub name: String,
    /// Local state
    pub state: State,
    /// Child instances in document order
    pub children: Vec<InstanceSnapshot>,
}

/// Every live instance plus the list of roots and their anchors.
#[derive(Default)]
pub struct InstanceTree {
    instances: HashMap<InstanceId, ComponentInstance>,
    roots: Vec<(InstanceId, NodeKey)>,
    counter: u64,
}

impl InstanceTree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&mut self, name: &str) -> InstanceId {
        self.counter += 1;
        InstanceId::allocate(name, self.counter)
    }

    /// Insert an instance. Roots are recorded with the anchor they were
    /// mounted under.
    pub(crate) fn insert(&mut self, instance: ComponentInstance, anchor: Option<NodeKey>) {
        if let Some(anchor) = anchor {
            self.roots.push((instance.id.clone(), anchor));
        }
        self.instances.insert(instance.id.clone(), instance);
    }

    pub(crate) fn remove(&mut self, id: &InstanceId) -> Option<ComponentInstance> {
        self.roots.retain(|(root, _)| root != id);
        self.instances.remove(id)
    }

    /// Look up an instance.
    pub fn get(&self, id: &InstanceId) -> Option<&ComponentInstance> {
        self.instances.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &InstanceId) -> Option<&mut ComponentInstance> {
        self.instances.get_mut(id)
    }

    /// True if `id` is live.
    pub fn contains(&self, id: &InstanceId) -> bool {
        self.instances.contains_key(id)
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Root ids in mount order.
    pub fn root_ids(&self) -> Vec<InstanceId> {
        self.roots.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Anchor a root was mounted under.
    pub fn anchor(&self, id: &InstanceId) -> Option<NodeKey> {
        self.roots.iter().find(|(root, _)| root == id).map(|(_, anchor)| *anchor)
    }

    /// Roots mounted under `anchor`, in mount order.
    pub fn roots_under(&self, anchor: NodeKey) -> impl Iterator<Item = &InstanceId> {
        self.roots.iter().filter(move |(_, a)| *a == anchor).map(|(id, _)| id)
    }

    /// True if `ancestor` is `id` or one of its ancestors.
    pub fn descends_from(&self, id: &InstanceId, ancestor: &InstanceId) -> bool {
        let mut current = Some(id);
        while let Some(next) = current {
            if next == ancestor {
                return true;
            }
            current = self.get(next).and_then(ComponentInstance::parent);
        }
        false
    }

    /// Surface node at the top of a mounted subtree, following component
    /// slots into their own mounted trees.
    pub fn surface_root(&self, mounted: &Mounted) -> Option<NodeKey> {
        match mounted {
            Mounted::Empty => None,
            Mounted::Text { node, .. } | Mounted::Element { node, .. } => Some(*node),
            Mounted::Component { instance, .. } => {
                self.get(instance).and_then(|child| self.surface_root(&child.mounted))
            },
        }
    }

    /// Snapshot of every root and its descendants.
    pub fn snapshot(&self) -> Vec<InstanceSnapshot> {
        self.roots.iter().filter_map(|(id, _)| self.snapshot_of(id)).collect()
    }

    fn snapshot_of(&self, id: &InstanceId) -> Option<InstanceSnapshot> {
        let instance = self.get(id)?;
        let children = instance
            .child_ids()
            .iter()
            .filter_map(|child| self.snapshot_of(child))
            .collect();
        Some(InstanceSnapshot {
            id: instance.id.clone(),
            name: instance.name().to_string(),
            state: instance.state.clone(),
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str) -> Rc<ComponentDefinition> {
        let render = |_: &State, _: Option<&State>| Descriptor::element("div");
        Rc::new(ComponentDefinition::new(name, State::new(), render))
    }

    fn instance(id: &InstanceId, name: &str, parent: Option<&InstanceId>) -> ComponentInstance {
        ComponentInstance::new(id.clone(), definition(name), State::new(), parent.cloned())
    }

    #[test]
    fn ids_are_never_reused() {
        let mut tree = InstanceTree::new();
        let first = tree.next_id("Counter");
        tree.insert(instance(&first, "Counter", None), Some(NodeKey::ROOT));
        tree.remove(&first);
        let second = tree.next_id("Counter");

        assert_eq!(first.as_str(), "Counter-1");
        assert_eq!(second.as_str(), "Counter-2");
    }

    #[test]
    fn snapshot_follows_mounted_children() {
        let mut tree = InstanceTree::new();
        let parent = tree.next_id("List");
        let child = tree.next_id("Item");

        let mut list = instance(&parent, "List", None);
        list.mounted = Mounted::Element {
            node: NodeKey(1),
            tag: "ul".into(),
            props: Default::default(),
            key: None,
            children: vec![Mounted::Component {
                instance: child.clone(),
                name: "Item".into(),
                key: None,
            }],
        };
        let mut item = instance(&child, "Item", Some(&parent));
        item.mounted = Mounted::Text { node: NodeKey(2), text: "x".into() };
        tree.insert(list, Some(NodeKey::ROOT));
        tree.insert(item, None);

        let snapshot = tree.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].children[0].id, child);
        let slot = Mounted::Component { instance: child.clone(), name: "Item".into(), key: None };
        assert_eq!(tree.surface_root(&slot), Some(NodeKey(2)));
        assert_eq!(tree.roots_under(NodeKey::ROOT).collect::<Vec<_>>(), vec![&parent]);
        assert_eq!(tree.anchor(&parent), Some(NodeKey::ROOT));
        assert!(tree.descends_from(&child, &parent));
        assert!(tree.descends_from(&child, &child));
        assert!(!tree.descends_from(&parent, &child));
    }
}
