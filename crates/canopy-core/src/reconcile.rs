//! Tree reconciliation.
//!
//! Walks a descriptor against the [`Mounted`] record of the previous render
//! and queues the patches that turn one into the other. Component slots are
//! not diffed here: a matching component gets its props forwarded as a
//! state partial and runs its own update pass.
//!
//! Sibling lists are matched by key when every child on both sides is keyed
//! and the new keys are unique, and by position otherwise.
//!
//! A nested component pass that fails is contained to its slot: the slot
//! keeps whatever the child left on the surface (nothing, for a failed
//! mount), the walk carries on, and the first such failure is reported once
//! the enclosing pass has recorded its tree.

use std::collections::HashMap;

use canopy_proto::{Child, Descriptor, Key, NodeKey, Patch, Props, TagRef};
use tracing::{debug, trace, warn};

use crate::{
    diff::{KeyMode, diff_props, key_mode, props_to_state},
    error::RuntimeError,
    instance::InstanceId,
    mounted::Mounted,
    runtime::{Origin, Runtime},
};

/// Where a newly created subtree goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Insert into `parent` at `index`
    At {
        /// Parent node
        parent: NodeKey,
        /// Position among the parent's children
        index: usize,
    },
    /// Take the position of `old`
    Replacing {
        /// Node being replaced
        old: NodeKey,
    },
    /// Position not known while the enclosing component is reconciling.
    /// Nothing is created.
    Unplaced,
}

impl Runtime {
    fn alloc_node(&mut self) -> NodeKey {
        self.next_node += 1;
        NodeKey(self.next_node)
    }

    fn queue(&mut self, owner: &InstanceId, patch: Patch) {
        trace!(%patch, %owner, "queue patch");
        self.pending.push((patch, owner.clone()));
    }

    /// Remember the first failure of a nested component pass.
    fn contain(&mut self, err: RuntimeError) {
        debug!(%err, "nested component pass failed");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    /// Fail with `UnknownComponent` if `descriptor` names a component that
    /// is not registered. Component slots are not descended into.
    pub(crate) fn check_references(&self, descriptor: &Descriptor) -> Result<(), RuntimeError> {
        match &descriptor.tag {
            TagRef::Component { component } if !self.registry.contains(component) => {
                Err(RuntimeError::UnknownComponent { name: component.clone() })
            },
            TagRef::Component { .. } => Ok(()),
            TagRef::Element(_) => descriptor
                .children
                .iter()
                .filter_map(|child| match child {
                    Child::Node(nested) => Some(nested),
                    Child::Text(_) | Child::Empty => None,
                })
                .try_for_each(|nested| self.check_references(nested)),
        }
    }

    /// Where the top of `id`'s output belongs on the surface, worked out from
    /// the live tree. `Unplaced` while the parent is reconciling.
    pub(crate) fn placement_of(&self, id: &InstanceId) -> Placement {
        let Some(instance) = self.tree.get(id) else {
            return Placement::Unplaced;
        };
        let Some(parent) = instance.parent() else {
            return match self.tree.anchor(id) {
                Some(anchor) => {
                    Placement::At { parent: anchor, index: self.root_index(anchor, Some(id)) }
                },
                None => Placement::Unplaced,
            };
        };
        if self.rendering.contains(parent) {
            return Placement::Unplaced;
        }
        match self.tree.get(parent).map(|parent| &parent.mounted) {
            Some(Mounted::Component { instance, .. }) if instance == id => {
                self.placement_of(parent)
            },
            Some(mounted) => self.slot_in(mounted, id).unwrap_or(Placement::Unplaced),
            None => Placement::Unplaced,
        }
    }

    /// Surface nodes taken by the roots under `anchor` that precede `id`, or
    /// by all of them.
    pub(crate) fn root_index(&self, anchor: NodeKey, id: Option<&InstanceId>) -> usize {
        self.tree
            .roots_under(anchor)
            .take_while(|root| Some(*root) != id)
            .filter_map(|root| self.tree.get(root))
            .filter(|root| self.tree.surface_root(&root.mounted).is_some())
            .count()
    }

    fn slot_in(&self, mounted: &Mounted, id: &InstanceId) -> Option<Placement> {
        let Mounted::Element { node, children, .. } = mounted else {
            return None;
        };
        let mut index = 0;
        for child in children {
            match child {
                Mounted::Component { instance, .. } if instance == id => {
                    return Some(Placement::At { parent: *node, index });
                },
                Mounted::Element { .. } => {
                    if let Some(found) = self.slot_in(child, id) {
                        return Some(found);
                    }
                },
                Mounted::Empty | Mounted::Text { .. } | Mounted::Component { .. } => {},
            }
            index += self.node_count(child);
        }
        None
    }

    /// Reconcile one slot.
    pub(crate) fn reconcile(
        &mut self,
        owner: &InstanceId,
        old: Mounted,
        new: &Child,
        place: Placement,
    ) -> Result<Mounted, RuntimeError> {
        match (old, new) {
            (Mounted::Empty, Child::Empty) => Ok(Mounted::Empty),
            (old, Child::Empty) => {
                self.teardown(owner, old, false)?;
                Ok(Mounted::Empty)
            },
            (Mounted::Empty, new) => self.create(owner, new, place),
            (Mounted::Text { node, text }, Child::Text(next)) => {
                if text != *next {
                    self.queue(owner, Patch::SetText { node, text: next.clone() });
                }
                Ok(Mounted::Text { node, text: next.clone() })
            },
            (Mounted::Element { node, tag, props, children, .. }, Child::Node(descriptor))
                if same_element(descriptor, &tag) =>
            {
                for patch in diff_props(node, &props, &descriptor.props) {
                    self.queue(owner, patch);
                }
                let children =
                    self.reconcile_children(owner, node, children, &descriptor.children)?;
                Ok(Mounted::Element {
                    node,
                    tag,
                    props: descriptor.props.clone(),
                    key: descriptor.key.clone(),
                    children,
                })
            },
            (Mounted::Component { instance, .. }, new) if !self.tree.contains(&instance) => {
                self.create(owner, new, place)
            },
            (Mounted::Component { instance, name, .. }, Child::Node(descriptor))
                if same_component(descriptor, &name) =>
            {
                let partial = props_to_state(&descriptor.props);
                let updated =
                    self.update_pass(&instance, Some(&partial), Origin::Local, Some(place));
                if let Err(err) = updated {
                    self.contain(err);
                }
                if !self.tree.contains(&instance) {
                    return Ok(Mounted::Empty);
                }
                Ok(Mounted::Component { instance, name, key: descriptor.key.clone() })
            },
            (old, new) => self.replace(owner, old, new, place),
        }
    }

    /// Tear down `old` and create `new` in its position. If nothing ends up
    /// taking the old node's place, the old node is removed.
    fn replace(
        &mut self,
        owner: &InstanceId,
        old: Mounted,
        new: &Child,
        place: Placement,
    ) -> Result<Mounted, RuntimeError> {
        let old_root = self.tree.surface_root(&old);
        self.teardown(owner, old, old_root.is_some())?;
        let Some(old_root) = old_root else {
            return self.create(owner, new, place);
        };

        self.replacing.push(old_root);
        let created = self.create(owner, new, Placement::Replacing { old: old_root });
        if let Some(pos) = self.replacing.iter().position(|node| *node == old_root) {
            self.replacing.swap_remove(pos);
            self.queue(owner, Patch::RemoveNode { node: old_root });
        }
        created
    }

    /// Create a subtree from scratch.
    fn create(
        &mut self,
        owner: &InstanceId,
        new: &Child,
        place: Placement,
    ) -> Result<Mounted, RuntimeError> {
        if place == Placement::Unplaced {
            return Ok(Mounted::Empty);
        }
        match new {
            Child::Empty => Ok(Mounted::Empty),
            Child::Text(text) => {
                let node = self.alloc_node();
                self.queue(owner, Patch::CreateText { node, text: text.clone() });
                self.place(owner, node, place);
                Ok(Mounted::Text { node, text: text.clone() })
            },
            Child::Node(descriptor) => match &descriptor.tag {
                TagRef::Element(tag) => self.create_element(owner, tag, descriptor, place),
                TagRef::Component { component } => {
                    let definition = self
                        .registry
                        .get(component)
                        .ok_or_else(|| RuntimeError::UnknownComponent { name: component.clone() })?;
                    let mounted = self.mount_instance(
                        definition,
                        Some(props_to_state(&descriptor.props)),
                        Some(owner.clone()),
                        None,
                        place,
                    );
                    match mounted {
                        Ok(instance) if self.tree.contains(&instance) => Ok(Mounted::Component {
                            instance,
                            name: component.clone(),
                            key: descriptor.key.clone(),
                        }),
                        Ok(_) => Ok(Mounted::Empty),
                        Err(err) => {
                            self.contain(err);
                            Ok(Mounted::Empty)
                        },
                    }
                },
            },
        }
    }

    fn create_element(
        &mut self,
        owner: &InstanceId,
        tag: &str,
        descriptor: &Descriptor,
        place: Placement,
    ) -> Result<Mounted, RuntimeError> {
        let node = self.alloc_node();
        self.queue(owner, Patch::CreateElement { node, tag: tag.to_string() });
        for patch in diff_props(node, &Props::new(), &descriptor.props) {
            self.queue(owner, patch);
        }
        self.place(owner, node, place);

        let mut children = Vec::with_capacity(descriptor.children.len());
        let mut cursor = 0;
        for child in &descriptor.children {
            let mounted = self.create(owner, child, Placement::At { parent: node, index: cursor })?;
            cursor += self.node_count(&mounted);
            children.push(mounted);
        }

        Ok(Mounted::Element {
            node,
            tag: tag.to_string(),
            props: descriptor.props.clone(),
            key: descriptor.key.clone(),
            children,
        })
    }

    fn place(&mut self, owner: &InstanceId, node: NodeKey, place: Placement) {
        match place {
            Placement::At { parent, index } => {
                self.queue(owner, Patch::InsertChild { parent, node, index });
            },
            Placement::Replacing { old } => {
                self.replacing.retain(|pending| *pending != old);
                self.queue(owner, Patch::ReplaceNode { old, node });
            },
            Placement::Unplaced => {},
        }
    }

    /// Surface nodes a slot occupies in its parent: zero or one.
    fn node_count(&self, mounted: &Mounted) -> usize {
        usize::from(self.tree.surface_root(mounted).is_some())
    }

    /// Queue removal of a subtree, children before parents. Component slots
    /// run the full unmount sequence. With `keep_root` the top node is left
    /// for a following `ReplaceNode`.
    pub(crate) fn teardown(
        &mut self,
        owner: &InstanceId,
        mounted: Mounted,
        keep_root: bool,
    ) -> Result<(), RuntimeError> {
        match mounted {
            Mounted::Empty => Ok(()),
            Mounted::Text { node, .. } => {
                if !keep_root {
                    self.queue(owner, Patch::RemoveNode { node });
                }
                Ok(())
            },
            Mounted::Element { node, children, .. } => {
                for child in children {
                    self.teardown(owner, child, false)?;
                }
                if !keep_root {
                    self.queue(owner, Patch::RemoveNode { node });
                }
                Ok(())
            },
            Mounted::Component { instance, .. } if self.tree.contains(&instance) => {
                self.unmount_instance(&instance, keep_root)
            },
            Mounted::Component { .. } => Ok(()),
        }
    }

    fn reconcile_children(
        &mut self,
        owner: &InstanceId,
        parent: NodeKey,
        old: Vec<Mounted>,
        new: &[Child],
    ) -> Result<Vec<Mounted>, RuntimeError> {
        match key_mode(&old, new) {
            KeyMode::Keyed => self.reconcile_keyed(owner, parent, old, new),
            KeyMode::Positional => self.reconcile_positional(owner, parent, old, new),
            KeyMode::Duplicate => {
                warn!(%parent, "duplicate sibling keys, matching children by position");
                self.reconcile_positional(owner, parent, old, new)
            },
        }
    }

    fn reconcile_positional(
        &mut self,
        owner: &InstanceId,
        parent: NodeKey,
        old: Vec<Mounted>,
        new: &[Child],
    ) -> Result<Vec<Mounted>, RuntimeError> {
        let mut old = old.into_iter();
        let mut out = Vec::with_capacity(new.len());
        let mut cursor = 0;

        for child in new {
            let previous = old.next().unwrap_or_default();
            let place = Placement::At { parent, index: cursor };
            let mounted = self.reconcile(owner, previous, child, place)?;
            cursor += self.node_count(&mounted);
            out.push(mounted);
        }
        for leftover in old {
            self.teardown(owner, leftover, false)?;
        }
        Ok(out)
    }

    /// Keyed matching: remove vanished keys, reorder survivors once if their
    /// relative order changed, then walk the new list updating survivors in
    /// place and inserting new keys at their final index.
    fn reconcile_keyed(
        &mut self,
        owner: &InstanceId,
        parent: NodeKey,
        old: Vec<Mounted>,
        new: &[Child],
    ) -> Result<Vec<Mounted>, RuntimeError> {
        let wanted: HashMap<&Key, usize> = new
            .iter()
            .enumerate()
            .filter_map(|(i, child)| child.key().map(|key| (key, i)))
            .collect();

        let mut survivors: HashMap<Key, Mounted> = HashMap::with_capacity(old.len());
        let mut old_order = Vec::with_capacity(old.len());
        for mounted in old {
            match mounted.key().filter(|key| wanted.contains_key(key)).cloned() {
                Some(key) => {
                    old_order.extend(self.tree.surface_root(&mounted));
                    survivors.insert(key, mounted);
                },
                None => self.teardown(owner, mounted, false)?,
            }
        }

        let new_order: Vec<NodeKey> = new
            .iter()
            .filter_map(Child::key)
            .filter_map(|key| survivors.get(key))
            .filter_map(|mounted| self.tree.surface_root(mounted))
            .collect();
        if new_order != old_order {
            self.queue(owner, Patch::ReorderChildren { parent, order: new_order });
        }

        let mut out = Vec::with_capacity(new.len());
        let mut cursor = 0;
        for child in new {
            let place = Placement::At { parent, index: cursor };
            let mounted = match child.key().and_then(|key| survivors.remove(key)) {
                Some(previous) => self.reconcile(owner, previous, child, place)?,
                None => self.create(owner, child, place)?,
            };
            cursor += self.node_count(&mounted);
            out.push(mounted);
        }
        Ok(out)
    }
}

fn same_element(descriptor: &Descriptor, tag: &str) -> bool {
    matches!(&descriptor.tag, TagRef::Element(next) if next == tag)
}

fn same_component(descriptor: &Descriptor, name: &str) -> bool {
    matches!(&descriptor.tag, TagRef::Component { component } if component == name)
}
