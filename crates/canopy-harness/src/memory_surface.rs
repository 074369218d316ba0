//! In-memory render surface.
//!
//! A strict surface that checks every patch against the ordering contract
//! (parent-first creation, child-first removal, detached replacements) and
//! rejects violations with a [`SurfaceError`] instead of papering over them.
//! Clones share the same tree, so a test keeps one handle while the runtime
//! owns the other.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Write as _,
    rc::Rc,
};

use canopy_core::{Surface, SurfaceError};
use canopy_proto::{NodeKey, Patch};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        props: BTreeMap<String, Value>,
        listeners: BTreeMap<String, String>,
        children: Vec<NodeKey>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeKey>,
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<NodeKey, Node>,
    log: Vec<Patch>,
}

impl Tree {
    fn new() -> Self {
        let root = Node {
            data: NodeData::Element {
                tag: "root".into(),
                props: BTreeMap::new(),
                listeners: BTreeMap::new(),
                children: Vec::new(),
            },
            parent: None,
        };
        Self { nodes: HashMap::from([(NodeKey::ROOT, root)]), log: Vec::new() }
    }

    fn node(&self, key: NodeKey) -> Result<&Node, SurfaceError> {
        self.nodes.get(&key).ok_or(SurfaceError::UnknownNode(key))
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut Node, SurfaceError> {
        self.nodes.get_mut(&key).ok_or(SurfaceError::UnknownNode(key))
    }

    fn children(&self, key: NodeKey) -> Result<&Vec<NodeKey>, SurfaceError> {
        match &self.node(key)?.data {
            NodeData::Element { children, .. } => Ok(children),
            NodeData::Text(_) => Err(SurfaceError::NotElement(key)),
        }
    }

    fn children_mut(&mut self, key: NodeKey) -> Result<&mut Vec<NodeKey>, SurfaceError> {
        match &mut self.node_mut(key)?.data {
            NodeData::Element { children, .. } => Ok(children),
            NodeData::Text(_) => Err(SurfaceError::NotElement(key)),
        }
    }

    fn create(&mut self, key: NodeKey, data: NodeData) -> Result<(), SurfaceError> {
        if self.nodes.contains_key(&key) {
            return Err(SurfaceError::DuplicateNode(key));
        }
        self.nodes.insert(key, Node { data, parent: None });
        Ok(())
    }

    fn ensure_leaf(&self, key: NodeKey) -> Result<(), SurfaceError> {
        match &self.node(key)?.data {
            NodeData::Element { children, .. } if !children.is_empty() => {
                Err(SurfaceError::HasChildren(key))
            },
            _ => Ok(()),
        }
    }

    fn detach(&mut self, key: NodeKey) -> Result<Option<(NodeKey, usize)>, SurfaceError> {
        let Some(parent) = self.node(key)?.parent else {
            return Ok(None);
        };
        let siblings = self.children_mut(parent)?;
        let index = siblings
            .iter()
            .position(|child| *child == key)
            .ok_or(SurfaceError::UnknownNode(key))?;
        siblings.remove(index);
        self.node_mut(key)?.parent = None;
        Ok(Some((parent, index)))
    }

    fn apply(&mut self, patch: &Patch) -> Result<(), SurfaceError> {
        match patch {
            Patch::CreateElement { node, tag } => self.create(*node, NodeData::Element {
                tag: tag.clone(),
                props: BTreeMap::new(),
                listeners: BTreeMap::new(),
                children: Vec::new(),
            }),
            Patch::CreateText { node, text } => self.create(*node, NodeData::Text(text.clone())),
            Patch::InsertChild { parent, node, index } => {
                if self.node(*node)?.parent.is_some() {
                    return Err(SurfaceError::AlreadyAttached(*node));
                }
                let len = self.children(*parent)?.len();
                if *index > len {
                    return Err(SurfaceError::IndexOutOfBounds {
                        parent: *parent,
                        index: *index,
                        len,
                    });
                }
                self.children_mut(*parent)?.insert(*index, *node);
                self.node_mut(*node)?.parent = Some(*parent);
                Ok(())
            },
            Patch::RemoveNode { node } => {
                self.ensure_leaf(*node)?;
                self.detach(*node)?;
                self.nodes.remove(node);
                Ok(())
            },
            Patch::ReplaceNode { old, node } => {
                self.ensure_leaf(*old)?;
                if self.node(*node)?.parent.is_some() {
                    return Err(SurfaceError::AlreadyAttached(*node));
                }
                if let Some((parent, index)) = self.detach(*old)? {
                    self.children_mut(parent)?.insert(index, *node);
                    self.node_mut(*node)?.parent = Some(parent);
                }
                self.nodes.remove(old);
                Ok(())
            },
            Patch::SetProp { node, name, value } => {
                self.element_mut(*node)?.0.insert(name.clone(), value.clone());
                Ok(())
            },
            Patch::RemoveProp { node, name } => {
                self.element_mut(*node)?.0.remove(name);
                Ok(())
            },
            Patch::AttachListener { node, event, handler } => {
                self.element_mut(*node)?.1.insert(event.clone(), handler.clone());
                Ok(())
            },
            Patch::DetachListener { node, event } => {
                self.element_mut(*node)?.1.remove(event);
                Ok(())
            },
            Patch::ReorderChildren { parent, order } => {
                let current: HashSet<&NodeKey> = self.children(*parent)?.iter().collect();
                let wanted: HashSet<&NodeKey> = order.iter().collect();
                if current != wanted || wanted.len() != order.len() {
                    return Err(SurfaceError::ReorderMismatch(*parent));
                }
                *self.children_mut(*parent)? = order.clone();
                Ok(())
            },
            Patch::SetText { node, text } => match &mut self.node_mut(*node)?.data {
                NodeData::Text(current) => {
                    current.clone_from(text);
                    Ok(())
                },
                NodeData::Element { .. } => Err(SurfaceError::NotText(*node)),
            },
        }
    }

    fn element_mut(
        &mut self,
        key: NodeKey,
    ) -> Result<(&mut BTreeMap<String, Value>, &mut BTreeMap<String, String>), SurfaceError> {
        match &mut self.node_mut(key)?.data {
            NodeData::Element { props, listeners, .. } => Ok((props, listeners)),
            NodeData::Text(_) => Err(SurfaceError::NotElement(key)),
        }
    }

    fn render_into(&self, key: NodeKey, out: &mut String) {
        let Some(node) = self.nodes.get(&key) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { tag, props, listeners, children } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in props {
                    let _ = write!(out, " {name}={value}");
                }
                for (event, handler) in listeners {
                    let _ = write!(out, " @{event}={handler}");
                }
                out.push('>');
                for child in children {
                    self.render_into(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            },
        }
    }
}

/// Shared in-memory surface.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    tree: Rc<RefCell<Tree>>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    /// Surface holding only the root container.
    pub fn new() -> Self {
        Self { tree: Rc::new(RefCell::new(Tree::new())) }
    }

    /// Markup of everything attached under the root, e.g.
    /// `<div class="counter"><span>0</span></div>`.
    pub fn render(&self) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        if let Ok(children) = tree.children(NodeKey::ROOT) {
            for child in children {
                tree.render_into(*child, &mut out);
            }
        }
        out
    }

    /// Markup of one node and its descendants.
    pub fn render_node(&self, key: NodeKey) -> Option<String> {
        let tree = self.tree.borrow();
        tree.nodes.contains_key(&key).then(|| {
            let mut out = String::new();
            tree.render_into(key, &mut out);
            out
        })
    }

    /// Patches applied since the last [`take_log`](Self::take_log).
    pub fn patches(&self) -> Vec<Patch> {
        self.tree.borrow().log.clone()
    }

    /// Applied patches since the last call, rendered one per line.
    pub fn take_log(&self) -> Vec<String> {
        self.tree.borrow_mut().log.drain(..).map(|patch| patch.to_string()).collect()
    }

    /// Number of live nodes, the root excluded.
    pub fn node_count(&self) -> usize {
        self.tree.borrow().nodes.len() - 1
    }

    /// Live nodes not reachable from the root.
    pub fn detached_nodes(&self) -> Vec<NodeKey> {
        let tree = self.tree.borrow();
        let mut reachable = HashSet::new();
        let mut stack = vec![NodeKey::ROOT];
        while let Some(key) = stack.pop() {
            reachable.insert(key);
            if let Ok(children) = tree.children(key) {
                stack.extend(children.iter().copied());
            }
        }
        let mut detached: Vec<NodeKey> =
            tree.nodes.keys().filter(|key| !reachable.contains(key)).copied().collect();
        detached.sort();
        detached
    }

    /// Children of `key` in order.
    pub fn children(&self, key: NodeKey) -> Vec<NodeKey> {
        self.tree.borrow().children(key).cloned().unwrap_or_default()
    }

    /// Elements with `tag`, in document order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeKey> {
        let tree = self.tree.borrow();
        let mut found = Vec::new();
        let mut stack = vec![NodeKey::ROOT];
        while let Some(key) = stack.pop() {
            if let Some(Node { data: NodeData::Element { tag: node_tag, children, .. }, .. }) =
                tree.nodes.get(&key)
            {
                if node_tag == tag {
                    found.push(key);
                }
                stack.extend(children.iter().rev().copied());
            }
        }
        found
    }

    /// Content of a text node.
    pub fn text(&self, key: NodeKey) -> Option<String> {
        match &self.tree.borrow().nodes.get(&key)?.data {
            NodeData::Text(text) => Some(text.clone()),
            NodeData::Element { .. } => None,
        }
    }

    /// Property value on an element.
    pub fn prop(&self, key: NodeKey, name: &str) -> Option<Value> {
        match &self.tree.borrow().nodes.get(&key)?.data {
            NodeData::Element { props, .. } => props.get(name).cloned(),
            NodeData::Text(_) => None,
        }
    }

    /// Handler name bound to `event` on an element.
    pub fn listener(&self, key: NodeKey, event: &str) -> Option<String> {
        match &self.tree.borrow().nodes.get(&key)?.data {
            NodeData::Element { listeners, .. } => listeners.get(event).cloned(),
            NodeData::Text(_) => None,
        }
    }
}

impl Surface for MemorySurface {
    fn apply(&mut self, patch: &Patch) -> Result<(), SurfaceError> {
        let mut tree = self.tree.borrow_mut();
        if let Err(err) = tree.apply(patch) {
            debug!(%patch, %err, "surface rejected patch");
            return Err(err);
        }
        tree.log.push(patch.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn apply_all(surface: &mut MemorySurface, patches: &[Patch]) -> Result<(), SurfaceError> {
        patches.iter().try_for_each(|patch| surface.apply(patch))
    }

    fn list() -> Vec<Patch> {
        vec![
            Patch::CreateElement { node: NodeKey(1), tag: "ul".into() },
            Patch::SetProp { node: NodeKey(1), name: "class".into(), value: json!("todo") },
            Patch::InsertChild { parent: NodeKey::ROOT, node: NodeKey(1), index: 0 },
            Patch::CreateElement { node: NodeKey(2), tag: "li".into() },
            Patch::InsertChild { parent: NodeKey(1), node: NodeKey(2), index: 0 },
            Patch::CreateText { node: NodeKey(3), text: "a".into() },
            Patch::InsertChild { parent: NodeKey(2), node: NodeKey(3), index: 0 },
            Patch::CreateElement { node: NodeKey(4), tag: "li".into() },
            Patch::AttachListener {
                node: NodeKey(4),
                event: "onClick".into(),
                handler: "pick".into(),
            },
            Patch::InsertChild { parent: NodeKey(1), node: NodeKey(4), index: 1 },
        ]
    }

    #[test]
    fn renders_markup() {
        let mut surface = MemorySurface::new();
        apply_all(&mut surface, &list()).unwrap();

        insta::assert_snapshot!(
            surface.render(),
            @r#"<ul class="todo"><li>a</li><li @onClick=pick></li></ul>"#
        );
        assert_eq!(surface.find_by_tag("li"), vec![NodeKey(2), NodeKey(4)]);
        assert_eq!(surface.node_count(), 4);
    }

    #[test]
    fn reorder_and_replace() {
        let mut surface = MemorySurface::new();
        apply_all(&mut surface, &list()).unwrap();

        apply_all(&mut surface, &[
            Patch::ReorderChildren { parent: NodeKey(1), order: vec![NodeKey(4), NodeKey(2)] },
            Patch::CreateElement { node: NodeKey(5), tag: "hr".into() },
            Patch::ReplaceNode { old: NodeKey(4), node: NodeKey(5) },
        ])
        .unwrap();

        assert_eq!(surface.render(), r#"<ul class="todo"><hr></hr><li>a</li></ul>"#);
        assert!(surface.detached_nodes().is_empty());
    }

    #[test]
    fn ordering_violations_are_rejected() {
        let mut surface = MemorySurface::new();
        apply_all(&mut surface, &list()).unwrap();

        assert_eq!(
            surface.apply(&Patch::RemoveNode { node: NodeKey(2) }),
            Err(SurfaceError::HasChildren(NodeKey(2)))
        );
        assert_eq!(
            surface.apply(&Patch::InsertChild { parent: NodeKey(1), node: NodeKey(2), index: 0 }),
            Err(SurfaceError::AlreadyAttached(NodeKey(2)))
        );
        assert_eq!(
            surface.apply(&Patch::ReorderChildren { parent: NodeKey(1), order: vec![NodeKey(2)] }),
            Err(SurfaceError::ReorderMismatch(NodeKey(1)))
        );
        assert_eq!(
            surface.apply(&Patch::SetText { node: NodeKey(2), text: "x".into() }),
            Err(SurfaceError::NotText(NodeKey(2)))
        );
        assert_eq!(
            surface.apply(&Patch::CreateText { node: NodeKey(3), text: "dup".into() }),
            Err(SurfaceError::DuplicateNode(NodeKey(3)))
        );
        assert_eq!(surface.patches().len(), list().len());
    }
}
