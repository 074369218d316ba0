//! Record of what a component's last render put on the surface.
//!
//! Each instance keeps the `Mounted` tree of its last render. It mirrors the
//! descriptor tree, with surface node keys on element and text slots and
//! instance ids on component slots. Reconciliation diffs the next
//! descriptor against this record instead of against the previous
//! descriptor, so it never has to ask the surface what is there.

use canopy_proto::{Key, NodeKey, Props};

use crate::instance::InstanceId;

/// One slot of a mounted tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Mounted {
    /// Nothing rendered
    #[default]
    Empty,
    /// Text node
    Text {
        /// Surface node
        node: NodeKey,
        /// Current content
        text: String,
    },
    /// Element node and its children
    Element {
        /// Surface node
        node: NodeKey,
        /// Element tag
        tag: String,
        /// Properties as last applied
        props: Props,
        /// Sibling key
        key: Option<Key>,
        /// Child slots
        children: Vec<Mounted>,
    },
    /// Nested component instance
    Component {
        /// Child instance
        instance: InstanceId,
        /// Component name
        name: String,
        /// Sibling key
        key: Option<Key>,
    },
}

impl Mounted {
    /// Sibling key of this slot.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Self::Element { key, .. } | Self::Component { key, .. } => key.as_ref(),
            Self::Empty | Self::Text { .. } => None,
        }
    }

    /// Collect component instance ids in document order. Does not descend
    /// into the child instances themselves.
    pub fn collect_instances(&self, out: &mut Vec<InstanceId>) {
        match self {
            Self::Component { instance, .. } => out.push(instance.clone()),
            Self::Element { children, .. } => {
                for child in children {
                    child.collect_instances(out);
                }
            },
            Self::Empty | Self::Text { .. } => {},
        }
    }

    /// Turn the slot holding `id` into `Empty`. Returns true if found.
    pub fn detach_instance(&mut self, id: &InstanceId) -> bool {
        match self {
            Self::Component { instance, .. } if *instance == *id => {
                *self = Self::Empty;
                true
            },
            Self::Element { children, .. } => {
                children.iter_mut().any(|child| child.detach_instance(id))
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detach_clears_nested_slot() {
        let id = InstanceId::from("Item-3");
        let mut mounted = Mounted::Element {
            node: NodeKey(1),
            tag: "ul".into(),
            props: Props::new(),
            key: None,
            children: vec![
                Mounted::Text { node: NodeKey(2), text: "a".into() },
                Mounted::Component {
                    instance: id.clone(),
                    name: "Item".into(),
                    key: Some("x".into()),
                },
            ],
        };

        assert!(mounted.detach_instance(&id));
        assert!(!mounted.detach_instance(&id));

        let mut ids = Vec::new();
        mounted.collect_instances(&mut ids);
        assert!(ids.is_empty());
    }
}
