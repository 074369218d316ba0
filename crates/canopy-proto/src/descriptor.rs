//! Descriptor model.
//!
//! A [`Descriptor`] is a pure value describing one UI node and its children.
//! Descriptors carry no behavior and no identity beyond structural equality:
//! event handlers are referenced by name and resolved against the component
//! definition that rendered them, which keeps every descriptor tree fully
//! serializable.
//!
//! # Wire shape
//!
//! ```json
//! {
//!   "tag": "button",
//!   "props": { "class": "primary", "onClick": { "$handler": "increment" } },
//!   "children": ["Clicked ", 3, " times", null],
//!   "key": "counter"
//! }
//! ```
//!
//! A component reference uses `{"tag": {"component": "Counter"}}`. Children
//! may be descriptors, strings or numbers (rendered as text), or `null` /
//! booleans (rendered as nothing).

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// Sibling identity used by keyed reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// Numeric key
    Num(i64),
    /// String key
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Num(value)
    }
}

/// What a descriptor renders: a surface element or a registered component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    /// Primitive surface tag, e.g. an element name
    Element(String),
    /// Reference to a registered component definition by name
    Component {
        /// Registered component name
        component: String,
    },
}

impl TagRef {
    /// Element or component name.
    pub fn name(&self) -> &str {
        match self {
            Self::Element(tag) => tag,
            Self::Component { component } => component,
        }
    }

    /// True for component references.
    pub fn is_component(&self) -> bool {
        matches!(self, Self::Component { .. })
    }
}

/// Value of a single descriptor property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    /// Event listener bound to a handler declared on the rendering component
    Handler {
        /// Handler name
        #[serde(rename = "$handler")]
        handler: String,
    },
    /// Opaque value passed through to the surface
    Value(Value),
}

impl PropValue {
    /// Build a handler reference.
    pub fn handler(name: impl Into<String>) -> Self {
        Self::Handler { handler: name.into() }
    }

    /// Handler name, if this property is a listener.
    pub fn as_handler(&self) -> Option<&str> {
        match self {
            Self::Handler { handler } => Some(handler),
            Self::Value(_) => None,
        }
    }

    /// Plain value, if this property is not a listener.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Handler { .. } => None,
            Self::Value(value) => Some(value),
        }
    }

    /// Convert into a state value. Handler references become their name.
    pub fn into_state_value(self) -> Value {
        match self {
            Self::Handler { handler } => Value::String(handler),
            Self::Value(value) => value,
        }
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

/// Property map of a descriptor. Ordered so diffs are deterministic.
pub type Props = BTreeMap<String, PropValue>;

/// One node of intended UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Element tag or component reference
    pub tag: TagRef,
    /// Properties (opaque values and handler references)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: Props,
    /// Ordered children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Child>,
    /// Sibling identity for keyed reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
}

impl Descriptor {
    /// Descriptor for a surface element.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: TagRef::Element(tag.into()),
            props: Props::new(),
            children: Vec::new(),
            key: None,
        }
    }

    /// Descriptor referencing a registered component.
    pub fn component(name: impl Into<String>) -> Self {
        Self {
            tag: TagRef::Component { component: name.into() },
            props: Props::new(),
            children: Vec::new(),
            key: None,
        }
    }

    /// Set a property.
    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Bind an event property to a named handler.
    #[must_use]
    pub fn on(mut self, event: impl Into<String>, handler: impl Into<String>) -> Self {
        self.props.insert(event.into(), PropValue::handler(handler));
        self
    }

    /// Append a child.
    #[must_use]
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children.
    #[must_use]
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Set the sibling key.
    #[must_use]
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Child slot of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Child {
    /// Nested descriptor
    Node(Descriptor),
    /// Text content (numbers are coerced to text)
    Text(String),
    /// Absent marker, renders nothing
    Empty,
}

impl Child {
    /// Text child.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Key of a descriptor child. Text and absent children carry no key.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Self::Node(descriptor) => descriptor.key.as_ref(),
            Self::Text(_) | Self::Empty => None,
        }
    }
}

impl From<Descriptor> for Child {
    fn from(value: Descriptor) -> Self {
        Self::Node(value)
    }
}

impl From<Option<Descriptor>> for Child {
    fn from(value: Option<Descriptor>) -> Self {
        value.map_or(Self::Empty, Self::Node)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Self::Text(value.to_string())
    }
}

/// Accepted wire forms of a child before coercion.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawChild {
    Node(Descriptor),
    Text(String),
    Number(Number),
    Flag(bool),
    Absent,
}

impl From<RawChild> for Child {
    fn from(raw: RawChild) -> Self {
        match raw {
            RawChild::Node(descriptor) => Self::Node(descriptor),
            RawChild::Text(text) => Self::Text(text),
            RawChild::Number(number) => Self::Text(number.to_string()),
            RawChild::Flag(_) | RawChild::Absent => Self::Empty,
        }
    }
}

impl<'de> Deserialize<'de> for Child {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawChild::deserialize(deserializer).map(Self::from)
    }
}
