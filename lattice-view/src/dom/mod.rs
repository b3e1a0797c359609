//! Host Tree Abstraction
//!
//! The compiler never touches a concrete document. It works against the
//! [`Node`] capability trait: kind discrimination, ordered children,
//! attributes, the three settable content properties (value, rich content,
//! plain text) and event listeners.
//!
//! [`memory`] provides an in-memory implementation for tests and for
//! embedders without a real document.

pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

/// Unique identifier for a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

pub type NodeRef = Arc<dyn Node>;

/// Event callback registered on a node.
pub type Listener = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What the compiler needs from a host node.
///
/// Setters take `&self`; implementations use interior mutability.
pub trait Node: Send + Sync {
    fn id(&self) -> NodeId;

    fn kind(&self) -> NodeKind;

    /// Tag name for elements, `#text` for text nodes.
    fn node_name(&self) -> String;

    fn children(&self) -> Vec<NodeRef>;

    fn attributes(&self) -> Vec<Attribute>;

    fn text_content(&self) -> String;

    fn set_text_content(&self, text: &str);

    /// The form-control value.
    fn value(&self) -> Value;

    fn set_value(&self, value: Value);

    fn set_inner_html(&self, html: &str);

    fn add_event_listener(&self, event: &str, listener: Listener);

    /// Detach and return every child, in order.
    fn take_children(&self) -> Vec<NodeRef>;

    fn append_children(&self, children: Vec<NodeRef>);
}

impl fmt::Debug for dyn Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.node_name(), self.id())
    }
}

/// Payload handed to listeners.
#[derive(Clone)]
pub struct Event {
    name: String,
    target: NodeRef,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeRef) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &NodeRef {
        &self.target
    }

    /// The triggering node's current value.
    pub fn value(&self) -> Value {
        self.target.value()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("target", &self.target.id())
            .finish()
    }
}

/// Selector lookup.
pub trait Document: Send + Sync {
    fn query_selector(&self, selector: &str) -> Option<NodeRef>;
}

/// Where a view model mounts: a node, or a selector resolved against a
/// document.
#[derive(Clone)]
pub enum Target {
    Node(NodeRef),
    Selector(String),
}

impl Target {
    pub fn resolve(&self, document: Option<&dyn Document>) -> Result<NodeRef> {
        match self {
            Target::Node(node) => Ok(node.clone()),
            Target::Selector(selector) => document
                .and_then(|doc| doc.query_selector(selector))
                .ok_or_else(|| Error::TargetNotFound(selector.clone())),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node(node) => write!(f, "Target::Node({:?})", node),
            Target::Selector(selector) => write!(f, "Target::Selector({selector:?})"),
        }
    }
}

impl From<NodeRef> for Target {
    fn from(node: NodeRef) -> Self {
        Target::Node(node)
    }
}

impl From<Arc<memory::Element>> for Target {
    fn from(node: Arc<memory::Element>) -> Self {
        Target::Node(node)
    }
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Target::Selector(selector.to_string())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Target::Selector(selector)
    }
}
