//! In-memory host tree.
//!
//! ```rust,ignore
//! let app = Element::new("div")
//!     .attr("id", "app")
//!     .child(Element::new("input").attr("v-model", "user.name"))
//!     .text("Hello {{ user.name }}");
//! ```

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::{Attribute, Document, Event, Listener, Node, NodeId, NodeKind, NodeRef};
use crate::error::{Error, Result};
use crate::value::Value;

pub struct Element {
    id: NodeId,
    tag: String,
    this: Weak<Element>,
    state: Mutex<ElementState>,
}

#[derive(Default)]
struct ElementState {
    attributes: IndexMap<String, String>,
    children: Vec<NodeRef>,
    value: Value,
    /// Set by `set_inner_html`; replaces the children when rendering.
    inner_html: Option<String>,
    listeners: IndexMap<String, SmallVec<[Listener; 2]>>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Arc<Self> {
        let tag = tag.into();
        Arc::new_cyclic(|this| Self {
            id: NodeId::new(),
            tag,
            this: this.clone(),
            state: Mutex::new(ElementState::default()),
        })
    }

    pub fn attr(self: Arc<Self>, name: impl Into<String>, value: impl Into<String>) -> Arc<Self> {
        self.state.lock().attributes.insert(name.into(), value.into());
        self
    }

    pub fn child(self: Arc<Self>, child: NodeRef) -> Arc<Self> {
        self.state.lock().children.push(child);
        self
    }

    pub fn text(self: Arc<Self>, content: impl Into<String>) -> Arc<Self> {
        self.child(Text::new(content))
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.state.lock().attributes.get(name).cloned()
    }

    pub fn inner_html(&self) -> Option<String> {
        self.state.lock().inner_html.clone()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state.lock().listeners.get(event).map_or(0, |l| l.len())
    }

    /// Run every listener for `event`, in registration order.
    ///
    /// All listeners run even if some fail; failures are returned together.
    pub fn dispatch(&self, event: &str) -> Result<()> {
        let listeners: SmallVec<[Listener; 2]> = self
            .state
            .lock()
            .listeners
            .get(event)
            .cloned()
            .unwrap_or_default();
        let Some(target) = self.this.upgrade() else {
            return Ok(());
        };

        trace!(node = %self.id, event, listeners = listeners.len(), "dispatch");
        let payload = Event::new(event, target);
        let errors = listeners
            .iter()
            .filter_map(|listener| listener(&payload).err())
            .collect();
        Error::collect(errors, Error::Notify)
    }

    /// Simulate user input: set the value, then dispatch `input`.
    pub fn input(&self, value: impl Into<Value>) -> Result<()> {
        self.set_value(value.into());
        self.dispatch("input")
    }
}

impl Node for Element {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn node_name(&self) -> String {
        self.tag.clone()
    }

    fn children(&self) -> Vec<NodeRef> {
        self.state.lock().children.clone()
    }

    fn attributes(&self) -> Vec<Attribute> {
        self.state
            .lock()
            .attributes
            .iter()
            .map(|(name, value)| Attribute::new(name.as_str(), value.as_str()))
            .collect()
    }

    fn text_content(&self) -> String {
        let state = self.state.lock();
        if let Some(html) = &state.inner_html {
            return html.clone();
        }
        state.children.iter().map(|c| c.text_content()).collect()
    }

    fn set_text_content(&self, text: &str) {
        let mut state = self.state.lock();
        state.inner_html = None;
        state.children = vec![Text::new(text) as NodeRef];
    }

    fn value(&self) -> Value {
        self.state.lock().value.clone()
    }

    fn set_value(&self, value: Value) {
        self.state.lock().value = value;
    }

    fn set_inner_html(&self, html: &str) {
        let mut state = self.state.lock();
        state.children.clear();
        state.inner_html = Some(html.to_string());
    }

    fn add_event_listener(&self, event: &str, listener: Listener) {
        self.state
            .lock()
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    fn take_children(&self) -> Vec<NodeRef> {
        std::mem::take(&mut self.state.lock().children)
    }

    fn append_children(&self, children: Vec<NodeRef>) {
        self.state.lock().children.extend(children);
    }
}

pub struct Text {
    id: NodeId,
    content: Mutex<String>,
}

impl Text {
    pub fn new(content: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::new(),
            content: Mutex::new(content.into()),
        })
    }
}

impl Node for Text {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Text
    }

    fn node_name(&self) -> String {
        "#text".to_string()
    }

    fn children(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn attributes(&self) -> Vec<Attribute> {
        Vec::new()
    }

    fn text_content(&self) -> String {
        self.content.lock().clone()
    }

    fn set_text_content(&self, text: &str) {
        *self.content.lock() = text.to_string();
    }

    fn value(&self) -> Value {
        Value::Undefined
    }

    fn set_value(&self, _value: Value) {}

    fn set_inner_html(&self, html: &str) {
        self.set_text_content(html);
    }

    fn add_event_listener(&self, _event: &str, _listener: Listener) {}

    fn take_children(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn append_children(&self, _children: Vec<NodeRef>) {}
}

/// A document rooted at one element. Selectors: `#id` or a tag name.
pub struct MemoryDocument {
    root: NodeRef,
}

impl MemoryDocument {
    pub fn new(root: NodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }
}

impl Document for MemoryDocument {
    fn query_selector(&self, selector: &str) -> Option<NodeRef> {
        let is_match = |node: &NodeRef| match selector.strip_prefix('#') {
            Some(id) => node
                .attributes()
                .iter()
                .any(|attr| attr.name == "id" && attr.value == id),
            None => node.kind() == NodeKind::Element && node.node_name().eq_ignore_ascii_case(selector),
        };

        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            if is_match(&node) {
                return Some(node);
            }
            stack.extend(node.children().into_iter().rev());
        }
        None
    }
}

/// Serialize a subtree, for assertions and debugging.
pub fn to_html(node: &dyn Node) -> String {
    match node.kind() {
        NodeKind::Text => node.text_content(),
        NodeKind::Element => {
            let name = node.node_name();
            let mut out = format!("<{name}");
            for attr in node.attributes() {
                out.push_str(&format!(" {}=\"{}\"", attr.name, attr.value));
            }
            out.push('>');
            let children = node.children();
            if children.is_empty() {
                out.push_str(&node.text_content());
            } else {
                for child in children {
                    out.push_str(&to_html(child.as_ref()));
                }
            }
            out.push_str(&format!("</{name}>"));
            out
        }
    }
}
