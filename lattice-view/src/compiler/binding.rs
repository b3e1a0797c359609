//! Binding records.
//!
//! A binding ties one node and one expression to the watchers that keep the
//! node current and, for event-driven directives, to a listener switch.
//! Listeners cannot be removed from a host node, so teardown turns the switch
//! off instead; a switched-off listener returns without doing anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use super::directive::DirectiveKind;
use crate::dom::NodeId;
use crate::reactive::Watcher;

#[derive(Debug, Clone)]
pub struct Binding {
    node: NodeId,
    kind: DirectiveKind,
    expression: String,
    watchers: SmallVec<[Watcher; 1]>,
    active: Arc<AtomicBool>,
}

impl Binding {
    pub fn new(node: NodeId, kind: DirectiveKind, expression: impl Into<String>) -> Self {
        Self {
            node,
            kind,
            expression: expression.into(),
            watchers: SmallVec::new(),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn push(&mut self, watcher: Watcher) {
        self.watchers.push(watcher);
    }

    /// Switch to check at the top of every listener this binding installs.
    pub fn switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> DirectiveKind {
        self.kind
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn watchers(&self) -> &[Watcher] {
        &self.watchers
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Remove every watcher from its change sources and silence listeners.
    pub fn teardown(&self) {
        self.active.store(false, Ordering::SeqCst);
        for watcher in &self.watchers {
            watcher.teardown();
        }
        trace!(node = %self.node, kind = %self.kind, expression = %self.expression, "binding torn down");
    }
}
