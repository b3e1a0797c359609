//! Data Observation
//!
//! Observing a value walks its object graph depth-first and gives every
//! stored field its own change source. From then on reads of those fields are
//! tracked and writes notify.
//!
//! Primitives, arrays and functions are left alone. Objects reachable more
//! than once (shared or cyclic) are instrumented once; a second walk over an
//! already observed object keeps the existing change sources.

use std::collections::HashSet;

use tracing::trace;

use super::object::ObjectId;
use crate::value::Value;

/// Instrument `value` and everything reachable from it.
pub fn observe(value: &Value) {
    let mut observer = Observer::default();
    observer.walk(value);
    if !observer.visited.is_empty() {
        trace!(objects = observer.visited.len(), "observed");
    }
}

#[derive(Default)]
struct Observer {
    visited: HashSet<ObjectId>,
}

impl Observer {
    fn walk(&mut self, value: &Value) {
        let Value::Object(object) = value else {
            return;
        };
        if !self.visited.insert(object.id()) {
            return;
        }

        for child in object.instrument() {
            self.walk(&child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Object;

    #[test]
    fn primitives_are_ignored() {
        observe(&Value::from(1));
        observe(&Value::Null);
        observe(&Value::from(vec![Value::from(Object::new().with("a", 1))]));
    }

    #[test]
    fn nested_objects_are_instrumented() {
        let inner = Object::new().with("name", "x");
        let root = Object::new().with("user", inner.clone()).with("n", 1);

        observe(&Value::from(root.clone()));

        assert!(root.is_observed());
        assert!(inner.is_observed());
        assert!(root.source("user").is_some());
        assert!(root.source("n").is_some());
        assert!(inner.source("name").is_some());
    }

    #[test]
    fn cyclic_graph_terminates() {
        let a = Object::new().with("n", 1);
        let b = Object::new().with("a", a.clone());
        a.insert("b", b.clone()).unwrap();

        observe(&Value::from(a.clone()));

        assert!(a.is_observed());
        assert!(b.is_observed());
        assert!(a.source("b").is_some());
        assert!(b.source("a").is_some());
    }

    #[test]
    fn arrays_are_opaque() {
        let element = Object::new().with("x", 1);
        let root = Object::new().with("list", vec![Value::from(element.clone())]);

        observe(&Value::from(root.clone()));

        assert!(root.source("list").is_some());
        assert!(!element.is_observed());
    }
}
