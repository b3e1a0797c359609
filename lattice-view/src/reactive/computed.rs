//! Computed Properties
//!
//! A computed property is a getter-only property whose value is produced by a
//! function. Reading it behaves like reading any other observed property: the
//! reader is registered with the computed's own change source.
//!
//! # Memoization
//!
//! When memoized, the computed is itself a subscriber. Its function runs in
//! its own tracking frame, so the properties it reads register the computed
//! rather than the reader. The result is cached until one of those
//! properties changes; then the cache is dropped and the computed's readers
//! are notified, and the next read recomputes.
//!
//! Without memoization the function runs on every read, inside the reader's
//! frame, so the reader subscribes to the underlying properties directly.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::context::Tracker;
use super::source::ChangeSource;
use super::subscriber::{Dependencies, Subscriber, SubscriberId};
use crate::error::Result;
use crate::value::Value;

pub type Getter = dyn Fn() -> Result<Value> + Send + Sync;

#[derive(Clone)]
pub struct Computed {
    inner: Arc<ComputedInner>,
}

struct ComputedInner {
    id: SubscriberId,
    name: String,
    tracker: Tracker,
    getter: Box<Getter>,
    memoize: bool,
    source: ChangeSource,
    /// `None` while dirty.
    cache: Mutex<Option<Value>>,
    deps: Dependencies,
    evaluations: AtomicUsize,
}

impl Computed {
    /// `tracker` is the one the getter's own reads are tracked on.
    pub fn new<F>(name: impl Into<String>, tracker: &Tracker, memoize: bool, getter: F) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ComputedInner {
                id: SubscriberId::new(),
                name: name.into(),
                tracker: tracker.clone(),
                getter: Box::new(getter),
                memoize,
                source: ChangeSource::new(),
                cache: Mutex::new(None),
                deps: Dependencies::default(),
                evaluations: AtomicUsize::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The change source readers register with.
    pub fn source(&self) -> ChangeSource {
        self.inner.source.clone()
    }

    /// Read the value, registering the subscriber evaluating on `reader`.
    pub fn get(&self, reader: &Tracker) -> Result<Value> {
        let inner = &self.inner;
        if !inner.memoize {
            inner.evaluations.fetch_add(1, Ordering::Relaxed);
            return (inner.getter)();
        }

        reader.depend(&inner.source);
        if let Some(value) = inner.cache.lock().clone() {
            return Ok(value);
        }

        let value = inner.evaluate()?;
        *inner.cache.lock() = Some(value.clone());
        Ok(value)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.cache.lock().is_none()
    }

    /// Number of times the getter has run.
    pub fn evaluation_count(&self) -> usize {
        self.inner.evaluations.load(Ordering::Relaxed)
    }
}

impl ComputedInner {
    fn evaluate(self: &Arc<Self>) -> Result<Value> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.deps.begin();
        let result = {
            let _ctx = self.tracker.enter(Arc::clone(self) as Arc<dyn Subscriber>);
            (self.getter)()
        };

        match &result {
            Ok(_) => self.deps.settle(self.id),
            Err(_) => self.deps.merge(),
        }
        result
    }
}

impl Subscriber for ComputedInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn update(self: Arc<Self>) -> Result<()> {
        self.cache.lock().take();
        trace!(computed = %self.name, "invalidated");
        self.source.notify()
    }

    fn track(&self, source: &ChangeSource) {
        self.deps.record(source);
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.inner.name)
            .field("memoize", &self.inner.memoize)
            .field("dirty", &self.is_dirty())
            .field("evaluations", &self.evaluation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Object, Watcher};

    fn doubled(tracker: &Tracker, data: &Object, memoize: bool) -> Computed {
        let data = data.clone();
        let inner = tracker.clone();
        Computed::new("doubled", tracker, memoize, move || {
            let n = data.get("n", &inner)?.as_f64().unwrap_or(0.0);
            Ok(Value::from(n * 2.0))
        })
    }

    #[test]
    fn memo_caches_until_dependency_changes() {
        let tracker = Tracker::new();
        let data = Object::new().with("n", 2);
        observe(&Value::from(data.clone()));
        let computed = doubled(&tracker, &data, true);

        assert_eq!(computed.get(&tracker).unwrap(), Value::from(4));
        assert_eq!(computed.get(&tracker).unwrap(), Value::from(4));
        assert_eq!(computed.evaluation_count(), 1);
        assert!(!computed.is_dirty());

        data.set("n", Value::from(5)).unwrap();
        assert!(computed.is_dirty());
        assert_eq!(computed.get(&tracker).unwrap(), Value::from(10));
        assert_eq!(computed.evaluation_count(), 2);
    }

    #[test]
    fn unmemoized_recomputes_every_read() {
        let tracker = Tracker::new();
        let data = Object::new().with("n", 2);
        observe(&Value::from(data.clone()));
        let computed = doubled(&tracker, &data, false);

        computed.get(&tracker).unwrap();
        computed.get(&tracker).unwrap();
        assert_eq!(computed.evaluation_count(), 2);
    }

    #[test]
    fn watcher_on_computed_follows_dependency() {
        let tracker = Tracker::new();
        let data = Object::new().with("n", 1);
        let computed = doubled(&tracker, &data, true);
        data.define("doubled", crate::reactive::Slot::Computed(computed.clone()));
        let root = Value::from(data.clone());
        observe(&root);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _watcher = Watcher::new(&tracker, root, "doubled", move |v| {
            sink.lock().push(v.clone());
            Ok(())
        })
        .unwrap();

        data.set("n", Value::from(4)).unwrap();
        assert_eq!(*seen.lock(), vec![Value::from(8)]);
        assert!(computed.source().subscriber_count() >= 1);
    }
}
