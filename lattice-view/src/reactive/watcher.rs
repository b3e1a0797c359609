//! Watcher Implementation
//!
//! A Watcher is the subscriber behind one live binding. It watches a single
//! dotted path, remembers the last value it saw, and calls its callback when
//! a re-evaluation produces a different value.
//!
//! # How Watchers Work
//!
//! 1. On creation the path is evaluated once inside the watcher's own
//!    tracking frame. Every observed property read on the way registers the
//!    watcher; that first read is what subscribes it.
//!
//! 2. When one of those properties changes, its change source calls
//!    `update`, which evaluates again (re-collecting dependencies).
//!
//! 3. If the new value differs from the cached one, the cache is replaced and
//!    the callback runs. Equal values do nothing.
//!
//! # Teardown
//!
//! `teardown` removes the watcher from every change source it joined. A torn
//! down watcher never runs again.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::context::Tracker;
use super::source::ChangeSource;
use super::subscriber::{Dependencies, Subscriber, SubscriberId};
use crate::error::Result;
use crate::expr::{self, Path};
use crate::value::Value;

/// Called with the new value after a change.
pub type Callback = dyn Fn(&Value) -> Result<()> + Send + Sync;

/// Subscriber for one path expression.
///
/// Cloning yields another handle to the same watcher.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    id: SubscriberId,
    tracker: Tracker,
    root: Value,
    path: Path,
    old_value: Mutex<Value>,
    callback: Box<Callback>,
    deps: Dependencies,
    disposed: AtomicBool,
    fire_count: AtomicUsize,
}

impl Watcher {
    /// Create a watcher and evaluate it once to subscribe it and seed its
    /// cached value.
    pub fn new<F>(tracker: &Tracker, root: Value, expression: &str, callback: F) -> Result<Self>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        Self::with_path(tracker, root, Path::parse(expression)?, callback)
    }

    pub fn with_path<F>(tracker: &Tracker, root: Value, path: Path, callback: F) -> Result<Self>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        let inner = Arc::new(WatcherInner {
            id: SubscriberId::new(),
            tracker: tracker.clone(),
            root,
            path,
            old_value: Mutex::new(Value::Undefined),
            callback: Box::new(callback),
            deps: Dependencies::default(),
            disposed: AtomicBool::new(false),
            fire_count: AtomicUsize::new(0),
        });

        match inner.evaluate() {
            Ok(value) => *inner.old_value.lock() = value,
            Err(err) => {
                inner.deps.clear(inner.id);
                return Err(err);
            }
        }

        debug!(
            subscriber = ?inner.id,
            expression = inner.path.as_str(),
            dependencies = inner.deps.len(),
            "watcher created"
        );
        Ok(Self { inner })
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn expression(&self) -> &str {
        self.inner.path.as_str()
    }

    /// The cached value from the last evaluation that changed it.
    pub fn value(&self) -> Value {
        self.inner.old_value.lock().clone()
    }

    /// Re-evaluate now, as a change notification would.
    pub fn update(&self) -> Result<()> {
        Arc::clone(&self.inner).update()
    }

    /// Leave every change source. The watcher will not run again.
    pub fn teardown(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            self.inner.deps.clear(self.inner.id);
            trace!(subscriber = ?self.inner.id, "watcher torn down");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of change sources the last evaluation read.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.len()
    }

    /// Number of times the callback has run.
    pub fn fire_count(&self) -> usize {
        self.inner.fire_count.load(Ordering::SeqCst)
    }
}

impl WatcherInner {
    fn evaluate(self: &Arc<Self>) -> Result<Value> {
        self.deps.begin();
        let result = {
            let _ctx = self.tracker.enter(Arc::clone(self) as Arc<dyn Subscriber>);
            expr::read_path(&self.root, &self.path, &self.tracker)
        };

        match &result {
            Ok(_) => self.deps.settle(self.id),
            Err(_) => self.deps.merge(),
        }
        result
    }
}

impl Subscriber for WatcherInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn update(self: Arc<Self>) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let value = self.evaluate()?;
        let changed = {
            let mut old = self.old_value.lock();
            if old.strict_eq(&value) {
                false
            } else {
                *old = value.clone();
                true
            }
        };

        if changed {
            trace!(subscriber = ?self.id, expression = self.path.as_str(), "value changed");
            self.fire_count.fetch_add(1, Ordering::SeqCst);
            // Renders must not subscribe whatever frame is below us.
            let _paused = self.tracker.pause();
            (self.callback)(&value)?;
        }
        Ok(())
    }

    fn track(&self, source: &ChangeSource) {
        self.deps.record(source);
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.path.as_str())
            .field("fire_count", &self.fire_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Object};
    use std::sync::atomic::AtomicUsize;

    fn observed(object: Object) -> Value {
        let value = Value::from(object);
        observe(&value);
        value
    }

    fn recording() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) -> Result<()> + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v: &Value| {
            sink.lock().push(v.clone());
            Ok(())
        })
    }

    #[test]
    fn watcher_seeds_value_on_creation() {
        let tracker = Tracker::new();
        let root = observed(Object::new().with("count", 1));
        let (seen, callback) = recording();

        let watcher = Watcher::new(&tracker, root, "count", callback).unwrap();

        assert_eq!(watcher.value(), Value::from(1));
        assert_eq!(watcher.dependency_count(), 1);
        assert!(seen.lock().is_empty());
        assert!(!tracker.is_active());
    }

    #[test]
    fn fires_once_per_distinct_change() {
        let tracker = Tracker::new();
        let data = Object::new().with("count", 1);
        let root = observed(data.clone());
        let (seen, callback) = recording();
        let watcher = Watcher::new(&tracker, root, "count", callback).unwrap();

        data.set("count", Value::from(2)).unwrap();
        data.set("count", Value::from(2)).unwrap();
        data.set("count", Value::from(3)).unwrap();

        assert_eq!(*seen.lock(), vec![Value::from(2), Value::from(3)]);
        assert_eq!(watcher.fire_count(), 2);
    }

    #[test]
    fn manual_update_without_change_is_noop() {
        let tracker = Tracker::new();
        let root = observed(Object::new().with("count", 1));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let watcher = Watcher::new(&tracker, root, "count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        watcher.update().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn teardown_leaves_every_source() {
        let tracker = Tracker::new();
        let user = Object::new().with("name", "x");
        let data = Object::new().with("user", user.clone());
        let root = observed(data.clone());
        let (seen, callback) = recording();
        let watcher = Watcher::new(&tracker, root, "user.name", callback).unwrap();

        let name_source = user.source("name").unwrap();
        let user_source = data.source("user").unwrap();
        assert!(name_source.is_registered(watcher.id()));
        assert!(user_source.is_registered(watcher.id()));

        watcher.teardown();
        assert!(!name_source.is_registered(watcher.id()));
        assert!(!user_source.is_registered(watcher.id()));

        user.set("name", Value::from("y")).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn failed_evaluation_clears_marker() {
        let tracker = Tracker::new();
        let root = observed(Object::new().with("count", 1));

        let err = Watcher::new(&tracker, root, "count.value", |_| Ok(())).unwrap_err();
        assert!(matches!(err, crate::error::Error::Path { .. }));
        assert!(!tracker.is_active());
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    fn dropped_watcher_is_pruned() {
        let tracker = Tracker::new();
        let data = Object::new().with("count", 1);
        let root = observed(data.clone());
        let watcher = Watcher::new(&tracker, root, "count", |_| Ok(())).unwrap();

        let source = data.source("count").unwrap();
        assert_eq!(source.subscriber_count(), 1);
        drop(watcher);
        assert_eq!(source.subscriber_count(), 0);
        data.set("count", Value::from(5)).unwrap();
    }
}
