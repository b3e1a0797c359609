//! Change Sources
//!
//! A ChangeSource is the publisher behind one observed property slot. It
//! keeps the subscribers that read the property, in registration order, and
//! tells each of them to update when the property is written.
//!
//! # Failure Isolation
//!
//! `notify` runs every live subscriber even if some of them fail; the failures
//! are returned together once the loop has finished.
//!
//! # Memory
//!
//! Subscribers are held weakly. A binding that was dropped without being torn
//! down is skipped and pruned at the next notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::subscriber::{Subscriber, SubscriberId};
use crate::error::{Error, Result};

/// Unique identifier for a change source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-property publisher of change notifications.
///
/// Cloning yields another handle to the same subscriber list.
#[derive(Clone)]
pub struct ChangeSource {
    inner: Arc<SourceInner>,
}

struct SourceInner {
    id: SourceId,
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn Subscriber>>>,
}

impl ChangeSource {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SourceInner {
                id: SourceId::next(),
                subscribers: Mutex::new(IndexMap::new()),
            }),
        }
    }

    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Append a subscriber. Registering one that is already present keeps its
    /// original position.
    pub fn register(&self, subscriber: &Arc<dyn Subscriber>) {
        let id = subscriber.id();
        let mut subscribers = self.inner.subscribers.lock();
        if !subscribers.contains_key(&id) {
            trace!(source = ?self.inner.id, subscriber = ?id, "register");
            subscribers.insert(id, Arc::downgrade(subscriber));
        }
    }

    pub fn unregister(&self, id: SubscriberId) {
        self.inner.subscribers.lock().shift_remove(&id);
    }

    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.lock().contains_key(&id)
    }

    /// Number of registered subscribers that are still alive.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .values()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// Update every registered subscriber in registration order.
    ///
    /// The list is snapshotted first, so subscribers may register or leave
    /// while the loop runs.
    pub fn notify(&self) -> Result<()> {
        let live: Vec<Arc<dyn Subscriber>> = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.retain(|_, s| s.strong_count() > 0);
            subscribers.values().filter_map(Weak::upgrade).collect()
        };

        trace!(source = ?self.inner.id, subscribers = live.len(), "notify");

        let mut errors = Vec::new();
        for subscriber in live {
            let id = subscriber.id();
            if let Err(err) = subscriber.update() {
                warn!(source = ?self.inner.id, subscriber = ?id, error = %err, "subscriber update failed");
                errors.push(err);
            }
        }

        Error::collect(errors, Error::Notify)
    }
}

impl Default for ChangeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSource")
            .field("id", &self.inner.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        id: SubscriberId,
        log: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        fail: bool,
    }

    impl Probe {
        fn new(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, fail: bool) -> Arc<dyn Subscriber> {
            Arc::new(Self {
                id: SubscriberId::new(),
                log: log.clone(),
                name,
                fail,
            })
        }
    }

    impl Subscriber for Probe {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn update(self: Arc<Self>) -> Result<()> {
            self.log.lock().push(self.name);
            if self.fail {
                return Err(Error::ReadOnly(self.name.to_string()));
            }
            Ok(())
        }

        fn track(&self, _source: &ChangeSource) {}
    }

    #[test]
    fn notifies_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = ChangeSource::new();
        let first = Probe::new(&log, "first", false);
        let second = Probe::new(&log, "second", false);

        source.register(&first);
        source.register(&second);
        source.register(&first);
        assert_eq!(source.subscriber_count(), 2);

        source.notify().unwrap();
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn failing_subscriber_does_not_stop_siblings() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = ChangeSource::new();
        let bad = Probe::new(&log, "bad", true);
        let good = Probe::new(&log, "good", false);
        let worse = Probe::new(&log, "worse", true);

        source.register(&bad);
        source.register(&good);
        source.register(&worse);

        match source.notify() {
            Err(Error::Notify(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregated failures, got {other:?}"),
        }
        assert_eq!(*log.lock(), vec!["bad", "good", "worse"]);
    }

    #[test]
    fn unregister_and_dropped_subscribers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = ChangeSource::new();
        let kept = Probe::new(&log, "kept", false);
        let removed = Probe::new(&log, "removed", false);
        let dropped = Probe::new(&log, "dropped", false);

        source.register(&kept);
        source.register(&removed);
        source.register(&dropped);

        source.unregister(removed.id());
        drop(dropped);

        source.notify().unwrap();
        assert_eq!(*log.lock(), vec!["kept"]);
        assert_eq!(source.subscriber_count(), 1);
    }

    #[test]
    fn clones_share_identity() {
        let a = ChangeSource::new();
        let b = ChangeSource::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
