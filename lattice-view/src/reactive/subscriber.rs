//! Subscriber types for the reactive system.
//!
//! A Subscriber is anything that re-runs when a property it read changes:
//! binding watchers and memoized computed properties.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::source::ChangeSource;
use crate::error::Result;

/// Unique identifier for a subscriber.
///
/// Change sources key their subscriber lists by this ID, which is what keeps a
/// subscriber from being registered twice on the same property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that change sources can notify.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    /// Called by a change source after one of the values this subscriber
    /// read has changed.
    fn update(self: Arc<Self>) -> Result<()>;

    /// Record that `source` was read during the current evaluation.
    fn track(&self, source: &ChangeSource);
}

/// The change sources a subscriber is registered with.
///
/// Each evaluation starts a fresh `pending` set; when it completes the sources
/// that were not read again are left, so a subscriber only listens to what
/// its last evaluation touched.
#[derive(Default)]
pub(crate) struct Dependencies {
    current: Mutex<SmallVec<[ChangeSource; 4]>>,
    pending: Mutex<SmallVec<[ChangeSource; 4]>>,
}

impl Dependencies {
    pub(crate) fn begin(&self) {
        self.pending.lock().clear();
    }

    pub(crate) fn record(&self, source: &ChangeSource) {
        let mut pending = self.pending.lock();
        if !pending.iter().any(|s| s.id() == source.id()) {
            pending.push(source.clone());
        }
    }

    /// Finish a successful evaluation: leave every source not read again.
    pub(crate) fn settle(&self, owner: SubscriberId) {
        let fresh = std::mem::take(&mut *self.pending.lock());
        let stale = {
            let mut current = self.current.lock();
            let old = std::mem::replace(&mut *current, fresh);
            old.into_iter()
                .filter(|s| !current.iter().any(|f| f.id() == s.id()))
                .collect::<SmallVec<[ChangeSource; 4]>>()
        };
        for source in stale {
            source.unregister(owner);
        }
    }

    /// Finish a failed evaluation: keep old and new sources alike.
    pub(crate) fn merge(&self) {
        let fresh = std::mem::take(&mut *self.pending.lock());
        let mut current = self.current.lock();
        for source in fresh {
            if !current.iter().any(|s| s.id() == source.id()) {
                current.push(source);
            }
        }
    }

    /// Leave every source.
    pub(crate) fn clear(&self, owner: SubscriberId) {
        let sources = std::mem::take(&mut *self.current.lock());
        self.pending.lock().clear();
        for source in sources {
            source.unregister(owner);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.current.lock().len()
    }
}
