//! Evaluation Context
//!
//! The tracker records which subscriber is evaluating right now. This enables
//! automatic dependency discovery: when an observed property is read, the
//! subscriber on top of the stack is registered with that property's change
//! source.
//!
//! # Implementation
//!
//! Every view model owns one tracker and hands clones of it to the watchers
//! and computed properties it creates, so there is no process-wide marker.
//! Entering a context pushes a frame and returns a guard; dropping the guard
//! pops it, even when evaluation fails or unwinds.
//!
//! Frames nest: a watcher reading a memoized computed property pushes the
//! computed's own frame on top of its own. A paused frame hides whatever is
//! below it, which is how writes traverse a path without subscribing.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::source::ChangeSource;
use super::subscriber::{Subscriber, SubscriberId};

/// Handle to an evaluation stack. Clones share the stack.
#[derive(Clone, Default)]
pub struct Tracker {
    stack: Arc<Mutex<Vec<Frame>>>,
}

/// `None` is a paused frame.
type Frame = Option<Arc<dyn Subscriber>>;

/// Guard that pops its frame when dropped.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct TrackingGuard {
    stack: Arc<Mutex<Vec<Frame>>>,
    subscriber_id: Option<SubscriberId>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `subscriber` the current one until the guard drops.
    pub fn enter(&self, subscriber: Arc<dyn Subscriber>) -> TrackingGuard {
        let subscriber_id = Some(subscriber.id());
        self.stack.lock().push(Some(subscriber));
        TrackingGuard {
            stack: Arc::clone(&self.stack),
            subscriber_id,
        }
    }

    /// Suspend tracking until the guard drops.
    pub fn pause(&self) -> TrackingGuard {
        self.stack.lock().push(None);
        TrackingGuard {
            stack: Arc::clone(&self.stack),
            subscriber_id: None,
        }
    }

    /// Check whether a subscriber is currently evaluating.
    pub fn is_active(&self) -> bool {
        matches!(self.stack.lock().last(), Some(Some(_)))
    }

    /// The subscriber currently evaluating, if any.
    pub fn current(&self) -> Option<Arc<dyn Subscriber>> {
        self.stack.lock().last().cloned().flatten()
    }

    pub fn current_id(&self) -> Option<SubscriberId> {
        self.current().map(|s| s.id())
    }

    /// Register the current subscriber, if any, with `source`.
    ///
    /// Called by observed properties whenever they are read.
    pub fn depend(&self, source: &ChangeSource) {
        if let Some(subscriber) = self.current() {
            source.register(&subscriber);
            subscriber.track(source);
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("depth", &self.depth())
            .field("current", &self.current_id())
            .finish()
    }
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        let popped = self.stack.lock().pop();

        // Verify we're popping the right frame.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame.as_ref().map(|s| s.id()),
                self.subscriber_id,
                "tracking frame mismatch"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    struct Noop(SubscriberId);

    impl Subscriber for Noop {
        fn id(&self) -> SubscriberId {
            self.0
        }

        fn update(self: Arc<Self>) -> Result<()> {
            Ok(())
        }

        fn track(&self, _source: &ChangeSource) {}
    }

    fn noop() -> Arc<dyn Subscriber> {
        Arc::new(Noop(SubscriberId::new()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let tracker = Tracker::new();
        let sub = noop();
        let id = sub.id();

        assert!(!tracker.is_active());
        assert!(tracker.current_id().is_none());

        {
            let _ctx = tracker.enter(sub);

            assert!(tracker.is_active());
            assert_eq!(tracker.current_id(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!tracker.is_active());
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let tracker = Tracker::new();
        let outer = noop();
        let inner = noop();
        let (outer_id, inner_id) = (outer.id(), inner.id());

        {
            let _ctx1 = tracker.enter(outer);
            assert_eq!(tracker.current_id(), Some(outer_id));

            {
                let _ctx2 = tracker.enter(inner);
                assert_eq!(tracker.current_id(), Some(inner_id));
            }

            // After inner context drops, outer should be current
            assert_eq!(tracker.current_id(), Some(outer_id));
        }

        assert!(tracker.current_id().is_none());
    }

    #[test]
    fn pause_hides_outer_subscriber() {
        let tracker = Tracker::new();
        let source = ChangeSource::new();
        let sub = noop();
        let id = sub.id();

        let _ctx = tracker.enter(sub);
        {
            let _paused = tracker.pause();
            assert!(!tracker.is_active());
            tracker.depend(&source);
        }
        assert!(!source.is_registered(id));

        tracker.depend(&source);
        assert!(source.is_registered(id));
    }

    #[test]
    fn guard_pops_on_unwind() {
        let tracker = Tracker::new();
        let sub = noop();
        let cloned = tracker.clone();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _ctx = cloned.enter(sub);
            panic!("evaluation failed");
        }));

        assert!(outcome.is_err());
        assert!(!tracker.is_active());
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    fn separate_trackers_do_not_share_state() {
        let a = Tracker::new();
        let b = Tracker::new();
        let _ctx = a.enter(noop());
        assert!(a.is_active());
        assert!(!b.is_active());
    }
}
