//! Reactive Primitives
//!
//! This module implements the dependency-tracking core: observable objects,
//! per-property change sources, watchers and computed properties.
//!
//! # Concepts
//!
//! ## Change sources
//!
//! Every property of an observed [`Object`] owns a [`ChangeSource`]. When the
//! property is read while a subscriber is evaluating, that subscriber is
//! registered with the source. When the property is written with a different
//! value, every registered subscriber is notified.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates one dotted path, caches the result, and runs a
//! callback whenever a notification produces a different value. Bindings
//! between data and view nodes are watchers.
//!
//! ## Computed properties
//!
//! A [`Computed`] is a getter-only property. Memoized ones cache their value
//! and are themselves subscribers of whatever they read.
//!
//! # Implementation Notes
//!
//! The "who is evaluating" marker is a [`Tracker`] owned by each view model
//! rather than a global. Change sources hold their subscribers weakly, so a
//! dropped watcher simply stops being notified.

mod computed;
mod context;
mod object;
mod observer;
mod source;
mod subscriber;
mod watcher;

pub use computed::{Computed, Getter};
pub use context::{Tracker, TrackingGuard};
pub use object::{Object, ObjectId};
pub use observer::observe;
pub use source::{ChangeSource, SourceId};
pub use subscriber::{Subscriber, SubscriberId};
pub use watcher::{Callback, Watcher};

pub(crate) use object::Slot;
