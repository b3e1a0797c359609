//! Observable Objects
//!
//! An [`Object`] is an ordered mapping from keys to property slots. Instead of
//! redefining accessors at runtime, every kind of property is an explicit slot:
//!
//! - `Field`: a stored value. Once the object is observed, the field also owns
//!   a [`ChangeSource`]: reads register the current subscriber with it, writes
//!   of a different value notify it.
//! - `Computed`: a getter-only derived property.
//! - `Constant`: a getter-only value (methods, `$data`).
//! - `Proxy`: forwards reads and writes to a key of another object.
//!
//! Objects are shared handles; cloning an `Object` does not copy the data.
//!
//! A tracked read of a key the object does not have yet still registers the
//! reader: the object keeps a waiting change source for that key, which the
//! field adopts once the key is written.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::computed::Computed;
use super::context::Tracker;
use super::observer;
use super::source::ChangeSource;
use crate::error::{Error, Result};
use crate::value::Value;

/// Unique identifier for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

struct ObjectInner {
    id: ObjectId,
    slots: RwLock<IndexMap<String, Slot>>,
    /// Sources for absent keys that were read while tracked.
    /// Always locked after `slots`.
    absent: Mutex<IndexMap<String, ChangeSource>>,
    observed: AtomicBool,
}

pub(crate) enum Slot {
    Field(Field),
    Computed(Computed),
    Constant(Value),
    Proxy { target: Object, key: String },
}

pub(crate) struct Field {
    value: Value,
    source: Option<ChangeSource>,
}

/// What a read resolved to, taken out of the lock.
enum Access {
    Value(Value, Option<ChangeSource>),
    Computed(Computed),
    Forward(Object, String),
}

/// What a write did, taken out of the lock.
enum Write {
    Changed(Option<ChangeSource>),
    Created,
    Forward(Object, String),
}

impl Object {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                id: ObjectId::next(),
                slots: RwLock::new(IndexMap::new()),
                absent: Mutex::new(IndexMap::new()),
                observed: AtomicBool::new(false),
            }),
        }
    }

    /// Builder-style insert of a field.
    ///
    /// Meant for objects under construction. On an observed object this
    /// behaves like [`Object::insert`], except that subscriber failures are
    /// only logged.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(source) = self.put(key.into(), value.into()) {
            let _ = source.notify();
        }
        self
    }

    /// Insert or overwrite a field, replacing whatever slot was stored under
    /// `key`.
    ///
    /// On an observed object the field keeps the change source of the field
    /// it replaces, the new value is observed, and subscribers are notified
    /// when the value differs.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        match self.put(key.into(), value.into()) {
            Some(source) => source.notify(),
            None => Ok(()),
        }
    }

    /// Store a field. Returns the source to notify, if any.
    fn put(&self, key: String, value: Value) -> Option<ChangeSource> {
        let (observed, notify) = {
            let mut slots = self.inner.slots.write();
            let observed = self.is_observed();
            let (source, notify) = match slots.get(&key) {
                Some(Slot::Field(field)) => {
                    let changed = !field.value.strict_eq(&value);
                    (field.source.clone(), field.source.clone().filter(|_| changed))
                }
                Some(_) => (None, None),
                None if observed => {
                    let waiting = self.inner.absent.lock().shift_remove(&key);
                    (waiting.clone(), waiting)
                }
                None => (None, None),
            };
            let source = if observed {
                Some(source.unwrap_or_else(ChangeSource::new))
            } else {
                source
            };
            slots.insert(
                key,
                Slot::Field(Field {
                    value: value.clone(),
                    source,
                }),
            );
            (observed, notify)
        };

        if observed {
            observer::observe(&value);
        }
        notify
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Whether both handles point at the same object.
    pub fn same(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_observed(&self) -> bool {
        self.inner.observed.load(Ordering::Acquire)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.slots.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.slots.read().contains_key(key)
    }

    /// The change source of an observed field.
    pub fn source(&self, key: &str) -> Option<ChangeSource> {
        match self.inner.slots.read().get(key) {
            Some(Slot::Field(field)) => field.source.clone(),
            Some(Slot::Computed(computed)) => Some(computed.source()),
            _ => None,
        }
    }

    /// Read a property, registering the subscriber currently evaluating on
    /// `tracker`. Absent keys read as `Undefined`; on an observed object the
    /// subscriber is still registered and hears the key being created.
    pub fn get(&self, key: &str, tracker: &Tracker) -> Result<Value> {
        let access = {
            let slots = self.inner.slots.read();
            match slots.get(key) {
                None if self.is_observed() && tracker.is_active() => {
                    let source = self
                        .inner
                        .absent
                        .lock()
                        .entry(key.to_string())
                        .or_insert_with(ChangeSource::new)
                        .clone();
                    Access::Value(Value::Undefined, Some(source))
                }
                None => return Ok(Value::Undefined),
                Some(Slot::Field(field)) => Access::Value(field.value.clone(), field.source.clone()),
                Some(Slot::Constant(value)) => Access::Value(value.clone(), None),
                Some(Slot::Computed(computed)) => Access::Computed(computed.clone()),
                Some(Slot::Proxy { target, key }) => Access::Forward(target.clone(), key.clone()),
            }
        };

        match access {
            Access::Value(value, source) => {
                if let Some(source) = source {
                    tracker.depend(&source);
                }
                Ok(value)
            }
            Access::Computed(computed) => computed.get(tracker),
            Access::Forward(target, key) => target.get(&key, tracker),
        }
    }

    /// Read a property without registering anyone.
    pub fn get_untracked(&self, key: &str) -> Result<Value> {
        self.get(key, &Tracker::new())
    }

    /// Write a property.
    ///
    /// Writing an equal value does nothing. Writing a different value to an
    /// observed field observes the new value and then notifies the field's
    /// subscribers. Absent keys are created, observed if this object is, and
    /// subscribers that read the key while it was absent are notified.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let write = {
            let mut slots = self.inner.slots.write();
            match slots.get_mut(key) {
                Some(Slot::Field(field)) => {
                    if field.value.strict_eq(&value) {
                        return Ok(());
                    }
                    field.value = value.clone();
                    Write::Changed(field.source.clone())
                }
                Some(Slot::Proxy { target, key }) => Write::Forward(target.clone(), key.clone()),
                Some(Slot::Computed(_)) | Some(Slot::Constant(_)) => {
                    return Err(Error::ReadOnly(key.to_string()));
                }
                None => Write::Created,
            }
        };

        match write {
            Write::Changed(Some(source)) => {
                observer::observe(&value);
                source.notify()
            }
            Write::Changed(None) => Ok(()),
            Write::Created => match self.put(key.to_string(), value) {
                Some(source) => source.notify(),
                None => Ok(()),
            },
            Write::Forward(target, key) => target.set(&key, value),
        }
    }

    /// Install an accessor slot, replacing whatever was stored under `key`.
    pub(crate) fn define(&self, key: impl Into<String>, slot: Slot) {
        self.inner.slots.write().insert(key.into(), slot);
    }

    /// Give every field a change source and mark the object observed.
    /// Fields that already have one keep it.
    ///
    /// Returns the field values, for the caller to walk into.
    pub(crate) fn instrument(&self) -> Vec<Value> {
        let mut slots = self.inner.slots.write();
        self.inner.observed.store(true, Ordering::Release);

        let mut children = Vec::with_capacity(slots.len());
        for slot in slots.values_mut() {
            if let Slot::Field(field) = slot {
                if field.source.is_none() {
                    field.source = Some(ChangeSource::new());
                }
                children.push(field.value.clone());
            }
        }
        children
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let object = Object::new();
        for (key, value) in iter {
            object.put(key.into(), value);
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.inner.id)
            .field("keys", &self.keys())
            .field("observed", &self.is_observed())
            .finish()
    }
}

/// Serializes stored fields only; accessors are skipped.
impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields: Vec<(String, Value)> = self
            .inner
            .slots
            .read()
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Field(field) => Some((key.clone(), field.value.clone())),
                _ => None,
            })
            .collect();

        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
