//! Reading and writing dotted paths against a root value.
//!
//! Reads register the subscriber currently evaluating on the tracker with
//! every observed property they pass through. Writes traverse untracked.
//!
//! A path fails when a segment before the last resolves to `undefined`/`null`
//! (the segment is missing) or to a primitive. The last segment may be absent:
//! a read yields `Undefined`, a write creates the property.

use super::path::Path;
use super::template::Template;
use crate::error::{Error, PathFault, Result};
use crate::reactive::Tracker;
use crate::value::Value;

pub fn read(root: &Value, expression: &str, tracker: &Tracker) -> Result<Value> {
    read_path(root, &Path::parse(expression)?, tracker)
}

pub fn read_path(root: &Value, path: &Path, tracker: &Tracker) -> Result<Value> {
    walk(root, path, path.segments(), tracker)
}

pub fn write(root: &Value, expression: &str, value: Value, tracker: &Tracker) -> Result<()> {
    write_path(root, &Path::parse(expression)?, value, tracker)
}

pub fn write_path(root: &Value, path: &Path, value: Value, tracker: &Tracker) -> Result<()> {
    let _paused = tracker.pause();
    let (parents, last) = path.split_last();
    let container = walk(root, path, parents, tracker)?;

    match container {
        Value::Object(object) => object.set(last, value),
        other => Err(fault(path, parents.last().map_or(last, String::as_str), &other)),
    }
}

/// Replace every `{{ path }}` in `text` with the path's current value.
pub fn resolve_template(
    root: &Value,
    text: &str,
    delimiters: (&str, &str),
    tracker: &Tracker,
) -> Result<String> {
    Template::parse(text, delimiters)?.render(root, tracker)
}

fn walk(root: &Value, path: &Path, segments: &[String], tracker: &Tracker) -> Result<Value> {
    let mut current = root.clone();
    for (i, segment) in segments.iter().enumerate() {
        current = match &current {
            Value::Object(object) => object.get(segment, tracker)?,
            Value::Array(items) => index(items, segment),
            other => {
                let owner = if i == 0 { segment } else { &segments[i - 1] };
                return Err(fault(path, owner, other));
            }
        };
    }
    Ok(current)
}

fn index(items: &[Value], segment: &str) -> Value {
    if segment == "length" {
        return Value::from(items.len() as f64);
    }
    segment
        .parse::<usize>()
        .ok()
        .and_then(|i| items.get(i).cloned())
        .unwrap_or_default()
}

fn fault(path: &Path, segment: &str, value: &Value) -> Error {
    let fault = match value {
        Value::Undefined | Value::Null => PathFault::Missing,
        _ => PathFault::NotAnObject,
    };
    Error::path(path.as_str(), segment, fault)
}
