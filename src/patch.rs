//! Template configuration: resolve once, then patch by copy.
//!
//! The configuration a user edits is a JSON value tree whose shape the schema
//! only implies. Every operation here takes the current config by reference
//! and returns a *new* value; the input is never touched, so holders of the
//! old value (an `Arc` in [`crate::session`]) can detect change by identity.
//!
//! ## Paths
//!
//! A field id addresses the tree with dots: `hero.title`, `links.0.url`.
//!
//! - On an object, a segment is a key. Missing keys are created.
//! - On an array, a numeric segment in bounds indexes the array.
//! - Any other node met on the way (a string, a number, null, an array with
//!   a non-index segment) is replaced by a fresh object.
//!
//! Array fields are replaced wholesale: [`append_item`], [`remove_item`] and
//! [`update_item`] build a new array and patch it in at the field path.

use crate::archive::TemplateArchive;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("{0} is not an array")]
    NotAnArray(String),
    #[error("{path}[{index}] is out of range (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
}

/// The configuration editing starts from: user config, else default config.
pub fn resolve(archive: &TemplateArchive) -> Value {
    archive.effective_config().clone()
}

/// Copy of `config` with `value` stored at `path`.
pub fn apply_patch(config: &Value, path: &str, value: Value) -> Value {
    with_path(config.clone(), &segments(path), value)
}

/// The value stored at `path`, if every segment resolves.
pub fn value_at<'a>(config: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(config, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => parse_index(segment, items.len()).map(|i| &items[i]),
            _ => None,
        })
}

/// Copy of `config` with `item` appended to the array at `path`.
///
/// A missing or null array starts out empty.
pub fn append_item(config: &Value, path: &str, item: Value) -> Result<Value, PatchError> {
    let mut items = array_at(config, path)?;
    items.push(item);
    Ok(apply_patch(config, path, Value::Array(items)))
}

/// Copy of `config` without entry `index` of the array at `path`.
pub fn remove_item(config: &Value, path: &str, index: usize) -> Result<Value, PatchError> {
    let mut items = array_at(config, path)?;
    check_index(path, index, items.len())?;
    items.remove(index);
    Ok(apply_patch(config, path, Value::Array(items)))
}

/// Copy of `config` with `key` of entry `index` in the array at `path` set
/// to `value`. `key` may itself be a dotted path inside the entry.
pub fn update_item(
    config: &Value,
    path: &str,
    index: usize,
    key: &str,
    value: Value,
) -> Result<Value, PatchError> {
    let mut items = array_at(config, path)?;
    check_index(path, index, items.len())?;
    let entry = std::mem::take(&mut items[index]);
    items[index] = with_path(entry, &segments(key), value);
    Ok(apply_patch(config, path, Value::Array(items)))
}

/// Top-level keys of a config object, for diagnostics.
pub fn top_level_keys(config: &Value) -> Vec<String> {
    config
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

fn parse_index(segment: &str, len: usize) -> Option<usize> {
    segment.parse::<usize>().ok().filter(|&i| i < len)
}

fn check_index(path: &str, index: usize, len: usize) -> Result<(), PatchError> {
    if index < len {
        Ok(())
    } else {
        Err(PatchError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len,
        })
    }
}

fn array_at(config: &Value, path: &str) -> Result<Vec<Value>, PatchError> {
    match value_at(config, path) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(PatchError::NotAnArray(path.to_string())),
    }
}

fn with_path(node: Value, segments: &[&str], value: Value) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return value;
    };
    match node {
        Value::Object(mut map) => {
            let slot = map.entry(head.to_string()).or_insert(Value::Null);
            let child = std::mem::take(slot);
            *slot = with_path(child, rest, value);
            Value::Object(map)
        }
        Value::Array(mut items) => match parse_index(head, items.len()) {
            Some(i) => {
                let child = std::mem::take(&mut items[i]);
                items[i] = with_path(child, rest, value);
                Value::Array(items)
            }
            None => object_with(head, rest, value),
        },
        _ => object_with(head, rest, value),
    }
}

fn object_with(key: &str, rest: &[&str], value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), with_path(Value::Null, rest, value));
    Value::Object(map)
}
