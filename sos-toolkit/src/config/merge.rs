//! Layer merging over `serde_json::Value` trees.

use crate::attr::{check_list_growth, parse_path};
use crate::errors::{InvalidPathError, SosResult};
use serde_json::{Map, Value};

/// Merges `overlay` into `base`, rightmost wins.
///
/// Maps merge key by key, recursively. Every other value, lists
/// included, replaces what was there. A null overlay leaves a map in
/// place.
pub fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Object(_), Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

/// Merges layers lowest precedence first.
#[must_use]
pub fn merge_all(layers: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Object(Map::new());
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

/// Writes `value` at dotted `path`, creating maps on the way and
/// replacing whatever stands in the way.
///
/// # Errors
///
/// Returns an error for malformed paths and for list indices more than
/// [`MAX_LIST_GROWTH`](crate::attr::MAX_LIST_GROWTH) past the end.
pub fn update_path(root: &mut Value, path: &str, value: Value) -> SosResult<()> {
    let segments = parse_path(path)?;
    let mut node = root;

    for (n, segment) in segments.iter().enumerate() {
        let last = n + 1 == segments.len();
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return Err(InvalidPathError::new(path, "expected a map").into());
        };
        if let Some(index) = segment.index {
            let len = map.get(&segment.key).and_then(Value::as_array).map_or(0, Vec::len);
            check_list_growth(path, len, index)?;
        }
        let slot = map.entry(segment.key.clone()).or_insert(Value::Null);

        let slot = match segment.index {
            Some(index) => {
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                let Value::Array(items) = slot else {
                    return Err(InvalidPathError::new(path, "expected a list").into());
                };
                while items.len() <= index {
                    items.push(Value::Object(Map::new()));
                }
                &mut items[index]
            }
            None => slot,
        };

        if last {
            *slot = value;
            return Ok(());
        }
        node = slot;
    }
    Err(InvalidPathError::new(path, "empty path").into())
}

/// Reads the value at dotted `path`.
#[must_use]
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path).ok()?;
    segments.iter().try_fold(root, |node, segment| {
        let child = node.get(&segment.key)?;
        match segment.index {
            Some(index) => child.get(index),
            None => Some(child),
        }
    })
}

/// Takes the `key` entry out of a map value, leaving other values alone.
pub fn take_key(value: &mut Value, key: &str) -> Value {
    value
        .as_object_mut()
        .and_then(|map| map.remove(key))
        .unwrap_or(Value::Null)
}
