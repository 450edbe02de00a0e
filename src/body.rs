//! Helpers for walking resource bodies.
//!
//! Resource bodies stay untyped [`serde_json::Value`]s. Attribute paths are
//! dot-separated (`options.restricted_roles`); every sequence met along the
//! way fans the walk out over its elements, so `steps.params.subtestPublicId`
//! addresses the field in every step.

use serde_json::{Map, Value};

/// Calls `f` with the final key and its parent mapping for every location
/// addressed by `path` where the final key is present.
pub fn for_each_parent_mut<F>(value: &mut Value, path: &str, f: &mut F)
where
    F: FnMut(&str, &mut Map<String, Value>),
{
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    walk_mut(value, &segments, f);
}

fn walk_mut<F>(value: &mut Value, segments: &[&str], f: &mut F)
where
    F: FnMut(&str, &mut Map<String, Value>),
{
    match value {
        Value::Array(items) => {
            for item in items {
                walk_mut(item, segments, f);
            }
        }
        Value::Object(map) => match segments {
            [] => {}
            [last] => {
                if map.contains_key(*last) {
                    f(last, map);
                }
            }
            [head, rest @ ..] => {
                if let Some(child) = map.get_mut(*head) {
                    walk_mut(child, rest, f);
                }
            }
        },
        _ => {}
    }
}

/// Returns every value addressed by `path`.
#[must_use]
pub fn values_at<'a>(value: &'a Value, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let mut out = Vec::new();
    walk(value, &segments, &mut out);
    out
}

fn walk<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, segments, out);
            }
        }
        Value::Object(map) => match segments {
            [] => {}
            [last] => {
                if let Some(found) = map.get(*last) {
                    out.push(found);
                }
            }
            [head, rest @ ..] => {
                if let Some(child) = map.get(*head) {
                    walk(child, rest, out);
                }
            }
        },
        _ => {}
    }
}

/// Removes every field addressed by `path`.
pub fn remove_path(value: &mut Value, path: &str) {
    for_each_parent_mut(value, path, &mut |key, parent| {
        parent.remove(key);
    });
}

/// Renders a scalar identifier as a string.
///
/// Strings are returned as-is and numbers in their decimal form. Anything
/// else is not an identifier.
#[must_use]
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Adds `tag` to the tag list at `path`, creating the list when the parent
/// mapping exists but has no such field. Does nothing if the tag is already
/// present.
pub fn ensure_tag(value: &mut Value, path: &str, tag: &str) {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = value;
    for segment in parents {
        match current.get_mut(*segment) {
            Some(next) => current = next,
            None => return,
        }
    }

    let Value::Object(parent) = current else {
        return;
    };

    let tags = parent
        .entry((*last).to_string())
        .or_insert_with(|| Value::Array(Vec::new()));

    if tags.is_null() {
        *tags = Value::Array(Vec::new());
    }

    if let Value::Array(items) = tags {
        if !items.iter().any(|t| t.as_str() == Some(tag)) {
            items.push(Value::String(tag.to_string()));
        }
    }
}
