//! Dot-separated path lookup over arbitrary JSON documents.

use serde_json::Value;

/// Resolve `path` inside `document`.
///
/// Each segment addresses an object key, or a list index when the current
/// node is a list and the segment parses as an unsigned integer. Missing
/// keys, out-of-range indices, type mismatches, empty segments and `null`
/// all resolve to `None`; lookup never fails loudly.
pub fn get_by_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut node = document;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        if node.is_null() {
            return None;
        }
    }

    Some(node)
}

/// Whether `path` equals `prefix` or lies beneath it, compared by segment.
pub fn has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
