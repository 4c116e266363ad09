//! Empty-container pruning of converted value trees.
//!
//! A pure structural transform over plain lists, mappings and scalars: no
//! record-type awareness. Used as the post-pass of the JSON text form when
//! comment stripping may have hollowed out containers.

use serde_json::Value;

/// Recursively remove every list or mapping entry whose value collapses to
/// an empty list/mapping. Null entries are left untouched (they may be
/// intentional when `exclude_none` was false upstream). Returns `None` when
/// the whole tree becomes empty.
pub fn prune_empty(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => {
            let mut kept = Vec::with_capacity(items.len());
            for item in items {
                if item.is_null() {
                    kept.push(item);
                    continue;
                }
                if let Some(item) = prune_empty(item) {
                    kept.push(item);
                }
            }
            if kept.is_empty() {
                None
            } else {
                Some(Value::Array(kept))
            }
        }
        Value::Object(entries) => {
            let mut kept = serde_json::Map::with_capacity(entries.len());
            for (key, item) in entries {
                if item.is_null() {
                    kept.insert(key, item);
                    continue;
                }
                if let Some(item) = prune_empty(item) {
                    kept.insert(key, item);
                }
            }
            if kept.is_empty() {
                None
            } else {
                Some(Value::Object(kept))
            }
        }
        scalar => Some(scalar),
    }
}
