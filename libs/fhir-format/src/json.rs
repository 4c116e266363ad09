//! JSON encoder/decoder slots.
//!
//! The model layer never calls `serde_json` directly for its text form; it
//! goes through a `JsonDumps`/`JsonLoads` pair carried in the schema
//! configuration. The defaults are chosen once from an ordered candidate
//! list, so swapping the encoder is a configuration change, not a call-site
//! change.

use crate::{FormatError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Encode a value tree to UTF-8 JSON bytes.
pub type JsonDumps = fn(&Value, &EncodeOptions) -> Result<Vec<u8>>;

/// Decode UTF-8 JSON bytes to a value tree.
pub type JsonLoads = fn(&[u8]) -> Result<Value>;

/// Options recognized by the JSON encoders.
///
/// Only `indent` (two spaces) and `sort_keys` have an effect; anything in
/// `extra` is ignored with a warning, mirroring how unknown encoder options
/// have always been tolerated.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    pub indent: Option<u8>,
    pub sort_keys: bool,
    pub extra: BTreeMap<String, Value>,
}

impl EncodeOptions {
    pub fn indented() -> Self {
        EncodeOptions {
            indent: Some(2),
            ..EncodeOptions::default()
        }
    }
}

fn serde_json_dumps(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>> {
    if !options.extra.is_empty() {
        let ignored: Vec<&str> = options.extra.keys().map(String::as_str).collect();
        tracing::warn!(
            options = ?ignored,
            "unrecognized encode options are ignored; only `indent` and `sort_keys` apply"
        );
    }

    let sorted;
    let value = if options.sort_keys {
        sorted = sort_keys(value);
        &sorted
    } else {
        value
    };

    match options.indent {
        None => Ok(serde_json::to_vec(value)?),
        Some(indent) => {
            if indent != 2 {
                tracing::warn!(indent, "only indent 2 is accepted");
            }
            Ok(serde_json::to_vec_pretty(value)?)
        }
    }
}

fn serde_json_loads(data: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(data)?)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (key, value) in entries {
                sorted.insert(key.clone(), sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

// Ordered candidate lists. The first available encoder wins; alternatives
// (SIMD or arena-based encoders) slot in ahead of serde_json without
// touching any call site.
const DUMPS_CANDIDATES: &[(&str, JsonDumps)] = &[("serde_json", serde_json_dumps)];
const LOADS_CANDIDATES: &[(&str, JsonLoads)] = &[("serde_json", serde_json_loads)];

/// The default JSON encoder, selected at startup from `DUMPS_CANDIDATES`.
pub fn default_json_dumps() -> JsonDumps {
    DUMPS_CANDIDATES[0].1
}

/// The default JSON decoder, selected at startup from `LOADS_CANDIDATES`.
pub fn default_json_loads() -> JsonLoads {
    LOADS_CANDIDATES[0].1
}
