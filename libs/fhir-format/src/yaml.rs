//! YAML encoding for the mapping form.

use crate::Result;
use serde_json::Value;

/// Encode a value tree as YAML text.
pub fn yaml_dumps(value: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

/// Decode YAML text into a JSON value tree.
///
/// YAML mappings with non-string keys are rejected by the target type.
pub fn yaml_loads(data: &str) -> Result<Value> {
    Ok(serde_yaml::from_str(data)?)
}
