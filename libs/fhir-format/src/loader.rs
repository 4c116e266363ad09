//! Format-detecting loading of raw bytes or files into a JSON mapping.
//!
//! Detection order: explicit content type, then file extension, then a
//! leading-byte sniff. The decoded document must be a mapping; anything
//! else is rejected before it reaches record construction.

use crate::json::JsonLoads;
use crate::{FormatError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Json,
    Yaml,
    Xml,
}

fn kind_from_content_type(content_type: &str) -> Result<ContentKind> {
    // bare names and full MIME types (with parameters) are both accepted
    let normalized = content_type.trim().to_ascii_lowercase();
    let mut subtype = normalized.as_str();
    if let Some((before, _)) = subtype.split_once(';') {
        subtype = before;
    }
    if let Some((_, after)) = subtype.rsplit_once('/') {
        subtype = after;
    }
    match subtype.trim().trim_start_matches("fhir+") {
        "json" => Ok(ContentKind::Json),
        "yaml" | "yml" | "x-yaml" => Ok(ContentKind::Yaml),
        "xml" => Ok(ContentKind::Xml),
        _ => Err(FormatError::UnknownContentType(content_type.to_string())),
    }
}

fn kind_from_extension(path: &Path) -> Option<ContentKind> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "json" => Some(ContentKind::Json),
        "yaml" | "yml" => Some(ContentKind::Yaml),
        "xml" => Some(ContentKind::Xml),
        _ => None,
    }
}

fn sniff(data: &[u8]) -> ContentKind {
    match data.iter().copied().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => ContentKind::Json,
        Some(b'<') => ContentKind::Xml,
        _ => ContentKind::Yaml,
    }
}

fn into_mapping(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(FormatError::ExpectedObject),
    }
}

/// Decode raw bytes into a mapping, detecting the encoding when no content
/// type is given. A custom `json_loads` (from the model configuration)
/// replaces the default JSON decoder.
pub fn load_str_bytes(
    data: &[u8],
    content_type: Option<&str>,
    json_loads: Option<JsonLoads>,
) -> Result<Map<String, Value>> {
    let kind = match content_type {
        Some(ct) => kind_from_content_type(ct)?,
        None => sniff(data),
    };
    match kind {
        ContentKind::Json => {
            let loads = json_loads.unwrap_or_else(crate::json::default_json_loads);
            into_mapping(loads(data)?)
        }
        ContentKind::Yaml => {
            let text = String::from_utf8(data.to_vec())?;
            into_mapping(crate::yaml::yaml_loads(&text)?)
        }
        ContentKind::Xml => {
            let text = String::from_utf8(data.to_vec())?;
            Ok(crate::xml::xml_loads(&text)?)
        }
    }
}

/// Load a file into a mapping, detecting the encoding from the explicit
/// content type, then the file extension, then the content itself.
pub fn load_file(
    path: &Path,
    content_type: Option<&str>,
    json_loads: Option<JsonLoads>,
) -> Result<Map<String, Value>> {
    let data = fs::read(path)?;
    let kind = match content_type {
        Some(ct) => Some(kind_from_content_type(ct)?),
        None => kind_from_extension(path),
    };
    match kind {
        Some(ContentKind::Json) => {
            let loads = json_loads.unwrap_or_else(crate::json::default_json_loads);
            into_mapping(loads(&data)?)
        }
        Some(ContentKind::Yaml) => {
            let text = String::from_utf8(data)?;
            into_mapping(crate::yaml::yaml_loads(&text)?)
        }
        Some(ContentKind::Xml) => {
            let text = String::from_utf8(data)?;
            Ok(crate::xml::xml_loads(&text)?)
        }
        None => load_str_bytes(&data, None, json_loads),
    }
}
