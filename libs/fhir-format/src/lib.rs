//! FHIR wire-format helpers.
//!
//! Text encodings for the mapping form produced by `opal-model`:
//! - `json`: pluggable JSON encoder/decoder slots with an explicit
//!   startup-selected default.
//! - `yaml`: YAML encoding via `serde_yaml`.
//! - `xml`: the official FHIR JSON/XML mapping rules (root element named by
//!   `resourceType`, primitives carried in `value` attributes, primitive
//!   metadata aligned through `_field` entries).
//! - `loader`: format-detecting byte/file loading into a JSON mapping.
//!
//! Everything here operates on plain `serde_json` values; model semantics
//! (field order, empty-value omission, comment stripping) live upstream.

pub mod json;
pub mod loader;
pub mod xml;
pub mod yaml;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("expected a JSON object for the resource")]
    ExpectedObject,
    #[error("missing resourceType property")]
    MissingResourceType,
    #[error("unrecognized content type: {0}")]
    UnknownContentType(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FormatError>;

pub use json::{default_json_dumps, default_json_loads, EncodeOptions, JsonDumps, JsonLoads};
pub use loader::{load_file, load_str_bytes};
pub use xml::{xml_dumps, xml_loads};
pub use yaml::{yaml_dumps, yaml_loads};
