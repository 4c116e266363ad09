//! FHIR record model runtime.
//!
//! This crate provides the base machinery every structured healthcare
//! record shares, independent of any generated resource classes:
//!
//! - **Schemas** (`schema`): declared fields with wire aliases, primitive
//!   classification, a fixed type tag, ancestry, and per-type configuration.
//! - **Construction** (`record`, `registry`): type-tag validation, per-field
//!   type checking, and registered whole-object hooks, with accumulated,
//!   located errors.
//! - **Serialized forms** (`record`): an ordered mapping form plus JSON,
//!   YAML and XML text forms — empty containers are never emitted, embedded
//!   comments can be stripped at every nesting depth, and only genuine
//!   resources carry the `resourceType` discriminator.
//!
//! # Example
//!
//! ```rust
//! use opal_model::{
//!     DictOptions, FieldDescriptor, FieldType, Record, RecordSchema, SchemaRegistry,
//! };
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::new();
//! let resource = registry
//!     .register(RecordSchema::builder("Resource").build().unwrap())
//!     .unwrap();
//! let patient = registry
//!     .register(
//!         RecordSchema::builder("Patient")
//!             .base(resource)
//!             .field(FieldDescriptor::new("active", FieldType::Boolean))
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let record = Record::parse_value(
//!     &patient,
//!     &registry,
//!     json!({"resourceType": "Patient", "active": true}),
//! )
//! .unwrap();
//!
//! let mapping = record.dict(&DictOptions::default());
//! assert_eq!(mapping.keys().next().map(String::as_str), Some("resourceType"));
//! ```

pub mod error;
pub mod hooks;
pub mod prune;
pub mod record;
pub mod registry;
pub mod schema;
mod validate;
pub mod value;

pub use error::{ConfigError, Error, ErrorKind, FieldError, Result, ValidationError, ROOT_LOC};
pub use hooks::{HookOptions, PostValidatorFn, PreValidatorFn, RootValidator};
pub use prune::prune_empty;
pub use record::{DictOptions, ExcludeSpec, JsonOptions, Record, ScalarEncoder, YamlOptions};
pub use registry::SchemaRegistry;
pub use schema::{
    CodeVariant, FieldDescriptor, FieldType, ModelConfig, RecordSchema, SchemaBuilder,
    FHIR_COMMENTS, ROOT_FIELD,
};
pub use value::{EnumValue, Value};
