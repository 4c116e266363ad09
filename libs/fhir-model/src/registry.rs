//! Schema registry: type-name → schema resolution.
//!
//! Nested record fields reference their target by name, so mutually and
//! self-recursive types (FHIR is full of them) resolve lazily through the
//! registry at validation time instead of forming reference cycles.

use crate::error::{ConfigError, Error, Result};
use crate::record::Record;
use crate::schema::RecordSchema;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<RecordSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(SchemaRegistry::default())
    }

    /// Register a schema under its type name.
    pub fn register(
        &self,
        schema: RecordSchema,
    ) -> std::result::Result<Arc<RecordSchema>, ConfigError> {
        let mut schemas = self.schemas.write().expect("registry lock poisoned");
        let name = schema.name().to_string();
        if schemas.contains_key(&name) {
            return Err(ConfigError::DuplicateSchema(name));
        }
        let schema = Arc::new(schema);
        schemas.insert(name, schema.clone());
        Ok(schema)
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<RecordSchema>> {
        self.schemas
            .read()
            .expect("registry lock poisoned")
            .get(type_name)
            .cloned()
    }

    pub fn resolve(&self, type_name: &str) -> Result<Arc<RecordSchema>> {
        self.get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }

    /// Construct a record of the named type from a raw value — the lookup
    /// counterpart of parsing with a known schema.
    pub fn construct(self: &Arc<Self>, type_name: &str, data: JsonValue) -> Result<Record> {
        let schema = self.resolve(type_name)?;
        Record::parse_value(&schema, self, data)
    }

    /// Construct a record of the named type from raw bytes or text.
    pub fn construct_raw(
        self: &Arc<Self>,
        type_name: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<Record> {
        let schema = self.resolve(type_name)?;
        Record::parse_raw(&schema, self, data, content_type)
    }
}
