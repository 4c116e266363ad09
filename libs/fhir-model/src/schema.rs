//! Record schemas: declared fields, type tags, per-type configuration.
//!
//! A `RecordSchema` is the runtime stand-in for a generated record class:
//! it carries declared-field introspection (name, alias, primitive flag,
//! declared type), the fixed type tag, the ancestry chain used for
//! resource-base classification, and the per-type validation hooks.

use crate::error::ConfigError;
use crate::hooks::{PreHook, PostHook};
use opal_format::{default_json_dumps, default_json_loads, JsonDumps, JsonLoads};
use std::sync::{Arc, OnceLock, RwLock};

/// Wire key for embedded comment annotations.
pub const FHIR_COMMENTS: &str = "fhir_comments";

/// Field name of the single implicit value in a wrapped-scalar record.
pub const ROOT_FIELD: &str = "__root__";

/// Declared field types. Closed set: validation and serialization both
/// dispatch on it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Boolean,
    Integer,
    PositiveInt,
    UnsignedInt,
    Decimal,
    String,
    Uri,
    Date,
    DateTime,
    /// A coded token; `None` accepts any token, `Some` restricts to the
    /// declared variants.
    Code(Option<Vec<CodeVariant>>),
    /// Embedded comment annotations: a string or a list of strings.
    Comments,
    List(Box<FieldType>),
    /// A nested record, resolved by type name through the registry.
    Record(String),
    /// Opaque passthrough, kept as raw JSON.
    Json,
}

impl FieldType {
    /// FHIR primitive/non-primitive classification. Lists classify by their
    /// element type; nested records and opaque values are non-primitive.
    pub fn is_primitive(&self) -> bool {
        match self {
            FieldType::List(inner) => inner.is_primitive(),
            FieldType::Record(_) | FieldType::Json | FieldType::Comments => false,
            _ => true,
        }
    }
}

/// One declared enumeration member: variant token plus its wire scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeVariant {
    pub name: String,
    pub value: String,
}

impl CodeVariant {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        CodeVariant {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub alias: String,
    pub ty: FieldType,
    pub required: bool,
    /// Semantic element vs. bookkeeping (type tag, comments, extension
    /// companions).
    pub element_property: bool,
    /// Name of the companion extension field carrying out-of-band annotation
    /// data for this primitive. Declared explicitly; never derived from the
    /// field name at serialization time.
    pub extension: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        FieldDescriptor {
            alias: name.clone(),
            name,
            ty,
            required: false,
            element_property: true,
            extension: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn bookkeeping(mut self) -> Self {
        self.element_property = false;
        self
    }

    pub fn extension(mut self, companion: impl Into<String>) -> Self {
        self.extension = Some(companion.into());
        self
    }
}

/// Per-type configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Construction accepts internal field names in addition to wire aliases.
    pub populate_by_name: bool,
    /// Unknown input keys fail construction.
    pub forbid_extra: bool,
    /// Post-construction mutation re-runs field validation.
    pub validate_assignment: bool,
    /// Enumeration values serialize as their underlying scalar rather than
    /// the variant token.
    pub use_enum_values: bool,
    /// Message for the "unexpected extra field" error.
    pub extra_field_template: String,
    pub json_dumps: JsonDumps,
    pub json_loads: JsonLoads,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            populate_by_name: true,
            forbid_extra: true,
            validate_assignment: true,
            use_enum_values: false,
            extra_field_template: "extra fields not permitted".to_string(),
            json_dumps: default_json_dumps(),
            json_loads: default_json_loads(),
        }
    }
}

/// Schema of one record type.
#[derive(Debug)]
pub struct RecordSchema {
    name: String,
    namespace: Option<String>,
    type_tag: String,
    base: Option<Arc<RecordSchema>>,
    fields: Vec<FieldDescriptor>,
    config: ModelConfig,
    // per-type memos, first-write-wins (safe under concurrent reads)
    elements: OnceLock<Vec<String>>,
    resource_base: OnceLock<bool>,
    pub(crate) pre_validators: RwLock<Vec<PreHook>>,
    pub(crate) post_validators: RwLock<Vec<PostHook>>,
}

impl RecordSchema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        let name = name.into();
        SchemaBuilder {
            type_tag: name.clone(),
            name,
            namespace: None,
            base: None,
            fields: Vec::new(),
            config: ModelConfig::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified type name, used in error messages.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// The declared type tag. Pure per-type fact; the schema is the memo.
    pub fn get_resource_type(&self) -> &str {
        &self.type_tag
    }

    pub fn base(&self) -> Option<&Arc<RecordSchema>> {
        self.base.as_ref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn get_json_encoder(&self) -> JsonDumps {
        self.config.json_dumps
    }

    /// Ordered internal names of the semantic element fields. Drives wire
    /// order of serialized output; memoized since it is invariant per type.
    pub fn elements_sequence(&self) -> &[String] {
        self.elements.get_or_init(|| {
            self.fields
                .iter()
                .filter(|f| f.element_property)
                .map(|f| f.name.clone())
                .collect()
        })
    }

    /// Whether this type descends from the genuine resource ancestor, as
    /// opposed to a value object embedded inside one. Memoized per type.
    pub fn has_resource_base(&self) -> bool {
        *self.resource_base.get_or_init(|| {
            let mut current = Some(self);
            while let Some(schema) = current {
                if schema.name == "Resource" {
                    return true;
                }
                current = schema.base.as_deref();
            }
            false
        })
    }

    /// A wrapped-scalar record carries a single implicit value and
    /// serializes as that scalar rather than a one-key mapping.
    pub fn is_wrapped_scalar(&self) -> bool {
        let elements = self.elements_sequence();
        elements.len() == 1 && elements[0] == ROOT_FIELD
    }

    /// Ancestry chain, base-most first (hook execution order).
    pub(crate) fn ancestry(self: &Arc<Self>) -> Vec<Arc<RecordSchema>> {
        let mut chain = Vec::new();
        let mut current = Some(self.clone());
        while let Some(schema) = current {
            current = schema.base.clone();
            chain.push(schema);
        }
        chain.reverse();
        chain
    }
}

pub struct SchemaBuilder {
    name: String,
    namespace: Option<String>,
    type_tag: String,
    base: Option<Arc<RecordSchema>>,
    fields: Vec<FieldDescriptor>,
    config: ModelConfig,
}

impl SchemaBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = tag.into();
        self
    }

    /// Inherit from a base schema: its declared fields come first, in the
    /// base's order, exactly as a generated subclass would enumerate them.
    pub fn base(mut self, base: Arc<RecordSchema>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Declare a primitive element together with its conventional extension
    /// companion (`<name>__ext`, wire alias `_<alias>`).
    pub fn primitive_with_extension(mut self, descriptor: FieldDescriptor) -> Self {
        let companion_name = format!("{}__ext", descriptor.name);
        let companion_alias = format!("_{}", descriptor.alias);
        let companion = FieldDescriptor::new(companion_name.clone(), FieldType::Json)
            .alias(companion_alias)
            .bookkeeping();
        self.fields.push(descriptor.extension(companion_name));
        self.fields.push(companion);
        self
    }

    pub fn build(self) -> Result<RecordSchema, ConfigError> {
        let mut fields: Vec<FieldDescriptor> = match &self.base {
            Some(base) => base
                .fields()
                .iter()
                .filter(|f| f.name != FHIR_COMMENTS)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        fields.extend(self.fields);

        // comments are declared on every type, last, as bookkeeping
        fields.push(
            FieldDescriptor::new(FHIR_COMMENTS, FieldType::Comments)
                .alias(FHIR_COMMENTS)
                .bookkeeping(),
        );

        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateFieldName {
                    type_name: self.name.clone(),
                    name: field.name.clone(),
                });
            }
        }
        for field in &fields {
            if let Some(companion) = &field.extension {
                if !fields.iter().any(|f| &f.name == companion) {
                    return Err(ConfigError::UnknownExtensionCompanion {
                        field: field.name.clone(),
                        companion: companion.clone(),
                    });
                }
            }
        }

        Ok(RecordSchema {
            name: self.name,
            namespace: self.namespace,
            type_tag: self.type_tag,
            base: self.base,
            fields,
            config: self.config,
            elements: OnceLock::new(),
            resource_base: OnceLock::new(),
            pre_validators: RwLock::new(Vec::new()),
            post_validators: RwLock::new(Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold() -> Arc<RecordSchema> {
        Arc::new(
            RecordSchema::builder("Resource")
                .field(FieldDescriptor::new("id", FieldType::String))
                .build()
                .expect("schema builds"),
        )
    }

    #[test]
    fn elements_exclude_bookkeeping() {
        let schema = RecordSchema::builder("HumanName")
            .field(FieldDescriptor::new("family", FieldType::String))
            .primitive_with_extension(FieldDescriptor::new("given", FieldType::String))
            .build()
            .expect("schema builds");

        assert_eq!(schema.elements_sequence(), ["family", "given"]);
    }

    #[test]
    fn resource_base_walks_ancestry() {
        let resource = scaffold();
        let domain = Arc::new(
            RecordSchema::builder("DomainResource")
                .base(resource.clone())
                .build()
                .expect("schema builds"),
        );
        let patient = Arc::new(
            RecordSchema::builder("Patient")
                .base(domain)
                .field(FieldDescriptor::new("active", FieldType::Boolean))
                .build()
                .expect("schema builds"),
        );
        let name = Arc::new(
            RecordSchema::builder("HumanName")
                .field(FieldDescriptor::new("family", FieldType::String))
                .build()
                .expect("schema builds"),
        );

        assert!(resource.has_resource_base());
        assert!(patient.has_resource_base());
        assert!(!name.has_resource_base());
        // memoized: second call answers from the per-type cache
        assert!(patient.has_resource_base());
    }

    #[test]
    fn base_fields_come_first() {
        let resource = scaffold();
        let patient = RecordSchema::builder("Patient")
            .base(resource)
            .field(FieldDescriptor::new("active", FieldType::Boolean))
            .build()
            .expect("schema builds");

        assert_eq!(patient.elements_sequence(), ["id", "active"]);
    }

    #[test]
    fn duplicate_field_rejected() {
        let result = RecordSchema::builder("Broken")
            .field(FieldDescriptor::new("status", FieldType::String))
            .field(FieldDescriptor::new("status", FieldType::Boolean))
            .build();

        assert!(matches!(
            result,
            Err(ConfigError::DuplicateFieldName { .. })
        ));
    }

    #[test]
    fn undeclared_extension_companion_rejected() {
        let result = RecordSchema::builder("Broken")
            .field(FieldDescriptor::new("status", FieldType::String).extension("status__ext"))
            .build();

        assert!(matches!(
            result,
            Err(ConfigError::UnknownExtensionCompanion { .. })
        ));
    }
}
