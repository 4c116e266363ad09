//! The record type: construction, mutation, serialized forms.
//!
//! A record pairs a schema with a typed field map. Construction validates
//! the type tag, runs the registered hooks around field validation, and
//! fails with accumulated, located errors. Serialization enumerates the
//! declared element fields in canonical order, converts values recursively,
//! and never emits empty containers.

use crate::error::{Error, ErrorKind, FieldError, Result, ValidationError, ROOT_LOC};
use crate::prune::prune_empty;
use crate::registry::SchemaRegistry;
use crate::schema::{RecordSchema, FHIR_COMMENTS, ROOT_FIELD};
use crate::validate::{validate_fields, validate_single};
use crate::value::{decimal_to_json, Value};
use opal_format::EncodeOptions;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Conversion callback for values the JSON encoder does not natively
/// understand (decimals; enumeration members when the schema keeps tokens).
pub type ScalarEncoder = fn(&Value) -> JsonValue;

/// Flags of the mapping form.
#[derive(Debug, Clone, Copy)]
pub struct DictOptions {
    pub by_alias: bool,
    pub exclude_none: bool,
    pub exclude_comments: bool,
}

impl Default for DictOptions {
    fn default() -> Self {
        DictOptions {
            by_alias: true,
            exclude_none: true,
            exclude_comments: false,
        }
    }
}

/// Flags of the JSON text form. Unset `by_alias`/`exclude_none` default to
/// true, matching the mapping form.
#[derive(Debug, Clone, Default)]
pub struct JsonOptions {
    pub by_alias: Option<bool>,
    pub exclude_none: Option<bool>,
    pub exclude_comments: bool,
    pub exclude: Option<ExcludeSpec>,
    pub encoder: Option<ScalarEncoder>,
    pub encode: EncodeOptions,
}

/// Flags of the YAML form.
#[derive(Debug, Clone, Default)]
pub struct YamlOptions {
    pub by_alias: Option<bool>,
    pub exclude_none: Option<bool>,
    pub exclude: Option<ExcludeSpec>,
}

/// An exclusion set: a flat set of keys, or a per-key mapping descending
/// into nested structures (`__all__` addresses every element of a list).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExcludeSpec {
    entries: HashMap<String, Option<ExcludeSpec>>,
}

impl ExcludeSpec {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExcludeSpec {
            entries: names.into_iter().map(|n| (n.into(), None)).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Parse a specification supplied as dynamic JSON configuration: an
    /// array of names (a set) or an object (per-key mapping, values being
    /// `true`/`null` for whole-field exclusion or a nested specification).
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Array(items) => {
                let mut entries = HashMap::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(name) => {
                            entries.insert(name.to_string(), None);
                        }
                        None => return Err(Error::UnsupportedExclude(json_type_name(item))),
                    }
                }
                Ok(ExcludeSpec { entries })
            }
            JsonValue::Object(map) => {
                let mut entries = HashMap::with_capacity(map.len());
                for (key, item) in map {
                    let entry = match item {
                        JsonValue::Null | JsonValue::Bool(true) => None,
                        JsonValue::String(s) if s == "..." => None,
                        JsonValue::Array(_) | JsonValue::Object(_) => {
                            Some(ExcludeSpec::from_value(item)?)
                        }
                        other => return Err(Error::UnsupportedExclude(json_type_name(other))),
                    };
                    entries.insert(key.clone(), entry);
                }
                Ok(ExcludeSpec { entries })
            }
            other => Err(Error::UnsupportedExclude(json_type_name(other))),
        }
    }

    fn apply(&self, map: &mut Map<String, JsonValue>) {
        for (key, entry) in &self.entries {
            match entry {
                None => {
                    map.remove(key);
                }
                Some(nested) => match map.get_mut(key) {
                    Some(JsonValue::Object(obj)) => nested.apply(obj),
                    Some(JsonValue::Array(items)) => {
                        if let Some(Some(each)) = nested.entries.get("__all__") {
                            for item in items {
                                if let JsonValue::Object(obj) = item {
                                    each.apply(obj);
                                }
                            }
                        }
                    }
                    _ => {}
                },
            }
        }
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[derive(Clone, Copy)]
struct IterOptions {
    by_alias: bool,
    exclude_none: bool,
    exclude_comments: bool,
    encoder: Option<ScalarEncoder>,
}

/// One structured record instance.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    registry: Arc<SchemaRegistry>,
    fields: HashMap<String, Value>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.fields == other.fields
    }
}

impl Record {
    /// Construct from a raw JSON value (must be a mapping).
    ///
    /// A supplied type tag (under `resource_type`, or `resourceType` when no
    /// declared field claims that name) must equal the schema's fixed tag;
    /// anything else fails before field validation begins.
    pub fn parse_value(
        schema: &Arc<RecordSchema>,
        registry: &Arc<SchemaRegistry>,
        value: JsonValue,
    ) -> Result<Record> {
        let mut data = match value {
            JsonValue::Object(map) => map,
            other => {
                return Err(ValidationError::single(
                    schema.qualified_name(),
                    ROOT_LOC,
                    ErrorKind::Type {
                        message: format!(
                            "record input must be a mapping, got {}",
                            json_type_name(&other)
                        ),
                    },
                )
                .into());
            }
        };

        check_resource_type(schema, &mut data)?;

        let chain = schema.ancestry();
        for ancestor in &chain {
            let hooks = ancestor
                .pre_validators
                .read()
                .expect("hook lock poisoned")
                .clone();
            for hook in &hooks {
                (hook.func)(schema, &mut data).map_err(|message| {
                    Error::from(ValidationError::single(
                        schema.qualified_name(),
                        ROOT_LOC,
                        ErrorKind::Custom { message },
                    ))
                })?;
            }
        }

        let (fields, mut errors) = validate_fields(schema, registry, &data);

        for ancestor in &chain {
            let hooks = ancestor
                .post_validators
                .read()
                .expect("hook lock poisoned")
                .clone();
            for hook in &hooks {
                if hook.skip_on_failure && !errors.is_empty() {
                    continue;
                }
                if let Err(message) = (hook.func)(schema, &fields) {
                    errors.push(FieldError::new(ROOT_LOC, ErrorKind::Custom { message }));
                }
            }
        }

        if !errors.is_empty() {
            return Err(ValidationError {
                type_name: schema.qualified_name(),
                errors,
            }
            .into());
        }

        Ok(Record {
            schema: schema.clone(),
            registry: registry.clone(),
            fields,
        })
    }

    /// Construct from raw bytes or text; decode failures surface as a
    /// validation error at the synthetic root location.
    pub fn parse_raw(
        schema: &Arc<RecordSchema>,
        registry: &Arc<SchemaRegistry>,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<Record> {
        let map =
            opal_format::load_str_bytes(data, content_type, Some(schema.config().json_loads))
                .map_err(|e| {
                    Error::from(ValidationError::single(
                        schema.qualified_name(),
                        ROOT_LOC,
                        ErrorKind::Decode {
                            message: e.to_string(),
                        },
                    ))
                })?;
        Self::parse_value(schema, registry, JsonValue::Object(map))
    }

    /// Construct from a file, detecting the encoding from the content type,
    /// the extension, or the content itself.
    pub fn parse_file(
        schema: &Arc<RecordSchema>,
        registry: &Arc<SchemaRegistry>,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<Record> {
        let map = opal_format::load_file(path, content_type, Some(schema.config().json_loads))?;
        Self::parse_value(schema, registry, JsonValue::Object(map))
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn resource_type(&self) -> &str {
        self.schema.get_resource_type()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Assign a field from raw JSON. Re-runs that field's validation when
    /// the schema is configured for validate-on-assignment; a failed
    /// assignment leaves the record unchanged.
    pub fn set(&mut self, name: &str, raw: JsonValue) -> Result<()> {
        let descriptor = self.schema.field(name).ok_or_else(|| {
            Error::from(ValidationError::single(
                self.schema.qualified_name(),
                name,
                ErrorKind::ExtraField {
                    message: self.schema.config().extra_field_template.clone(),
                },
            ))
        })?;

        let value = if self.schema.config().validate_assignment {
            validate_single(&self.schema, &self.registry, descriptor, &raw)?
        } else {
            Value::from_json(&raw)
        };
        self.fields.insert(descriptor.name.clone(), value);
        Ok(())
    }

    /// The ordered mapping form.
    pub fn dict(&self, options: &DictOptions) -> Map<String, JsonValue> {
        self.to_mapping(&IterOptions {
            by_alias: options.by_alias,
            exclude_none: options.exclude_none,
            exclude_comments: options.exclude_comments,
            encoder: None,
        })
    }

    /// The JSON text form.
    pub fn json(&self, options: &JsonOptions) -> Result<String> {
        let bytes = self.encode_json(options)?;
        String::from_utf8(bytes).map_err(|e| Error::Format(opal_format::FormatError::Utf8(e)))
    }

    /// The JSON text form as raw bytes.
    pub fn json_bytes(&self, options: &JsonOptions) -> Result<Vec<u8>> {
        self.encode_json(options)
    }

    /// The YAML-oriented mapping form: the type tag field never serializes
    /// as a field, and resources re-inject it the same way the mapping form
    /// does.
    pub fn yaml_dict(&self, options: &YamlOptions) -> Map<String, JsonValue> {
        let exclude_comments = options
            .exclude
            .as_ref()
            .is_some_and(|e| e.contains(FHIR_COMMENTS));
        let mut mapping = self.to_mapping(&IterOptions {
            by_alias: options.by_alias.unwrap_or(true),
            exclude_none: options.exclude_none.unwrap_or(true),
            exclude_comments,
            encoder: None,
        });
        if let Some(spec) = &options.exclude {
            spec.apply(&mut mapping);
        }
        mapping
    }

    /// The YAML text form.
    pub fn yaml(&self, options: &YamlOptions) -> Result<String> {
        let mapping = self.yaml_dict(options);
        Ok(opal_format::yaml_dumps(&JsonValue::Object(mapping))?)
    }

    /// The XML text form of the default mapping form.
    pub fn xml(&self) -> Result<String> {
        let mapping = self.dict(&DictOptions::default());
        Ok(opal_format::xml_dumps(&mapping)?)
    }

    fn encode_json(&self, options: &JsonOptions) -> Result<Vec<u8>> {
        // comment exclusion applies at every nesting depth
        let exclude_comments = options.exclude_comments
            || options
                .exclude
                .as_ref()
                .is_some_and(|e| e.contains(FHIR_COMMENTS));

        let mapping = self.to_mapping(&IterOptions {
            by_alias: options.by_alias.unwrap_or(true),
            exclude_none: options.exclude_none.unwrap_or(true),
            exclude_comments,
            encoder: options.encoder,
        });

        let mut data = if self.schema.is_wrapped_scalar() {
            mapping.get(ROOT_FIELD).cloned().unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Object(mapping)
        };

        if let Some(spec) = &options.exclude {
            if let JsonValue::Object(map) = &mut data {
                spec.apply(map);
            }
        }

        // stripping may have hollowed out containers whose only content was
        // comment annotations
        if exclude_comments {
            data = prune_empty(data).unwrap_or(JsonValue::Null);
        }

        let dumps = self.schema.config().json_dumps;
        Ok(dumps(&data, &options.encode)?)
    }

    fn to_mapping(&self, options: &IterOptions) -> Map<String, JsonValue> {
        let mut out = Map::new();

        if self.schema.has_resource_base() {
            out.insert(
                "resourceType".to_string(),
                JsonValue::String(self.schema.type_tag().to_string()),
            );
        }

        for name in self.schema.elements_sequence() {
            let Some(descriptor) = self.schema.field(name) else {
                continue;
            };
            let key = if options.by_alias {
                descriptor.alias.clone()
            } else {
                descriptor.name.clone()
            };

            match self.fields.get(name) {
                Some(value) if !value.is_null() => {
                    let converted = self.convert_value(value, options);
                    // empty containers are treated as absent, never emitted
                    if !is_empty_container(&converted) {
                        out.insert(key, converted);
                    }
                }
                _ => {
                    if !options.exclude_none {
                        out.insert(key, JsonValue::Null);
                    }
                }
            }

            // out-of-band annotation data for primitive values
            if descriptor.ty.is_primitive() {
                if let Some(companion_name) = &descriptor.extension {
                    self.emit_extension(companion_name, options, &mut out);
                }
            }
        }

        if !options.exclude_comments {
            if let Some(comments) = self.fields.get(FHIR_COMMENTS) {
                if !comments.is_null() {
                    let key = FHIR_COMMENTS.to_string();
                    out.insert(key, self.convert_value(comments, options));
                }
            }
        }

        out
    }

    fn emit_extension(
        &self,
        companion_name: &str,
        options: &IterOptions,
        out: &mut Map<String, JsonValue>,
    ) {
        let Some(descriptor) = self.schema.field(companion_name) else {
            return;
        };
        let Some(value) = self.fields.get(companion_name) else {
            return;
        };
        if value.is_null() {
            return;
        }
        let converted = self.convert_value(value, options);
        if converted.is_null() || is_empty_container(&converted) {
            return;
        }
        let key = if options.by_alias {
            descriptor.alias.clone()
        } else {
            descriptor.name.clone()
        };
        out.insert(key, converted);
    }

    fn convert_value(&self, value: &Value, options: &IterOptions) -> JsonValue {
        match value {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::Number((*i).into()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Decimal(d) => match options.encoder {
                Some(encoder) => encoder(value),
                None => decimal_to_json(d),
            },
            Value::Enum(e) => {
                if self.schema.config().use_enum_values {
                    self.convert_value(&e.value, options)
                } else {
                    match options.encoder {
                        Some(encoder) => encoder(value),
                        None => JsonValue::String(e.variant.clone()),
                    }
                }
            }
            Value::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| {
                        let converted = self.convert_value(item, options);
                        if options.exclude_none && is_empty_container(&converted) {
                            JsonValue::Null
                        } else {
                            converted
                        }
                    })
                    .collect(),
            ),
            Value::Record(record) => {
                let mapping = record.to_mapping(options);
                if record.schema.is_wrapped_scalar() {
                    // a wrapped scalar unwraps to its single implicit value
                    if let Some(root) = mapping.get(ROOT_FIELD) {
                        return root.clone();
                    }
                }
                JsonValue::Object(mapping)
            }
            Value::Json(raw) => self.convert_json(raw, options),
        }
    }

    fn convert_json(&self, raw: &JsonValue, options: &IterOptions) -> JsonValue {
        match raw {
            JsonValue::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    if options.exclude_comments && key == FHIR_COMMENTS {
                        continue;
                    }
                    let converted = self.convert_json(item, options);
                    if options.exclude_none && is_empty_container(&converted) {
                        out.insert(key.clone(), JsonValue::Null);
                    } else {
                        out.insert(key.clone(), converted);
                    }
                }
                JsonValue::Object(out)
            }
            JsonValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| {
                        let converted = self.convert_json(item, options);
                        if options.exclude_none && is_empty_container(&converted) {
                            JsonValue::Null
                        } else {
                            converted
                        }
                    })
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }
}

impl serde::Serialize for Record {
    /// Serializes the default mapping form (aliases on, empties omitted),
    /// unwrapping wrapped scalars.
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mapping = self.dict(&DictOptions::default());
        if self.schema.is_wrapped_scalar() {
            if let Some(root) = mapping.get(ROOT_FIELD) {
                return serde::Serialize::serialize(root, serializer);
            }
        }
        serde::Serialize::serialize(&mapping, serializer)
    }
}

fn is_empty_container(value: &JsonValue) -> bool {
    match value {
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn check_resource_type(
    schema: &Arc<RecordSchema>,
    data: &mut Map<String, JsonValue>,
) -> Result<()> {
    let mut supplied = data.remove("resource_type");

    let claims_wire_key = schema
        .fields()
        .iter()
        .any(|f| f.name == "resourceType" || f.alias == "resourceType");
    if !claims_wire_key {
        if let Some(tag) = data.remove("resourceType") {
            supplied = Some(tag);
        }
    }

    match supplied {
        Some(tag) if !tag.is_null() => {
            let given = match tag.as_str() {
                Some(s) => s.to_string(),
                None => tag.to_string(),
            };
            if given != schema.type_tag() {
                return Err(ValidationError::single(
                    schema.qualified_name(),
                    "resource_type",
                    ErrorKind::WrongResourceType {
                        expected: schema.type_tag().to_string(),
                        given,
                        qualified_name: schema.qualified_name(),
                    },
                )
                .into());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
