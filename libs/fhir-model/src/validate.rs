//! Per-field validation: alias resolution, required checks, type coercion.
//!
//! This is the capability the source delegated to its validation framework,
//! made explicit: raw JSON in, typed values and accumulated field errors
//! out. Nothing here fails fast; callers decide what a batch of errors
//! means.

use crate::error::{ErrorKind, FieldError, ValidationError};
use crate::record::Record;
use crate::registry::SchemaRegistry;
use crate::schema::{FieldDescriptor, FieldType, RecordSchema};
use crate::value::Value;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

// Lexical forms from the FHIR datatypes specification. Partial dates are
// legal, so these are patterns, not calendar parses.
const DATE_PATTERN: &str = r"^([0-9]([0-9]([0-9][1-9]|[1-9]0)|[1-9]00)|[1-9]000)(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1]))?)?$";
const DATETIME_PATTERN: &str = r"^([0-9]([0-9]([0-9][1-9]|[1-9]0)|[1-9]00)|[1-9]000)(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1])(T([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?(Z|(\+|-)((0[0-9]|1[0-3]):[0-5][0-9]|14:00)))?)?)?$";
const CODE_PATTERN: &str = r"^[^\s]+(\s[^\s]+)*$";

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DATE_PATTERN).expect("date pattern is valid"))
}

fn datetime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DATETIME_PATTERN).expect("datetime pattern is valid"))
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CODE_PATTERN).expect("code pattern is valid"))
}

/// Validate a raw mapping against the schema's declared fields.
///
/// Returns the typed field map plus every accumulated error; the caller
/// combines them with hook failures before deciding the outcome.
pub(crate) fn validate_fields(
    schema: &RecordSchema,
    registry: &Arc<SchemaRegistry>,
    data: &Map<String, JsonValue>,
) -> (HashMap<String, Value>, Vec<FieldError>) {
    let mut fields = HashMap::new();
    let mut errors = Vec::new();
    let mut consumed: Vec<&str> = Vec::new();

    for descriptor in schema.fields() {
        let raw = match data.get(&descriptor.alias) {
            Some(raw) => {
                consumed.push(descriptor.alias.as_str());
                Some(raw)
            }
            None if schema.config().populate_by_name && descriptor.name != descriptor.alias => {
                match data.get(&descriptor.name) {
                    Some(raw) => {
                        consumed.push(descriptor.name.as_str());
                        Some(raw)
                    }
                    None => None,
                }
            }
            None => None,
        };

        match raw {
            None => {
                if descriptor.required {
                    errors.push(FieldError::new(&descriptor.name, ErrorKind::Missing));
                }
            }
            Some(JsonValue::Null) => {
                if descriptor.required {
                    errors.push(FieldError::new(
                        &descriptor.name,
                        ErrorKind::Type {
                            message: "none is not an allowed value".to_string(),
                        },
                    ));
                } else {
                    fields.insert(descriptor.name.clone(), Value::Null);
                }
            }
            Some(raw) => {
                if let Some(value) =
                    coerce(&descriptor.ty, registry, raw, &descriptor.name, &mut errors)
                {
                    fields.insert(descriptor.name.clone(), value);
                }
            }
        }
    }

    if schema.config().forbid_extra {
        for key in data.keys() {
            if !consumed.contains(&key.as_str()) {
                errors.push(FieldError::new(
                    key,
                    ErrorKind::ExtraField {
                        message: schema.config().extra_field_template.clone(),
                    },
                ));
            }
        }
    }

    (fields, errors)
}

/// Validate one field in isolation (assignment path).
pub(crate) fn validate_single(
    schema: &RecordSchema,
    registry: &Arc<SchemaRegistry>,
    descriptor: &FieldDescriptor,
    raw: &JsonValue,
) -> std::result::Result<Value, ValidationError> {
    if raw.is_null() {
        if descriptor.required {
            return Err(ValidationError::single(
                schema.qualified_name(),
                &descriptor.name,
                ErrorKind::Type {
                    message: "none is not an allowed value".to_string(),
                },
            ));
        }
        return Ok(Value::Null);
    }

    let mut errors = Vec::new();
    match coerce(&descriptor.ty, registry, raw, &descriptor.name, &mut errors) {
        Some(value) if errors.is_empty() => Ok(value),
        _ => Err(ValidationError {
            type_name: schema.qualified_name(),
            errors,
        }),
    }
}

fn type_error(loc: &str, message: impl Into<String>, errors: &mut Vec<FieldError>) {
    errors.push(FieldError::new(
        loc,
        ErrorKind::Type {
            message: message.into(),
        },
    ));
}

fn coerce(
    ty: &FieldType,
    registry: &Arc<SchemaRegistry>,
    raw: &JsonValue,
    loc: &str,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    match ty {
        FieldType::Boolean => match raw.as_bool() {
            Some(b) => Some(Value::Boolean(b)),
            None => {
                type_error(loc, "value is not a valid boolean", errors);
                None
            }
        },
        FieldType::Integer => match raw.as_i64() {
            Some(int) => Some(Value::Integer(int)),
            None => {
                type_error(loc, "value is not a valid integer", errors);
                None
            }
        },
        FieldType::PositiveInt => match raw.as_i64() {
            Some(int) if int >= 1 => Some(Value::Integer(int)),
            Some(_) => {
                type_error(loc, "ensure this value is greater than 0", errors);
                None
            }
            None => {
                type_error(loc, "value is not a valid integer", errors);
                None
            }
        },
        FieldType::UnsignedInt => match raw.as_i64() {
            Some(int) if int >= 0 => Some(Value::Integer(int)),
            Some(_) => {
                type_error(loc, "ensure this value is greater than or equal to 0", errors);
                None
            }
            None => {
                type_error(loc, "value is not a valid integer", errors);
                None
            }
        },
        FieldType::Decimal => match raw {
            JsonValue::Number(n) => match Decimal::from_str(&n.to_string()) {
                Ok(decimal) => Some(Value::Decimal(decimal)),
                Err(_) => {
                    type_error(loc, "value is not a valid decimal", errors);
                    None
                }
            },
            _ => {
                type_error(loc, "value is not a valid decimal", errors);
                None
            }
        },
        FieldType::String | FieldType::Uri => match raw.as_str() {
            Some(s) => Some(Value::String(s.to_string())),
            None => {
                type_error(loc, "value is not a valid string", errors);
                None
            }
        },
        FieldType::Date => match raw.as_str() {
            Some(s) if date_re().is_match(s) => Some(Value::String(s.to_string())),
            Some(_) => {
                type_error(loc, "invalid date format", errors);
                None
            }
            None => {
                type_error(loc, "value is not a valid string", errors);
                None
            }
        },
        FieldType::DateTime => match raw.as_str() {
            Some(s) if datetime_re().is_match(s) => Some(Value::String(s.to_string())),
            Some(_) => {
                type_error(loc, "invalid datetime format", errors);
                None
            }
            None => {
                type_error(loc, "value is not a valid string", errors);
                None
            }
        },
        FieldType::Code(variants) => match raw.as_str() {
            Some(s) => match variants {
                None => {
                    if code_re().is_match(s) {
                        Some(Value::String(s.to_string()))
                    } else {
                        type_error(loc, "invalid code format", errors);
                        None
                    }
                }
                Some(variants) => match variants.iter().find(|v| v.value == s) {
                    Some(variant) => Some(Value::Enum(crate::value::EnumValue {
                        variant: variant.name.clone(),
                        value: Box::new(Value::String(variant.value.clone())),
                    })),
                    None => {
                        let permitted: Vec<&str> =
                            variants.iter().map(|v| v.value.as_str()).collect();
                        type_error(
                            loc,
                            format!(
                                "value is not a valid enumeration member; permitted: {}",
                                permitted.join(", ")
                            ),
                            errors,
                        );
                        None
                    }
                },
            },
            None => {
                type_error(loc, "value is not a valid string", errors);
                None
            }
        },
        FieldType::Comments => match raw {
            JsonValue::String(s) => Some(Value::String(s.clone())),
            JsonValue::Array(items) => {
                let mut comments = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) => comments.push(Value::String(s.to_string())),
                        None => {
                            type_error(loc, "comments must be strings", errors);
                            return None;
                        }
                    }
                }
                Some(Value::List(comments))
            }
            _ => {
                type_error(loc, "comments must be a string or a list of strings", errors);
                None
            }
        },
        FieldType::List(inner) => match raw {
            JsonValue::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                let mut failed = false;
                for (idx, item) in items.iter().enumerate() {
                    if item.is_null() {
                        values.push(Value::Null);
                        continue;
                    }
                    let item_loc = format!("{loc}.{idx}");
                    match coerce(inner, registry, item, &item_loc, errors) {
                        Some(value) => values.push(value),
                        None => failed = true,
                    }
                }
                if failed {
                    None
                } else {
                    Some(Value::List(values))
                }
            }
            _ => {
                type_error(loc, "value is not a valid list", errors);
                None
            }
        },
        FieldType::Record(type_name) => {
            let nested_schema = match registry.get(type_name) {
                Some(schema) => schema,
                None => {
                    type_error(loc, format!("unknown record type '{type_name}'"), errors);
                    return None;
                }
            };
            // wrapped scalars accept their bare value and wrap it
            let raw = if nested_schema.is_wrapped_scalar() && !raw.is_object() {
                let mut wrapped = Map::new();
                wrapped.insert(crate::schema::ROOT_FIELD.to_string(), raw.clone());
                JsonValue::Object(wrapped)
            } else {
                raw.clone()
            };
            if !raw.is_object() {
                type_error(loc, "value is not a valid dict", errors);
                return None;
            }
            match Record::parse_value(&nested_schema, registry, raw) {
                Ok(record) => Some(Value::Record(record)),
                Err(crate::error::Error::Validation(nested)) => {
                    errors.extend(nested.errors.into_iter().map(|e| e.prefixed(loc)));
                    None
                }
                Err(other) => {
                    type_error(loc, other.to_string(), errors);
                    None
                }
            }
        }
        FieldType::Json => Some(Value::Json(raw.clone())),
    }
}
