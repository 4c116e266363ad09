//! Runtime values held by record fields.
//!
//! A closed set of shapes: validation coerces raw JSON into exactly one of
//! these, and serialization dispatches on the variant. `Json` is the opaque
//! passthrough for fields declared without further structure.

use crate::record::Record;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value as JsonValue};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Enum(EnumValue),
    List(Vec<Value>),
    Record(Record),
    Json(JsonValue),
}

/// An enumeration member: the declared variant token paired with the scalar
/// it stands for on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub variant: String,
    pub value: Box<Value>,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Lenient coercion from raw JSON, used where validation is switched off
    /// (assignment with `validate_assignment = false`).
    pub fn from_json(raw: &JsonValue) -> Value {
        match raw {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(int) => Value::Integer(int),
                None => Decimal::from_str(&n.to_string())
                    .map(Value::Decimal)
                    .unwrap_or_else(|_| Value::Json(raw.clone())),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(_) => Value::Json(raw.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

/// Render a decimal as a JSON number, falling back to its exact string form
/// when the value is not representable as a finite double.
pub(crate) fn decimal_to_json(decimal: &Decimal) -> JsonValue {
    decimal
        .to_f64()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(decimal.to_string()))
}
