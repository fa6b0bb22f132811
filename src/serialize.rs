//! Attribute payload serialization.
//!
//! # Responsibility
//! - Define the codec contract the repository consumes.
//! - Provide the JSON implementation used by the shipped backends.
//!
//! # Invariants
//! - `parse(generate(map))` yields a mapping the declared attributes can
//!   typecast back into their original kinds.
//! - Reserved fields never enter the payload; the repository strips them
//!   before serialization.

use crate::model::document::AttributeMap;
use crate::model::value::Value;
use serde_json::{Map, Number, Value as JsonValue};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SerializeResult<T> = Result<T, SerializeError>;

/// Errors raised while encoding or decoding an attribute payload.
#[derive(Debug)]
pub enum SerializeError {
    Json(serde_json::Error),
    Unsupported(String),
}

impl Display for SerializeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "{err}"),
            Self::Unsupported(message) => write!(f, "unsupported payload value: {message}"),
        }
    }
}

impl Error for SerializeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Unsupported(_) => None,
        }
    }
}

impl From<serde_json::Error> for SerializeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Codec turning attribute mappings into opaque blobs and back.
pub trait Serializer {
    fn generate(&self, attributes: &AttributeMap) -> SerializeResult<String>;
    fn parse(&self, blob: &str) -> SerializeResult<AttributeMap>;
}

/// JSON codec for attribute payloads.
///
/// Identifier values serialize as their string form; the attribute
/// converter registry restores the typed value when a parsed mapping is
/// applied to a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn generate(&self, attributes: &AttributeMap) -> SerializeResult<String> {
        let mut object = Map::new();
        for (name, value) in attributes {
            object.insert(name.clone(), value_to_json(value)?);
        }
        Ok(serde_json::to_string(&JsonValue::Object(object))?)
    }

    fn parse(&self, blob: &str) -> SerializeResult<AttributeMap> {
        let parsed: JsonValue = serde_json::from_str(blob)?;
        let object = match parsed {
            JsonValue::Object(object) => object,
            other => {
                return Err(SerializeError::Unsupported(format!(
                    "expected a JSON object payload, got {other}"
                )));
            }
        };

        let mut attributes = AttributeMap::new();
        for (name, value) in object {
            // Null means the field was never set; leave it unset so the
            // declared default applies on first read.
            if value.is_null() {
                continue;
            }
            attributes.insert(name, json_to_value(value)?);
        }
        Ok(attributes)
    }
}

fn value_to_json(value: &Value) -> SerializeResult<JsonValue> {
    let json = match value {
        Value::Uuid(id) => JsonValue::String(id.to_string()),
        Value::Text(text) => JsonValue::String(text.clone()),
        Value::Integer(number) => JsonValue::Number(Number::from(*number)),
        Value::Float(number) => Number::from_f64(*number)
            .map(JsonValue::Number)
            .ok_or_else(|| {
                SerializeError::Unsupported(format!("non-finite float `{number}`"))
            })?,
        Value::Boolean(flag) => JsonValue::Bool(*flag),
    };
    Ok(json)
}

fn json_to_value(value: JsonValue) -> SerializeResult<Value> {
    match value {
        JsonValue::String(text) => Ok(Value::Text(text)),
        JsonValue::Bool(flag) => Ok(Value::Boolean(flag)),
        JsonValue::Number(number) => {
            if let Some(int) = number.as_i64() {
                Ok(Value::Integer(int))
            } else if let Some(float) = number.as_f64() {
                Ok(Value::Float(float))
            } else {
                Err(SerializeError::Unsupported(format!(
                    "number `{number}` does not fit a supported kind"
                )))
            }
        }
        JsonValue::Array(_) | JsonValue::Object(_) => Err(SerializeError::Unsupported(
            "nested arrays and objects are not attribute values".to_string(),
        )),
        JsonValue::Null => Err(SerializeError::Unsupported(
            "null is handled by the caller".to_string(),
        )),
    }
}
