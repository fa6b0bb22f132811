//! Declared attributes and value typecasting.
//!
//! # Responsibility
//! - Describe one named, typed field of a document class.
//! - Coerce incoming values through a converter registry so every stored
//!   value is an instance of its declared kind.
//!
//! # Invariants
//! - Typecasting a value already of the declared kind is identity.
//! - A registry miss is a hard `NoConverterExists` error, never a silent
//!   pass-through.
//! - Converter output must be of the declared kind.

use crate::model::value::{FieldKind, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type AttributeResult<T> = Result<T, AttributeError>;

/// Errors raised by attribute typecasting and field access.
#[derive(Debug)]
pub enum AttributeError {
    /// No converter is registered for the declared kind.
    NoConverterExists { value: Value, kind: FieldKind },
    /// A converter was found but could not produce a valid value.
    ConversionFailed { kind: FieldKind, message: String },
    /// The field name is not declared on the document class.
    UnknownAttribute { name: String },
    /// A reserved field carried a value of the wrong shape.
    InvalidReserved { name: &'static str, message: String },
}

impl Display for AttributeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoConverterExists { value, kind } => write!(
                f,
                "can't convert `{value}` to {kind}: no converter registered for {kind}"
            ),
            Self::ConversionFailed { kind, message } => {
                write!(f, "conversion to {kind} failed: {message}")
            }
            Self::UnknownAttribute { name } => write!(f, "unknown attribute `{name}`"),
            Self::InvalidReserved { name, message } => {
                write!(f, "invalid reserved field `{name}`: {message}")
            }
        }
    }
}

impl Error for AttributeError {}

type Converter = Box<dyn Fn(Value) -> AttributeResult<Value> + Send + Sync>;

/// Registry of conversion functions keyed by declared kind.
///
/// Owned by a `DocumentSchema`; extensible through `register`. Lookup is by
/// exact declared kind, not by any capability match.
pub struct ConverterRegistry {
    converters: BTreeMap<FieldKind, Converter>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("kinds", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConverterRegistry {
    /// Creates a registry with no converters at all.
    pub fn empty() -> Self {
        Self {
            converters: BTreeMap::new(),
        }
    }

    /// Creates a registry with the built-in conversions.
    ///
    /// Built-ins: `Text -> Uuid`, parsing the identifier from its string
    /// form. This is what restores typed ids after a JSON round trip.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(FieldKind::Uuid, |value| match value {
            Value::Text(text) => Uuid::parse_str(&text)
                .map(Value::Uuid)
                .map_err(|err| AttributeError::ConversionFailed {
                    kind: FieldKind::Uuid,
                    message: format!("`{text}` is not a valid uuid: {err}"),
                }),
            other => Err(AttributeError::ConversionFailed {
                kind: FieldKind::Uuid,
                message: format!("cannot build a uuid from {}", other.kind()),
            }),
        });
        registry
    }

    /// Registers (or replaces) the converter for one target kind.
    pub fn register<F>(&mut self, kind: FieldKind, converter: F)
    where
        F: Fn(Value) -> AttributeResult<Value> + Send + Sync + 'static,
    {
        self.converters.insert(kind, Box::new(converter));
    }

    /// Applies the converter registered for `kind` to `value`.
    pub fn convert(&self, kind: FieldKind, value: Value) -> AttributeResult<Value> {
        let converter = self
            .converters
            .get(&kind)
            .ok_or_else(|| AttributeError::NoConverterExists {
                value: value.clone(),
                kind,
            })?;
        converter(value)
    }
}

/// One declared, typed field of a document class.
///
/// Instantiated once per declaration inside the class schema and shared by
/// all instances; carries no per-instance state.
#[derive(Debug, Clone, Copy)]
pub struct Attribute {
    name: &'static str,
    kind: FieldKind,
}

impl Attribute {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Coerces `value` into the declared kind.
    ///
    /// Identity when the value already is of the declared kind; otherwise
    /// delegates to the registry converter for that kind.
    pub fn typecast(&self, value: Value, registry: &ConverterRegistry) -> AttributeResult<Value> {
        if value.kind() == self.kind {
            return Ok(value);
        }
        self.convert(value, registry)
    }

    /// Converts `value` through the registry, enforcing the output kind.
    pub fn convert(&self, value: Value, registry: &ConverterRegistry) -> AttributeResult<Value> {
        let converted = registry.convert(self.kind, value)?;
        if converted.kind() != self.kind {
            return Err(AttributeError::ConversionFailed {
                kind: self.kind,
                message: format!("converter produced a {} value", converted.kind()),
            });
        }
        Ok(converted)
    }

    /// Constructs a fresh default value for this field.
    pub fn default_value(&self) -> Value {
        self.kind.default_value()
    }
}
