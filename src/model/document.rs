//! Document contract and per-class schema.
//!
//! # Responsibility
//! - Define the capability set a domain object needs to be persisted.
//! - Hold the class-level attribute registry consulted by generic get/set
//!   entry points (no reflection, no runtime code generation).
//!
//! # Invariants
//! - Every write into a `FieldSet` goes through attribute typecasting.
//! - Reading an unset field lazily constructs and caches the declared
//!   kind's default value on that instance.
//! - Reserved fields (`id`, `created_at`, `updated_at`) are managed by the
//!   repository and never typecast through the converter registry.

use crate::model::attribute::{
    Attribute, AttributeError, AttributeResult, ConverterRegistry,
};
use crate::model::index::IndexDescriptor;
use crate::model::value::{FieldKind, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned document identifier.
pub type DocumentId = i64;

/// Mapping of attribute names to current values.
pub type AttributeMap = BTreeMap<String, Value>;

/// Field names owned by the repository rather than the document class.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Errors detected while building a document schema.
#[derive(Debug)]
pub enum SchemaError {
    DuplicateAttribute { name: &'static str },
    ReservedAttribute { name: &'static str },
    UnknownIndexField { field: &'static str },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateAttribute { name } => {
                write!(f, "attribute `{name}` is declared twice")
            }
            Self::ReservedAttribute { name } => {
                write!(f, "attribute `{name}` collides with a reserved field")
            }
            Self::UnknownIndexField { field } => {
                write!(f, "index references undeclared attribute `{field}`")
            }
        }
    }
}

impl Error for SchemaError {}

/// Static description of one document class.
///
/// Built once per class (typically in a `Lazy` static) and shared by every
/// instance; owns the attribute registry, index descriptors, and the
/// converter registry used for typecasting.
#[derive(Debug)]
pub struct DocumentSchema {
    table_name: &'static str,
    attributes: BTreeMap<&'static str, Attribute>,
    indexes: Vec<IndexDescriptor>,
    converters: ConverterRegistry,
}

impl DocumentSchema {
    /// Starts a builder for the given main table name.
    pub fn builder(table_name: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            table_name,
            attributes: Vec::new(),
            index_fields: Vec::new(),
            converters: None,
        }
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    /// Looks up one declared attribute by field name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Iterates declared attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Returns the first index descriptor mirroring `field`, if any.
    pub fn index_covering(&self, field: &str) -> Option<&IndexDescriptor> {
        self.indexes.iter().find(|index| index.covers(field))
    }
}

/// Builder for `DocumentSchema`, validated at `build()` time.
pub struct SchemaBuilder {
    table_name: &'static str,
    attributes: Vec<Attribute>,
    index_fields: Vec<Vec<&'static str>>,
    converters: Option<ConverterRegistry>,
}

impl SchemaBuilder {
    /// Declares one typed attribute.
    pub fn attribute(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.attributes.push(Attribute::new(name, kind));
        self
    }

    /// Declares one index mirroring the given fields.
    ///
    /// The index table name is derived from the main table and field names,
    /// e.g. `index_users_on_name`.
    pub fn index<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        self.index_fields.push(fields.into_iter().collect());
        self
    }

    /// Replaces the default converter registry.
    pub fn converters(mut self, registry: ConverterRegistry) -> Self {
        self.converters = Some(registry);
        self
    }

    /// Validates the declarations and produces the schema.
    pub fn build(self) -> Result<DocumentSchema, SchemaError> {
        let mut attributes = BTreeMap::new();
        for attribute in self.attributes {
            let name = attribute.name();
            if RESERVED_FIELDS.contains(&name) {
                return Err(SchemaError::ReservedAttribute { name });
            }
            if attributes.insert(name, attribute).is_some() {
                return Err(SchemaError::DuplicateAttribute { name });
            }
        }

        let mut indexes = Vec::new();
        for fields in self.index_fields {
            for field in &fields {
                if !attributes.contains_key(field) {
                    return Err(SchemaError::UnknownIndexField { field });
                }
            }
            indexes.push(IndexDescriptor::for_fields(self.table_name, fields));
        }

        Ok(DocumentSchema {
            table_name: self.table_name,
            attributes,
            indexes,
            converters: self
                .converters
                .unwrap_or_else(ConverterRegistry::with_builtins),
        })
    }
}

/// Per-instance field state for one document.
///
/// Declared fields live in a name-keyed map; reserved fields and the
/// new-record flag are tracked separately so they never mix with the
/// serialized payload.
#[derive(Debug)]
pub struct FieldSet {
    schema: &'static DocumentSchema,
    values: BTreeMap<&'static str, Value>,
    id: Option<DocumentId>,
    created_at: Option<i64>,
    updated_at: Option<i64>,
    new_record: bool,
}

impl FieldSet {
    /// Creates the empty state of a fresh, unpersisted document.
    pub fn new(schema: &'static DocumentSchema) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
            id: None,
            created_at: None,
            updated_at: None,
            new_record: true,
        }
    }

    pub fn schema(&self) -> &'static DocumentSchema {
        self.schema
    }

    /// Writes one declared field, typecasting through its attribute.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> AttributeResult<()> {
        let attribute =
            self.schema
                .attribute(name)
                .ok_or_else(|| AttributeError::UnknownAttribute {
                    name: name.to_string(),
                })?;
        let cast = attribute.typecast(value.into(), self.schema.converters())?;
        self.values.insert(attribute.name(), cast);
        Ok(())
    }

    /// Reads one declared field, lazily caching its default when unset.
    pub fn get(&mut self, name: &str) -> AttributeResult<&Value> {
        let attribute =
            self.schema
                .attribute(name)
                .ok_or_else(|| AttributeError::UnknownAttribute {
                    name: name.to_string(),
                })?;
        Ok(self
            .values
            .entry(attribute.name())
            .or_insert_with(|| attribute.default_value()))
    }

    /// Reads one declared field without caching a default.
    pub fn value_or_default(&self, name: &str) -> AttributeResult<Value> {
        let attribute =
            self.schema
                .attribute(name)
                .ok_or_else(|| AttributeError::UnknownAttribute {
                    name: name.to_string(),
                })?;
        Ok(self
            .values
            .get(attribute.name())
            .cloned()
            .unwrap_or_else(|| attribute.default_value()))
    }

    /// Returns whether the field has an explicitly stored value.
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn id(&self) -> Option<DocumentId> {
        self.id
    }

    pub fn set_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }

    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    pub fn set_created_at(&mut self, epoch_ms: i64) {
        self.created_at = Some(epoch_ms);
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    pub fn set_updated_at(&mut self, epoch_ms: i64) {
        self.updated_at = Some(epoch_ms);
    }

    pub fn new_record(&self) -> bool {
        self.new_record
    }

    pub fn set_new_record(&mut self, new_record: bool) {
        self.new_record = new_record;
    }

    /// Applies a full attribute mapping, reserved fields included.
    pub fn apply(&mut self, attributes: AttributeMap) -> AttributeResult<()> {
        for (name, value) in attributes {
            match name.as_str() {
                "id" => self.id = Some(reserved_integer("id", value)?),
                "created_at" => {
                    self.created_at = Some(reserved_integer("created_at", value)?);
                }
                "updated_at" => {
                    self.updated_at = Some(reserved_integer("updated_at", value)?);
                }
                _ => self.set(&name, value)?,
            }
        }
        Ok(())
    }

    /// Produces the full attribute mapping of this instance.
    ///
    /// Declared fields appear at their current or default value; reserved
    /// fields are included when assigned.
    pub fn to_attributes(&self) -> AttributeMap {
        let mut map = AttributeMap::new();
        for attribute in self.schema.attributes() {
            let value = self
                .values
                .get(attribute.name())
                .cloned()
                .unwrap_or_else(|| attribute.default_value());
            map.insert(attribute.name().to_string(), value);
        }
        if let Some(id) = self.id {
            map.insert("id".to_string(), Value::Integer(id));
        }
        if let Some(created_at) = self.created_at {
            map.insert("created_at".to_string(), Value::Integer(created_at));
        }
        if let Some(updated_at) = self.updated_at {
            map.insert("updated_at".to_string(), Value::Integer(updated_at));
        }
        map
    }
}

fn reserved_integer(name: &'static str, value: Value) -> AttributeResult<i64> {
    value
        .as_integer()
        .ok_or_else(|| AttributeError::InvalidReserved {
            name,
            message: format!("expected an integer, got {}", value.kind()),
        })
}

/// Capability set a domain object must satisfy to be persisted.
///
/// Concrete types supply the schema and field-set plumbing; everything the
/// repository needs is provided on top of those four methods.
pub trait Document: Sized {
    /// Class-level schema shared by all instances.
    fn schema() -> &'static DocumentSchema;
    /// Wraps restored field state into a concrete instance.
    fn from_fields(fields: FieldSet) -> Self;
    fn fields(&self) -> &FieldSet;
    fn fields_mut(&mut self) -> &mut FieldSet;

    /// Creates an empty, unpersisted instance.
    fn new() -> Self {
        Self::from_fields(FieldSet::new(Self::schema()))
    }

    /// Constructs an instance from a full attribute mapping.
    fn from_attributes(attributes: AttributeMap) -> AttributeResult<Self> {
        let mut fields = FieldSet::new(Self::schema());
        fields.apply(attributes)?;
        Ok(Self::from_fields(fields))
    }

    fn table_name() -> &'static str {
        Self::schema().table_name()
    }

    fn indexes() -> &'static [IndexDescriptor] {
        Self::schema().indexes()
    }

    fn to_attributes(&self) -> AttributeMap {
        self.fields().to_attributes()
    }

    fn id(&self) -> Option<DocumentId> {
        self.fields().id()
    }

    fn new_record(&self) -> bool {
        self.fields().new_record()
    }
}
