//! Document repository: the save/find protocol.
//!
//! # Responsibility
//! - Reconcile document identity, timestamps, serialized payload, and
//!   index-table synchronization under insert-vs-update semantics.
//! - Keep storage, codec, and clock behind injected collaborators.
//!
//! # Invariants
//! - Reserved fields never enter the serialized payload.
//! - Both timestamps of one save come from a single clock reading.
//! - Index rows mirror the live document, not the serialized payload.
//! - Writes across main and index tables are not transactional; a failed
//!   index write leaves the main write in place and surfaces the backend
//!   error unchanged.

use crate::model::attribute::AttributeError;
use crate::model::document::{Document, DocumentId, RESERVED_FIELDS};
use crate::model::index::IndexDescriptor;
use crate::model::value::Value;
use crate::repo::clock::{Clock, SystemClock};
use crate::serialize::{SerializeError, Serializer};
use crate::storage::{Filter, RowMap, Storage, StorageError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors raised by repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// The requested id (or the whole requested id set) matched no rows.
    RecordNotFound {
        table: &'static str,
        ids: Vec<DocumentId>,
    },
    /// An existing document was saved without an id.
    MissingId { table: &'static str },
    /// An indexed lookup was requested on a field no index mirrors.
    MissingIndex { table: &'static str, field: String },
    Attribute(AttributeError),
    Serialize(SerializeError),
    Storage(StorageError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordNotFound { table, ids } => {
                let ids = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "record not found in `{table}` for id(s) {ids}")
            }
            Self::MissingId { table } => {
                write!(f, "cannot update a `{table}` document without an id")
            }
            Self::MissingIndex { table, field } => {
                write!(f, "no index on `{table}` mirrors field `{field}`")
            }
            Self::Attribute(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Attribute(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AttributeError> for RepoError {
    fn from(value: AttributeError) -> Self {
        Self::Attribute(value)
    }
}

impl From<SerializeError> for RepoError {
    fn from(value: SerializeError) -> Self {
        Self::Serialize(value)
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Contract for batch lookups that match only part of the requested ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Any non-empty result succeeds; callers reconcile partial results.
    #[default]
    Lenient,
    /// A partial result fails, naming exactly the missing ids.
    Strict,
}

/// Mediates save/find between documents and a storage backend.
pub struct Repository<S: Storage, Z: Serializer, C: Clock = SystemClock> {
    storage: S,
    serializer: Z,
    clock: C,
    batch_mode: BatchMode,
}

impl<S: Storage, Z: Serializer> Repository<S, Z> {
    /// Creates a repository over the given backend and codec.
    pub fn new(storage: S, serializer: Z) -> Self {
        Self {
            storage,
            serializer,
            clock: SystemClock,
            batch_mode: BatchMode::Lenient,
        }
    }
}

impl<S: Storage, Z: Serializer, C: Clock> Repository<S, Z, C> {
    /// Replaces the time source.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Repository<S, Z, C2> {
        Repository {
            storage: self.storage,
            serializer: self.serializer,
            clock,
            batch_mode: self.batch_mode,
        }
    }

    /// Sets the partial-result contract for batch lookups.
    pub fn with_batch_mode(mut self, batch_mode: BatchMode) -> Self {
        self.batch_mode = batch_mode;
        self
    }

    /// Returns the underlying storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Persists one document, inserting or updating by its record state.
    ///
    /// Insert assigns the storage id and both timestamps onto the document
    /// and clears its new-record flag. Update rewrites the payload and
    /// `updated_at` only. Either path then synchronizes every index table
    /// from the live document.
    pub fn save<D: Document>(&self, document: &mut D) -> RepoResult<()> {
        let mut attributes = document.to_attributes();
        for reserved in RESERVED_FIELDS {
            attributes.remove(reserved);
        }
        let payload = self.serializer.generate(&attributes)?;
        let now = self.clock.now();
        let table = D::table_name();

        if document.new_record() {
            let mut row = RowMap::new();
            row.insert("attributes".to_string(), Value::Text(payload));
            row.insert("created_at".to_string(), Value::Integer(now));
            row.insert("updated_at".to_string(), Value::Integer(now));
            let id = self.storage.from(table).insert(&row)?;

            let fields = document.fields_mut();
            fields.set_id(id);
            fields.set_created_at(now);
            fields.set_updated_at(now);
            fields.set_new_record(false);

            for index in D::indexes() {
                let mut index_row = mirrored_row(document, index)?;
                index_row.insert("id".to_string(), Value::Integer(id));
                self.storage.from(index.table_name()).insert(&index_row)?;
            }
        } else {
            let id = document.id().ok_or(RepoError::MissingId { table })?;

            let mut row = RowMap::new();
            row.insert("attributes".to_string(), Value::Text(payload));
            row.insert("updated_at".to_string(), Value::Integer(now));
            self.storage
                .from(table)
                .update(&Filter::IdEquals(id), &row)?;
            document.fields_mut().set_updated_at(now);

            for index in D::indexes() {
                let index_row = mirrored_row(document, index)?;
                self.storage
                    .from(index.table_name())
                    .update(&Filter::IdEquals(id), &index_row)?;
            }
        }

        Ok(())
    }

    /// Loads one document by id.
    pub fn find<D: Document>(&self, id: DocumentId) -> RepoResult<D> {
        let table = D::table_name();
        let row = self
            .storage
            .from(table)
            .first(&Filter::IdEquals(id))?
            .ok_or_else(|| RepoError::RecordNotFound {
                table,
                ids: vec![id],
            })?;
        self.hydrate(row)
    }

    /// Loads documents for an id set, in storage result order.
    ///
    /// A completely empty result is `RecordNotFound` for the whole set;
    /// partial results follow the configured `BatchMode`.
    pub fn find_many<D: Document>(&self, ids: &[DocumentId]) -> RepoResult<Vec<D>> {
        let table = D::table_name();
        let rows = self
            .storage
            .from(table)
            .select(&Filter::IdIn(ids.to_vec()))?;
        if rows.is_empty() {
            return Err(RepoError::RecordNotFound {
                table,
                ids: ids.to_vec(),
            });
        }

        if self.batch_mode == BatchMode::Strict && rows.len() != ids.len() {
            let found: Vec<DocumentId> = rows
                .iter()
                .filter_map(|row| row.get("id").and_then(Value::as_integer))
                .collect();
            let missing: Vec<DocumentId> = ids
                .iter()
                .copied()
                .filter(|id| !found.contains(id))
                .collect();
            return Err(RepoError::RecordNotFound {
                table,
                ids: missing,
            });
        }

        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    /// Loads every document whose indexed `field` equals `value`.
    ///
    /// The lookup value is typecast through the field's attribute, so the
    /// string form of an identifier matches a stored identifier. An empty
    /// match is an empty vec, not an error.
    pub fn find_all_by<D: Document, V: Into<Value>>(
        &self,
        field: &str,
        value: V,
    ) -> RepoResult<Vec<D>> {
        let (index_table, value) = self.index_lookup::<D>(field, value.into())?;
        let hits = self
            .storage
            .from(&index_table)
            .select(&Filter::FieldEquals(field.to_string(), value))?;
        let ids: Vec<DocumentId> = hits
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_integer))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.find_many(&ids)
    }

    /// Loads the first document whose indexed `field` equals `value`.
    pub fn find_first_by<D: Document, V: Into<Value>>(
        &self,
        field: &str,
        value: V,
    ) -> RepoResult<Option<D>> {
        let (index_table, value) = self.index_lookup::<D>(field, value.into())?;
        let hit = self
            .storage
            .from(&index_table)
            .first(&Filter::FieldEquals(field.to_string(), value))?;
        match hit {
            Some(row) => {
                let id = row.get("id").and_then(Value::as_integer).ok_or_else(|| {
                    StorageError::InvalidRow(format!(
                        "index row in `{index_table}` is missing its id"
                    ))
                })?;
                Ok(Some(self.find(id)?))
            }
            None => Ok(None),
        }
    }

    fn index_lookup<D: Document>(
        &self,
        field: &str,
        value: Value,
    ) -> RepoResult<(String, Value)> {
        let schema = D::schema();
        let table = schema.table_name();
        let index = schema
            .index_covering(field)
            .ok_or_else(|| RepoError::MissingIndex {
                table,
                field: field.to_string(),
            })?;
        let attribute =
            schema
                .attribute(field)
                .ok_or_else(|| AttributeError::UnknownAttribute {
                    name: field.to_string(),
                })?;
        let value = attribute.typecast(value, schema.converters())?;
        Ok((index.table_name().to_string(), value))
    }

    fn hydrate<D: Document>(&self, row: RowMap) -> RepoResult<D> {
        let table = D::table_name();
        let blob = row
            .get("attributes")
            .and_then(Value::as_text)
            .ok_or_else(|| {
                StorageError::InvalidRow(format!(
                    "`{table}` row is missing its attributes payload"
                ))
            })?;
        let mut attributes = self.serializer.parse(blob)?;
        for reserved in RESERVED_FIELDS {
            if let Some(value) = row.get(reserved) {
                attributes.insert(reserved.to_string(), value.clone());
            }
        }

        let mut document = D::from_attributes(attributes)?;
        document.fields_mut().set_new_record(false);
        Ok(document)
    }
}

fn mirrored_row<D: Document>(document: &D, index: &IndexDescriptor) -> RepoResult<RowMap> {
    let mut row = RowMap::new();
    for field in index.fields() {
        let value = document.fields().value_or_default(field)?;
        row.insert(field.to_string(), value);
    }
    Ok(row)
}
