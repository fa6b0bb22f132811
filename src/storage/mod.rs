//! Storage contract and shipped backends.
//!
//! # Responsibility
//! - Define the table-scoped operations the repository consumes.
//! - Isolate backend query details behind one narrow trait.
//!
//! # Invariants
//! - Filters cover id and indexed-field lookups only; there is no general
//!   query surface at this layer.
//! - `select` returns rows in a backend-defined stable order.

use crate::model::document::DocumentId;
use crate::model::value::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = Result<T, StorageError>;

/// One storage row as a column-name to value mapping.
pub type RowMap = BTreeMap<String, Value>;

/// Errors surfaced by storage backends.
#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    InvalidRow(String),
    InvalidSchema(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidRow(message) => write!(f, "invalid stored row: {message}"),
            Self::InvalidSchema(message) => write!(f, "invalid schema: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidRow(_) => None,
            Self::InvalidSchema(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Row filter for the narrow lookup surface this layer supports.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    IdEquals(DocumentId),
    IdIn(Vec<DocumentId>),
    /// Equality on one mirrored index-table column.
    FieldEquals(String, Value),
}

/// Backend capability consumed by the repository.
///
/// `insert` assigns and returns a fresh id when the row carries none; a
/// row with an explicit `id` entry (index-table writes) is stored verbatim
/// and that id is echoed back.
pub trait Storage {
    fn insert(&self, table: &str, row: &RowMap) -> StorageResult<DocumentId>;
    fn first(&self, table: &str, filter: &Filter) -> StorageResult<Option<RowMap>>;
    fn select(&self, table: &str, filter: &Filter) -> StorageResult<Vec<RowMap>>;
    fn update(&self, table: &str, filter: &Filter, changes: &RowMap) -> StorageResult<usize>;

    /// Returns a handle scoped to one table.
    fn from(&self, table: &str) -> Dataset<'_, Self>
    where
        Self: Sized,
    {
        Dataset {
            storage: self,
            table: table.to_string(),
        }
    }
}

impl<S: Storage> Storage for &S {
    fn insert(&self, table: &str, row: &RowMap) -> StorageResult<DocumentId> {
        (**self).insert(table, row)
    }

    fn first(&self, table: &str, filter: &Filter) -> StorageResult<Option<RowMap>> {
        (**self).first(table, filter)
    }

    fn select(&self, table: &str, filter: &Filter) -> StorageResult<Vec<RowMap>> {
        (**self).select(table, filter)
    }

    fn update(&self, table: &str, filter: &Filter, changes: &RowMap) -> StorageResult<usize> {
        (**self).update(table, filter, changes)
    }
}

/// Table-scoped view over a storage backend.
pub struct Dataset<'a, S: Storage> {
    storage: &'a S,
    table: String,
}

impl<S: Storage> Dataset<'_, S> {
    pub fn insert(&self, row: &RowMap) -> StorageResult<DocumentId> {
        self.storage.insert(&self.table, row)
    }

    pub fn first(&self, filter: &Filter) -> StorageResult<Option<RowMap>> {
        self.storage.first(&self.table, filter)
    }

    pub fn select(&self, filter: &Filter) -> StorageResult<Vec<RowMap>> {
        self.storage.select(&self.table, filter)
    }

    pub fn update(&self, filter: &Filter, changes: &RowMap) -> StorageResult<usize> {
        self.storage.update(&self.table, filter, changes)
    }
}
