//! Document-to-relational persistence core.
//!
//! Maps typed domain objects to storage rows: non-reserved attributes are
//! serialized into an opaque payload column, while index tables mirror
//! selected fields for lookup support. The [`Repository`] owns the
//! save/find protocol; [`Document`] is the capability a domain type
//! implements to take part in it.

pub mod logging;
pub mod model;
pub mod repo;
pub mod serialize;
pub mod storage;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attribute::{Attribute, AttributeError, AttributeResult, ConverterRegistry};
pub use model::document::{
    AttributeMap, Document, DocumentId, DocumentSchema, FieldSet, SchemaBuilder, SchemaError,
    RESERVED_FIELDS,
};
pub use model::index::IndexDescriptor;
pub use model::value::{FieldKind, Value};
pub use repo::clock::{Clock, FixedClock, SystemClock};
pub use repo::repository::{BatchMode, RepoError, RepoResult, Repository};
pub use serialize::{JsonSerializer, SerializeError, SerializeResult, Serializer};
pub use storage::{
    Dataset, Filter, MemoryStorage, RowMap, SqliteStorage, Storage, StorageError, StorageResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
