//! In-memory storage backend.
//!
//! # Responsibility
//! - Back the storage contract with plain maps for tests and embedders
//!   that need no durability.
//!
//! # Invariants
//! - Rows keep insertion order; `select` returns matches in that order.
//! - A table springs into existence on first insert; reads against an
//!   unknown table see no rows.

use crate::model::document::DocumentId;
use crate::model::value::Value;
use crate::storage::{Filter, RowMap, Storage, StorageError, StorageResult};
use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Default)]
struct MemoryTable {
    last_id: DocumentId,
    rows: Vec<RowMap>,
}

/// Map-backed storage for a single-threaded embedder.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RefCell<BTreeMap<String, MemoryTable>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all rows currently stored in `table`.
    ///
    /// Intended for tests asserting on exact row contents.
    pub fn rows(&self, table: &str) -> Vec<RowMap> {
        self.tables
            .borrow()
            .get(table)
            .map(|stored| stored.rows.clone())
            .unwrap_or_default()
    }
}

impl Storage for MemoryStorage {
    fn insert(&self, table: &str, row: &RowMap) -> StorageResult<DocumentId> {
        let mut tables = self.tables.borrow_mut();
        let stored = tables.entry(table.to_string()).or_default();

        let id = match row.get("id") {
            Some(value) => value.as_integer().ok_or_else(|| {
                StorageError::InvalidRow(format!(
                    "id column in `{table}` must be an integer, got {}",
                    value.kind()
                ))
            })?,
            None => stored.last_id + 1,
        };
        stored.last_id = stored.last_id.max(id);

        let mut row = row.clone();
        row.insert("id".to_string(), Value::Integer(id));
        stored.rows.push(row);
        Ok(id)
    }

    fn first(&self, table: &str, filter: &Filter) -> StorageResult<Option<RowMap>> {
        Ok(self
            .tables
            .borrow()
            .get(table)
            .and_then(|stored| stored.rows.iter().find(|row| matches(row, filter)).cloned()))
    }

    fn select(&self, table: &str, filter: &Filter) -> StorageResult<Vec<RowMap>> {
        Ok(self
            .tables
            .borrow()
            .get(table)
            .map(|stored| {
                stored
                    .rows
                    .iter()
                    .filter(|row| matches(row, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn update(&self, table: &str, filter: &Filter, changes: &RowMap) -> StorageResult<usize> {
        let mut tables = self.tables.borrow_mut();
        let Some(stored) = tables.get_mut(table) else {
            return Ok(0);
        };

        let mut changed = 0;
        for row in stored.rows.iter_mut().filter(|row| matches(row, filter)) {
            for (column, value) in changes {
                row.insert(column.clone(), value.clone());
            }
            changed += 1;
        }
        Ok(changed)
    }
}

fn matches(row: &RowMap, filter: &Filter) -> bool {
    match filter {
        Filter::IdEquals(id) => row.get("id") == Some(&Value::Integer(*id)),
        Filter::IdIn(ids) => row
            .get("id")
            .and_then(Value::as_integer)
            .is_some_and(|id| ids.contains(&id)),
        Filter::FieldEquals(name, value) => row.get(name.as_str()) == Some(value),
    }
}
