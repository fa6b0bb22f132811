//! SQLite storage backend.
//!
//! # Responsibility
//! - Open and configure SQLite connections for document storage.
//! - Create main and index tables from a document schema.
//! - Back the storage contract with generated single-table SQL.
//!
//! # Invariants
//! - Main tables carry exactly `id`, `attributes`, `created_at`,
//!   `updated_at`; declared fields live only in the payload blob and in
//!   index tables.
//! - Table and column names come from static schema declarations, never
//!   from runtime input.

use crate::model::document::{DocumentId, DocumentSchema};
use crate::model::value::{FieldKind, Value};
use crate::storage::{Filter, RowMap, Storage, StorageError, StorageResult};
use log::{error, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::time::{Duration, Instant};

/// rusqlite-backed storage.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens a database file.
    ///
    /// # Side effects
    /// - Emits `store_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with("file", || Connection::open(path))
    }

    /// Opens an in-memory database.
    ///
    /// # Side effects
    /// - Emits `store_open` logging events with duration and status.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::open_with("memory", Connection::open_in_memory)
    }

    fn open_with(
        mode: &str,
        open: impl FnOnce() -> rusqlite::Result<Connection>,
    ) -> StorageResult<Self> {
        let started_at = Instant::now();
        info!("event=store_open module=storage status=start mode={mode}");

        let result = open().and_then(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(conn)
        });
        match result {
            Ok(conn) => {
                info!(
                    "event=store_open module=storage status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(Self { conn })
            }
            Err(err) => {
                error!(
                    "event=store_open module=storage status=error mode={mode} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Creates the main table and every index table of one document class.
    ///
    /// Idempotent; existing tables are left untouched. There is no
    /// versioned migration story at this layer.
    pub fn ensure_schema(&self, schema: &DocumentSchema) -> StorageResult<()> {
        let table = schema.table_name();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                attributes TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );"
        ))?;

        for index in schema.indexes() {
            let index_table = index.table_name();
            let mut columns = vec!["id INTEGER NOT NULL".to_string()];
            let mut lookup_columns = Vec::new();
            for field in index.fields() {
                let kind = schema.attribute(field).map(|attr| attr.kind()).ok_or_else(|| {
                    StorageError::InvalidSchema(format!(
                        "index `{index_table}` references undeclared attribute `{field}`"
                    ))
                })?;
                columns.push(format!("\"{field}\" {} NOT NULL", sql_column_type(kind)));
                lookup_columns.push(format!("\"{field}\""));
            }
            lookup_columns.push("id".to_string());

            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{index_table}\" ({});
                 CREATE INDEX IF NOT EXISTS \"{index_table}_lookup\"
                     ON \"{index_table}\" ({});
                 CREATE INDEX IF NOT EXISTS \"{index_table}_doc\"
                     ON \"{index_table}\" (id);",
                columns.join(", "),
                lookup_columns.join(", "),
            ))?;
        }

        info!(
            "event=schema_ensure module=storage status=ok table={table} index_tables={}",
            schema.indexes().len()
        );
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn insert(&self, table: &str, row: &RowMap) -> StorageResult<DocumentId> {
        let columns = row
            .keys()
            .map(|column| format!("\"{column}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; row.len()].join(", ");
        let values: Vec<SqlValue> = row.values().map(to_sql_value).collect();

        self.conn.execute(
            &format!("INSERT INTO \"{table}\" ({columns}) VALUES ({placeholders});"),
            params_from_iter(values),
        )?;

        match row.get("id") {
            Some(value) => value.as_integer().ok_or_else(|| {
                StorageError::InvalidRow(format!(
                    "id column in `{table}` must be an integer, got {}",
                    value.kind()
                ))
            }),
            None => Ok(self.conn.last_insert_rowid()),
        }
    }

    fn first(&self, table: &str, filter: &Filter) -> StorageResult<Option<RowMap>> {
        let (clause, params) = filter_sql(filter);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT * FROM \"{table}\" WHERE {clause} ORDER BY id ASC LIMIT 1;"
        ))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params))?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_row(table, &columns, row)?));
        }
        Ok(None)
    }

    fn select(&self, table: &str, filter: &Filter) -> StorageResult<Vec<RowMap>> {
        let (clause, params) = filter_sql(filter);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT * FROM \"{table}\" WHERE {clause} ORDER BY id ASC;"
        ))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(parse_row(table, &columns, row)?);
        }
        Ok(result)
    }

    fn update(&self, table: &str, filter: &Filter, changes: &RowMap) -> StorageResult<usize> {
        let assignments = changes
            .keys()
            .map(|column| format!("\"{column}\" = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let (clause, filter_params) = filter_sql(filter);

        let mut params: Vec<SqlValue> = changes.values().map(to_sql_value).collect();
        params.extend(filter_params);

        let changed = self.conn.execute(
            &format!("UPDATE \"{table}\" SET {assignments} WHERE {clause};"),
            params_from_iter(params),
        )?;
        Ok(changed)
    }
}

fn sql_column_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Uuid | FieldKind::Text => "TEXT",
        FieldKind::Integer | FieldKind::Boolean => "INTEGER",
        FieldKind::Float => "REAL",
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Uuid(id) => SqlValue::Text(id.to_string()),
        Value::Text(text) => SqlValue::Text(text.clone()),
        Value::Integer(number) => SqlValue::Integer(*number),
        Value::Float(number) => SqlValue::Real(*number),
        Value::Boolean(flag) => SqlValue::Integer(i64::from(*flag)),
    }
}

fn filter_sql(filter: &Filter) -> (String, Vec<SqlValue>) {
    match filter {
        Filter::IdEquals(id) => ("id = ?".to_string(), vec![SqlValue::Integer(*id)]),
        Filter::IdIn(ids) => {
            if ids.is_empty() {
                return ("1 = 0".to_string(), Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            (
                format!("id IN ({placeholders})"),
                ids.iter().map(|id| SqlValue::Integer(*id)).collect(),
            )
        }
        Filter::FieldEquals(name, value) => {
            (format!("\"{name}\" = ?"), vec![to_sql_value(value)])
        }
    }
}

fn parse_row(
    table: &str,
    columns: &[String],
    row: &rusqlite::Row<'_>,
) -> StorageResult<RowMap> {
    let mut parsed = RowMap::new();
    for (position, column) in columns.iter().enumerate() {
        let value = match row.get::<_, SqlValue>(position)? {
            SqlValue::Null => continue,
            SqlValue::Integer(number) => Value::Integer(number),
            SqlValue::Real(number) => Value::Float(number),
            SqlValue::Text(text) => Value::Text(text),
            SqlValue::Blob(_) => {
                return Err(StorageError::InvalidRow(format!(
                    "unexpected blob in `{table}`.`{column}`"
                )));
            }
        };
        parsed.insert(column.clone(), value);
    }
    Ok(parsed)
}
