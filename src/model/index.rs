//! Index descriptors for secondary lookup tables.
//!
//! # Responsibility
//! - Associate an index table name with the document fields it mirrors.
//!
//! # Invariants
//! - The document id is always the implicit join key; it is never listed
//!   among the mirrored fields.

/// Description of one secondary table mirroring a subset of fields.
///
/// Derived entirely from the document class declaration; has no lifecycle
/// of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    table_name: String,
    fields: Vec<&'static str>,
}

impl IndexDescriptor {
    /// Creates a descriptor with an explicit table name.
    pub fn new(table_name: impl Into<String>, fields: Vec<&'static str>) -> Self {
        Self {
            table_name: table_name.into(),
            fields,
        }
    }

    /// Creates a descriptor named after the table and mirrored fields,
    /// e.g. `index_users_on_name` or `index_users_on_name_and_age`.
    pub fn for_fields(document_table: &str, fields: Vec<&'static str>) -> Self {
        let table_name = format!("index_{document_table}_on_{}", fields.join("_and_"));
        Self { table_name, fields }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    /// Returns whether this index mirrors the given field.
    pub fn covers(&self, field: &str) -> bool {
        self.fields.iter().any(|name| *name == field)
    }
}

#[cfg(test)]
mod tests {
    use super::IndexDescriptor;

    #[test]
    fn derived_name_follows_table_and_fields() {
        let single = IndexDescriptor::for_fields("users", vec!["name"]);
        assert_eq!(single.table_name(), "index_users_on_name");

        let compound = IndexDescriptor::for_fields("users", vec!["name", "age"]);
        assert_eq!(compound.table_name(), "index_users_on_name_and_age");
    }

    #[test]
    fn covers_matches_mirrored_fields_only() {
        let index = IndexDescriptor::for_fields("users", vec!["name"]);
        assert!(index.covers("name"));
        assert!(!index.covers("age"));
        assert!(!index.covers("id"));
    }
}
