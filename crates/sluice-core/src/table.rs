//! Table and column metadata.
//!
//! These types mirror what the schema-introspection cache produces. The
//! engine only reads them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default schema used when a table name is not qualified.
pub const DEFAULT_SCHEMA: &str = "public";

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parse `schema.table` or a bare `table` (which lands in `public`).
    pub fn parse(name: &str) -> Self {
        match name.split_once('.') {
            Some((schema, table)) => Self::new(schema, table),
            None => Self::new(DEFAULT_SCHEMA, name),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Target of a foreign key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub schema: String,
    pub table: String,
    pub column: String,
}

/// A single column as reported by the schema cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Postgres type as rendered by `format_type` (e.g. `integer`,
    /// `timestamp with time zone`, `text[]`).
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_target: Option<ForeignKeyRef>,
}

impl ColumnSpec {
    /// A nullable, non-key column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            is_primary_key: false,
            foreign_target: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn references(mut self, target: ForeignKeyRef) -> Self {
        self.foreign_target = Some(target);
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_target.is_some()
    }
}

fn default_nullable() -> bool {
    true
}

/// Table reference plus its column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    #[serde(flatten)]
    pub table: TableRef,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl TableMeta {
    pub fn new(table: TableRef, columns: Vec<ColumnSpec>) -> Self {
        Self { table, columns }
    }

    /// Metadata with no known columns. Column existence checks and typed
    /// casts are skipped for such tables.
    pub fn untyped(table: TableRef) -> Self {
        Self {
            table,
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether `name` is a column of this table. Always true for untyped
    /// metadata.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.is_empty() || self.column(name).is_some()
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_table_ref() {
        assert_eq!(TableRef::parse("public.posts"), TableRef::new("public", "posts"));
        assert_eq!(TableRef::parse("posts"), TableRef::new("public", "posts"));
        assert_eq!(TableRef::new("app", "users").to_string(), "app.users");
    }

    #[test]
    fn untyped_table_accepts_any_column() {
        let meta = TableMeta::untyped(TableRef::parse("posts"));
        assert!(meta.has_column("anything"));
        assert!(meta.primary_key().is_empty());
    }

    #[test]
    fn typed_table_lookups() {
        let meta = TableMeta::new(
            TableRef::parse("posts"),
            vec![
                ColumnSpec::new("id", "bigint").primary_key(),
                ColumnSpec::new("author_id", "uuid").references(ForeignKeyRef {
                    schema: "public".into(),
                    table: "users".into(),
                    column: "id".into(),
                }),
            ],
        );
        assert!(meta.has_column("id"));
        assert!(!meta.has_column("title"));
        assert_eq!(meta.primary_key(), vec!["id"]);
        assert!(meta.column("author_id").unwrap().is_foreign_key());
    }
}
