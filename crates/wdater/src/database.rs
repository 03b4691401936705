//! Database abstractions.
//!
//! These traits are the seam between the update logic and a concrete
//! database driver: a [`Database`] opens [`Transaction`]s, and every
//! transaction can execute statement batches and report the schema it sees
//! through [`SchemaIntrospector`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dialect::MigrationDialect;
use crate::error::Result;
use crate::schema::TableSchema;
use crate::storage::VersionStorage;

/// What the database reports about an existing column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Declared type, as reported by the database.
    pub sql_type: String,
    /// Default expression, as reported by the database.
    pub default: Option<String>,
}

impl ColumnMetadata {
    /// Creates metadata for a column with no declared type or default.
    #[must_use]
    pub fn new(name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            nullable,
            sql_type: String::new(),
            default: None,
        }
    }
}

/// Strips the `"<schema>."` prefix from a table name.
#[must_use]
pub fn normalize_table_name<'a>(name: &'a str, default_schema: Option<&str>) -> &'a str {
    default_schema
        .and_then(|schema| name.strip_prefix(schema))
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(name)
}

/// Reads the actual structure of a database.
///
/// Implementations must observe the statements already executed in the
/// same transaction.
#[async_trait]
pub trait SchemaIntrospector: Send {
    /// The schema unqualified names resolve to, if the database has one.
    fn default_schema(&self) -> Option<&str>;

    /// Lists the user tables currently present.
    async fn table_names(&mut self) -> Result<Vec<String>>;

    /// Lists the columns of each of `tables` that currently exists, keyed by
    /// table name normalized with [`normalize_table_name`].
    async fn table_columns(
        &mut self,
        tables: &[TableSchema],
    ) -> Result<HashMap<String, Vec<ColumnMetadata>>>;
}

/// An open database transaction.
///
/// Dropping a transaction without committing it rolls it back.
#[async_trait]
pub trait Transaction: SchemaIntrospector {
    /// Executes `statements` in order within this transaction.
    async fn exec_in_batch(&mut self, statements: &[String]) -> Result<()>;

    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rolls back the transaction.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// A database that schema updates run against.
#[async_trait]
pub trait Database: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> String;

    /// The dialect used to generate statements for this database.
    fn dialect(&self) -> &dyn MigrationDialect;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Returns the default one-row table storage for schema versions.
    fn table_storage(&self, table_name: &str) -> Arc<dyn VersionStorage>;
}
