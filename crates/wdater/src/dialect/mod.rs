//! Database dialect implementations.
//!
//! Each dialect turns table and column definitions into the statements that
//! create, drop or modify them on that database system.

mod postgres;
mod sqlite;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::operations::ColumnDiff;
use crate::schema::{ColumnSchema, SqlType, TableSchema};

/// Trait for database-specific DDL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Returns the keyword appended to auto-incrementing primary keys, if any.
    fn auto_increment_keyword(&self) -> Option<&'static str>;

    /// Generates statements that bring `column` of `table` in line with its
    /// definition, limited to the properties flagged in `diff`.
    fn modify_column_statements(
        &self,
        table: &TableSchema,
        column: &ColumnSchema,
        diff: &ColumnDiff,
    ) -> Vec<String>;

    /// Returns the type used in a column definition.
    fn column_type(&self, column: &ColumnSchema) -> String {
        self.type_name(&column.sql_type)
    }

    /// Renders the default value of `column`, if it has one.
    fn default_sql(&self, column: &ColumnSchema) -> Option<String> {
        column.default.to_sql()
    }

    /// Returns true if column changes rewrite the whole table, so every live
    /// column must be part of the table definition handed to the dialect.
    fn recreates_tables(&self) -> bool {
        false
    }

    /// Quote an identifier, quoting each part of a schema-qualified name.
    fn quote_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Generates column definition SQL with the primary key inlined.
    fn column_definition(&self, column: &ColumnSchema) -> String {
        self.column_definition_with(column, true)
    }

    /// Generates column definition SQL.
    ///
    /// With `inline_primary_key` unset, `PRIMARY KEY` is left to a table
    /// constraint (composite keys).
    fn column_definition_with(&self, column: &ColumnSchema, inline_primary_key: bool) -> String {
        let inline_pk = column.primary_key && inline_primary_key;
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.column_type(column),
        ];

        if inline_pk {
            parts.push("PRIMARY KEY".to_string());
            if column.auto_increment {
                if let Some(keyword) = self.auto_increment_keyword() {
                    parts.push(keyword.to_string());
                }
            }
        }

        if !column.nullable && !inline_pk {
            parts.push("NOT NULL".to_string());
        }

        if column.unique && !column.primary_key {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default_sql) = self.default_sql(column) {
            parts.push(format!("DEFAULT {}", default_sql));
        }

        parts.join(" ")
    }

    /// Generates the statements creating `table` with all of its columns.
    fn create_table_statements(&self, table: &TableSchema) -> Vec<String> {
        let primary_key: Vec<&str> = table.primary_key().collect();
        let composite = primary_key.len() > 1;

        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition_with(c, !composite))
            .collect();

        if composite {
            let quoted: Vec<String> = primary_key
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            definitions.push(format!("PRIMARY KEY ({})", quoted.join(", ")));
        }

        vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.quote_identifier(&table.name),
            definitions.join(",\n  ")
        )]
    }

    /// Generates the statements dropping a table.
    fn drop_table_statements(&self, name: &str) -> Vec<String> {
        vec![format!("DROP TABLE IF EXISTS {}", self.quote_identifier(name))]
    }

    /// Generates the statements adding `column` to `table`.
    fn create_column_statements(&self, table: &TableSchema, column: &ColumnSchema) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(&table.name),
            self.column_definition(column)
        )]
    }

    /// Generates the statements dropping a column from a table.
    fn drop_column_statements(&self, table: &str, column_name: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column_name)
        )]
    }
}
