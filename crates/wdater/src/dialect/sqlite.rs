//! SQLite dialect.
//!
//! SQLite has limited ALTER TABLE support: it can add and drop columns but
//! cannot change a column's nullability or default. Those changes use the
//! "table recreation" strategy: create a new table, copy data, drop the old
//! table, rename the new table.

use crate::operations::ColumnDiff;
use crate::schema::{ColumnSchema, SqlType, TableSchema};

use super::MigrationDialect;

/// Suffix of the scratch table used while recreating a table.
const RECREATE_SUFFIX: &str = "__wdater_recreate";

/// SQLite migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generates the statements recreating `table` with `column` replaced by
    /// (or appended as) its new definition.
    ///
    /// Data of every column of `table` is carried over. With `existing`
    /// unset, `column` is new and is left out of the copy, so every other
    /// column of `table` must already exist.
    fn recreate_table_sql(
        &self,
        table: &TableSchema,
        column: &ColumnSchema,
        diff: &ColumnDiff,
        existing: bool,
    ) -> Vec<String> {
        let mut columns = table.columns.clone();
        match columns
            .iter_mut()
            .find(|c| diff.matches_name(&c.name, &column.name))
        {
            Some(current) => *current = column.clone(),
            None => columns.push(column.clone()),
        }

        let scratch = TableSchema {
            name: format!("{}{}", table.name, RECREATE_SUFFIX),
            columns,
        };
        let column_list = scratch
            .columns
            .iter()
            .filter(|c| existing || c.name != column.name)
            .map(|c| self.quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = self.drop_table_statements(&scratch.name);
        sql.extend(self.create_table_statements(&scratch));
        sql.push(format!(
            "INSERT INTO {} ({column_list}) SELECT {column_list} FROM {}",
            self.quote_identifier(&scratch.name),
            self.quote_identifier(&table.name)
        ));
        sql.extend(self.drop_table_statements(&table.name));
        sql.push(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(&scratch.name),
            self.quote_identifier(table.base_name())
        ));
        sql
    }

    /// Generates the unique index backing a column added with `UNIQUE`.
    ///
    /// SQLite wants the schema on the index name, not on the table.
    fn unique_index_sql(&self, table: &TableSchema, column: &ColumnSchema) -> String {
        let base = table.base_name();
        let index = match table.name.rsplit_once('.') {
            Some((schema, _)) => format!("{schema}.{base}_{}_key", column.name),
            None => format!("{base}_{}_key", column.name),
        };
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
            self.quote_identifier(&index),
            self.quote_identifier(base),
            self.quote_identifier(&column.name)
        )
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            // INTEGER PRIMARY KEY is the rowid alias, keep every integer as INTEGER
            SqlType::Integer | SqlType::BigInt | SqlType::SmallInt | SqlType::Boolean => {
                "INTEGER".to_string()
            }
            SqlType::Text
            | SqlType::Varchar(_)
            | SqlType::Char(_)
            | SqlType::Date
            | SqlType::Time
            | SqlType::Timestamp
            | SqlType::Json
            | SqlType::Uuid => "TEXT".to_string(),
            SqlType::Real | SqlType::Double => "REAL".to_string(),
            SqlType::Decimal(_, _) => "NUMERIC".to_string(),
            SqlType::Blob => "BLOB".to_string(),
        }
    }

    fn auto_increment_keyword(&self) -> Option<&'static str> {
        Some("AUTOINCREMENT")
    }

    fn recreates_tables(&self) -> bool {
        true
    }

    /// SQLite cannot add `PRIMARY KEY` or `UNIQUE` columns in place: primary
    /// keys go through table recreation, unique columns get a unique index.
    fn create_column_statements(&self, table: &TableSchema, column: &ColumnSchema) -> Vec<String> {
        if column.primary_key {
            return self.recreate_table_sql(table, column, &ColumnDiff::all(), false);
        }

        let plain = ColumnSchema {
            unique: false,
            ..column.clone()
        };
        let mut sql = vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(&table.name),
            self.column_definition(&plain)
        )];
        if column.unique {
            sql.push(self.unique_index_sql(table, column));
        }
        sql
    }

    fn modify_column_statements(
        &self,
        table: &TableSchema,
        column: &ColumnSchema,
        diff: &ColumnDiff,
    ) -> Vec<String> {
        if !diff.nullability && !diff.defaults {
            return Vec::new();
        }
        self.recreate_table_sql(table, column, diff, true)
    }
}
