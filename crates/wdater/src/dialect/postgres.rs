//! PostgreSQL dialect.

use crate::operations::ColumnDiff;
use crate::schema::{ColumnSchema, DefaultValue, SqlType, TableSchema};

use super::MigrationDialect;

/// PostgreSQL migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({len})"),
            SqlType::Char(len) => format!("CHAR({len})"),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal(p, s) => format!("DECIMAL({p}, {s})"),
            SqlType::Blob => "BYTEA".to_string(),
            SqlType::Json => "JSONB".to_string(),
            SqlType::Uuid => "UUID".to_string(),
        }
    }

    fn column_type(&self, column: &ColumnSchema) -> String {
        if !column.auto_increment {
            return self.type_name(&column.sql_type);
        }
        match column.sql_type {
            SqlType::BigInt => "BIGSERIAL".to_string(),
            SqlType::SmallInt => "SMALLSERIAL".to_string(),
            _ => "SERIAL".to_string(),
        }
    }

    fn auto_increment_keyword(&self) -> Option<&'static str> {
        None
    }

    fn default_sql(&self, column: &ColumnSchema) -> Option<String> {
        match column.default {
            DefaultValue::Bool(true) => Some("TRUE".to_string()),
            DefaultValue::Bool(false) => Some("FALSE".to_string()),
            _ => column.default.to_sql(),
        }
    }

    fn modify_column_statements(
        &self,
        table: &TableSchema,
        column: &ColumnSchema,
        diff: &ColumnDiff,
    ) -> Vec<String> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote_identifier(&table.name),
            self.quote_identifier(&column.name)
        );
        let mut sql = Vec::new();

        if diff.nullability {
            let action = if column.nullable {
                "DROP NOT NULL"
            } else {
                "SET NOT NULL"
            };
            sql.push(format!("{prefix} {action}"));
        }

        // Serial columns own their sequence default
        if diff.defaults && !column.auto_increment {
            match self.default_sql(column) {
                Some(default) => sql.push(format!("{prefix} SET DEFAULT {default}")),
                None => sql.push(format!("{prefix} DROP DEFAULT")),
            }
        }

        sql
    }
}
