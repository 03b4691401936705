//! SQLite driver backed by `sqlx`.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use tracing::debug;

use crate::database::{
    normalize_table_name, ColumnMetadata, Database, SchemaIntrospector, Transaction,
};
use crate::dialect::{MigrationDialect, SqliteDialect};
use crate::error::Result;
use crate::schema::TableSchema;
use crate::storage::{TableStorage, VersionStorage};

/// Schema every unqualified SQLite table lives in.
pub const SQLITE_DEFAULT_SCHEMA: &str = "main";

/// A SQLite database reached through a connection pool.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
    dialect: SqliteDialect,
    name: String,
}

impl SqliteDatabase {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            dialect: SqliteDialect::new(),
            name: "sqlite".to_string(),
        }
    }

    /// Connects to `url`, creating the database file if it is missing.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool).with_name(url))
    }

    /// Sets the name shown in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn dialect(&self) -> &dyn MigrationDialect {
        &self.dialect
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    fn table_storage(&self, table_name: &str) -> Arc<dyn VersionStorage> {
        Arc::new(TableStorage::new(self.pool.clone(), table_name))
    }
}

/// A transaction on a [`SqliteDatabase`].
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl SchemaIntrospector for SqliteTransaction {
    fn default_schema(&self) -> Option<&str> {
        Some(SQLITE_DEFAULT_SCHEMA)
    }

    async fn table_names(&mut self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(names)
    }

    async fn table_columns(
        &mut self,
        tables: &[TableSchema],
    ) -> Result<HashMap<String, Vec<ColumnMetadata>>> {
        let mut columns = HashMap::new();

        for table in tables {
            let normalized = normalize_table_name(&table.name, Some(SQLITE_DEFAULT_SCHEMA));
            let (schema, name) = normalized
                .rsplit_once('.')
                .unwrap_or((SQLITE_DEFAULT_SCHEMA, normalized));

            let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
                "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1, ?2)",
            )
            .bind(name)
            .bind(schema)
            .fetch_all(&mut *self.tx)
            .await?;

            if rows.is_empty() {
                debug!(table = %table.name, "Table not found while listing columns");
                continue;
            }

            let metadata = rows
                .into_iter()
                .map(|(name, sql_type, not_null, default, pk)| ColumnMetadata {
                    name,
                    // SQLite reports INTEGER PRIMARY KEY columns as nullable
                    nullable: not_null == 0 && pk == 0,
                    sql_type,
                    default,
                })
                .collect();
            columns.insert(normalized.to_string(), metadata);
        }

        Ok(columns)
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn exec_in_batch(&mut self, statements: &[String]) -> Result<()> {
        for sql in statements {
            debug!(sql = %sql, "Executing SQL");
            sqlx::query(sql).execute(&mut *self.tx).await?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let Self { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
