//! Schema version storage.
//!
//! The stored version is a single optional integer: absent means the
//! database was never initialized, present means the last version an update
//! successfully reached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tokio::sync::{Mutex, OnceCell};

use crate::dialect::{MigrationDialect, SqliteDialect};
use crate::error::{MigrateError, Result};

/// Default name of the version table.
pub const DEFAULT_TABLE_NAME: &str = "migrations";

/// Persists the current schema version.
#[async_trait]
pub trait VersionStorage: Send + Sync {
    /// Retrieves the current schema version, or `None` if it was never set.
    async fn get_schema_version(&self) -> Result<Option<i32>>;

    /// Overwrites the schema version.
    async fn set_schema_version(&self, version: i32) -> Result<()>;

    /// Table this storage keeps in the migrated database, if any.
    ///
    /// Auto migrations never treat it as obsolete.
    fn reserved_table(&self) -> Option<&str> {
        None
    }

    /// Short description used in logs.
    fn describe(&self) -> String {
        "custom implementation".to_string()
    }
}

/// Stores the schema version in a one-row SQLite table.
#[derive(Debug)]
pub struct TableStorage {
    pool: SqlitePool,
    table_name: String,
    quoted_name: String,
    created: OnceCell<()>,
    #[cfg(test)]
    creations: std::sync::atomic::AtomicUsize,
}

impl TableStorage {
    /// Creates a storage backed by `table_name`.
    ///
    /// The table is created on first use.
    pub fn new(pool: SqlitePool, table_name: impl Into<String>) -> Self {
        let table_name = table_name.into();
        let quoted_name = SqliteDialect::new().quote_identifier(&table_name);
        Self {
            pool,
            table_name,
            quoted_name,
            created: OnceCell::new(),
            #[cfg(test)]
            creations: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Ensures the version table exists. Runs at most once per storage;
    /// concurrent callers wait for the first attempt.
    pub async fn ensure_table(&self) -> Result<()> {
        self.created
            .get_or_try_init(|| async {
                #[cfg(test)]
                self.creations
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                sqlx::query(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (\
                     \"version\" INTEGER NULL DEFAULT NULL, \
                     \"updated_at\" TEXT NULL)",
                    self.quoted_name
                ))
                .execute(&self.pool)
                .await?;
                Ok::<(), MigrateError>(())
            })
            .await?;
        Ok(())
    }

    /// Returns when the version was last written.
    pub async fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        self.ensure_table().await?;
        let updated_at: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(&format!(
            "SELECT \"updated_at\" FROM {} LIMIT 1",
            self.quoted_name
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated_at.flatten())
    }
}

#[async_trait]
impl VersionStorage for TableStorage {
    async fn get_schema_version(&self) -> Result<Option<i32>> {
        self.ensure_table().await?;
        let version: Option<Option<i64>> = sqlx::query_scalar(&format!(
            "SELECT \"version\" FROM {} LIMIT 1",
            self.quoted_name
        ))
        .fetch_optional(&self.pool)
        .await?;

        version
            .flatten()
            .map(|v| {
                i32::try_from(v).map_err(|_| {
                    MigrateError::InvalidState(format!("Stored schema version {v} is out of range"))
                })
            })
            .transpose()
    }

    async fn set_schema_version(&self, version: i32) -> Result<()> {
        self.ensure_table().await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {}", self.quoted_name))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "INSERT INTO {} (\"version\", \"updated_at\") VALUES (?, ?)",
            self.quoted_name
        ))
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    fn reserved_table(&self) -> Option<&str> {
        Some(&self.table_name)
    }

    fn describe(&self) -> String {
        format!("default implementation, table '{}'", self.table_name)
    }
}

/// Keeps the schema version in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    version: Mutex<Option<i32>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage already holding `version`.
    #[must_use]
    pub fn with_version(version: i32) -> Self {
        Self {
            version: Mutex::new(Some(version)),
        }
    }
}

#[async_trait]
impl VersionStorage for MemoryStorage {
    async fn get_schema_version(&self) -> Result<Option<i32>> {
        Ok(*self.version.lock().await)
    }

    async fn set_schema_version(&self, version: i32) -> Result<()> {
        *self.version.lock().await = Some(version);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    #[tokio::test]
    async fn test_table_storage_starts_unset() {
        let storage = TableStorage::new(create_test_pool().await, DEFAULT_TABLE_NAME);
        assert_eq!(storage.get_schema_version().await.unwrap(), None);
        assert_eq!(storage.last_updated().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_table_storage_overwrites_single_row() {
        let pool = create_test_pool().await;
        let storage = TableStorage::new(pool.clone(), DEFAULT_TABLE_NAME);

        storage.set_schema_version(1).await.unwrap();
        storage.set_schema_version(7).await.unwrap();

        assert_eq!(storage.get_schema_version().await.unwrap(), Some(7));
        assert!(storage.last_updated().await.unwrap().is_some());

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM \"migrations\"")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_table_storage_ensure_table_is_idempotent() {
        let storage = TableStorage::new(create_test_pool().await, "schema_version");
        storage.ensure_table().await.unwrap();
        storage.ensure_table().await.unwrap();

        assert_eq!(storage.table_name(), "schema_version");
        assert_eq!(storage.reserved_table(), Some("schema_version"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_table_storage_concurrent_first_use_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("db.sqlite3").display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .unwrap();
        let storage = TableStorage::new(pool, DEFAULT_TABLE_NAME);

        let (a, b, c, d, e) = tokio::join!(
            storage.get_schema_version(),
            storage.get_schema_version(),
            storage.ensure_table(),
            storage.get_schema_version(),
            storage.ensure_table(),
        );
        assert_eq!(a.unwrap(), None);
        assert_eq!(b.unwrap(), None);
        c.unwrap();
        assert_eq!(d.unwrap(), None);
        e.unwrap();

        assert!(storage.created.initialized());
        assert_eq!(
            storage.creations.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_table_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("db.sqlite3").display());

        {
            let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
            let storage = TableStorage::new(pool.clone(), DEFAULT_TABLE_NAME);
            storage.set_schema_version(3).await.unwrap();
            pool.close().await;
        }

        let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
        let storage = TableStorage::new(pool, DEFAULT_TABLE_NAME);
        assert_eq!(storage.get_schema_version().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_schema_version().await.unwrap(), None);

        storage.set_schema_version(2).await.unwrap();
        assert_eq!(storage.get_schema_version().await.unwrap(), Some(2));
        assert_eq!(storage.reserved_table(), None);

        let preset = MemoryStorage::with_version(5);
        assert_eq!(preset.get_schema_version().await.unwrap(), Some(5));
    }
}
