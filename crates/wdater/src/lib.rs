//! Versioned, transactional database schema updates for Rust.
//!
//! `wdater` keeps a single schema version per database and brings it up to
//! date by chaining migrations, where:
//! - Every migration declares the version it starts from and the version it
//!   leads to
//! - Each migration runs in its own transaction and is rolled back on failure
//! - A database that was never versioned runs an initializer instead and is
//!   stamped with the latest known version
//!
//! # Architecture
//!
//! - **Runner** - [`Wdater`](runner::Wdater) walks the migration chain
//! - **Context** - [`MigrationContext`](context::MigrationContext) hands a
//!   migration its transaction and schema helpers
//! - **Storage** - [`VersionStorage`](storage::VersionStorage) persists the
//!   schema version
//! - **Database** - [`Database`](database::Database) and
//!   [`Transaction`](database::Transaction) abstract the driver; SQLite ships
//!   in [`sqlite`]
//! - **Dialect** - Database-specific SQL generation
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wdater::prelude::*;
//!
//! struct AddEmail;
//!
//! #[async_trait::async_trait]
//! impl Migration for AddEmail {
//!     fn from_version(&self) -> i32 {
//!         1
//!     }
//!
//!     async fn migrate(&self, ctx: &mut MigrationContext<'_>) -> Result<()> {
//!         let users = TableSchema::new("users")
//!             .column(ColumnSchema::new("id", SqlType::BigInt).primary_key())
//!             .column(ColumnSchema::new("email", SqlType::Varchar(255)));
//!         ctx.create_column(&users, &users.columns[1]).await
//!     }
//! }
//!
//! let database = Arc::new(SqliteDatabase::connect("sqlite:app.db").await?);
//! let wdater = Wdater::new(WdaterConfig::new(database));
//! let version = wdater.update(&[Box::new(AddEmail)]).await?;
//! ```

pub mod config;
pub mod context;
pub mod database;
pub mod dialect;
pub mod error;
pub mod logger;
pub mod migration;
pub mod operations;
pub mod runner;
pub mod schema;
pub mod sqlite;
pub mod storage;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{WdaterConfig, WdaterConfigBuilder};
    pub use crate::context::MigrationContext;
    pub use crate::database::{
        normalize_table_name, ColumnMetadata, Database, SchemaIntrospector, Transaction,
    };
    pub use crate::dialect::{MigrationDialect, PostgresDialect, SqliteDialect};
    pub use crate::error::{MigrateError, Result};
    pub use crate::logger::Logger;
    pub use crate::migration::{
        describe_migration, DatabaseInitializer, EmptyInitializer, Migration,
    };
    pub use crate::operations::{ColumnDiff, StructuralOperation};
    pub use crate::runner::Wdater;
    pub use crate::schema::{ColumnSchema, DefaultValue, SqlType, TableSchema};
    pub use crate::sqlite::SqliteDatabase;
    pub use crate::storage::{MemoryStorage, TableStorage, VersionStorage};
}
