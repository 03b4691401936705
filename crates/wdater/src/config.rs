//! Updater configuration.

use std::fmt;
use std::sync::Arc;

use crate::database::Database;
use crate::logger::Logger;
use crate::migration::{DatabaseInitializer, EmptyInitializer};
use crate::storage::{VersionStorage, DEFAULT_TABLE_NAME};

/// Configuration for [`Wdater`](crate::runner::Wdater).
#[derive(Clone)]
pub struct WdaterConfig {
    /// Database the updates run against.
    pub database: Arc<dyn Database>,
    /// Where the schema version is kept.
    pub storage: Arc<dyn VersionStorage>,
    /// Version recorded when a fresh database is initialized without any
    /// migration to derive it from.
    pub default_schema_version: i32,
    /// Runs once when the database has never been versioned.
    pub initializer: Arc<dyn DatabaseInitializer>,
    /// Root logger.
    pub logger: Logger,
}

impl WdaterConfig {
    /// Starts a configuration for `database`.
    pub fn builder(database: Arc<dyn Database>) -> WdaterConfigBuilder {
        WdaterConfigBuilder {
            database,
            storage: None,
            default_schema_version: 0,
            initializer: Arc::new(EmptyInitializer),
            logger: Logger::new(),
        }
    }

    /// Creates a configuration with table storage and no initializer.
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self::builder(database).build()
    }

    /// Returns a builder pre-filled with this configuration.
    #[must_use]
    pub fn to_builder(&self) -> WdaterConfigBuilder {
        WdaterConfigBuilder {
            database: Arc::clone(&self.database),
            storage: Some(Arc::clone(&self.storage)),
            default_schema_version: self.default_schema_version,
            initializer: Arc::clone(&self.initializer),
            logger: self.logger.clone(),
        }
    }
}

impl fmt::Debug for WdaterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WdaterConfig")
            .field("database", &self.database.name())
            .field("storage", &self.storage.describe())
            .field("default_schema_version", &self.default_schema_version)
            .field("initializer", &!self.initializer.is_empty())
            .finish()
    }
}

/// Builder for [`WdaterConfig`].
#[must_use]
pub struct WdaterConfigBuilder {
    database: Arc<dyn Database>,
    storage: Option<Arc<dyn VersionStorage>>,
    default_schema_version: i32,
    initializer: Arc<dyn DatabaseInitializer>,
    logger: Logger,
}

impl WdaterConfigBuilder {
    /// Uses a custom version storage.
    pub fn storage(mut self, storage: Arc<dyn VersionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Keeps the version in the database's one-row table `name`.
    pub fn table_storage(mut self, name: &str) -> Self {
        self.storage = Some(self.database.table_storage(name));
        self
    }

    /// Sets the version used when initializing without migrations.
    pub fn default_schema_version(mut self, version: i32) -> Self {
        self.default_schema_version = version;
        self
    }

    /// Sets the initializer run on a never-versioned database.
    pub fn initializer(mut self, initializer: impl DatabaseInitializer + 'static) -> Self {
        self.initializer = Arc::new(initializer);
        self
    }

    /// Sets the root logger.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Builds the configuration.
    ///
    /// Without an explicit storage, the version goes to the `migrations`
    /// table of the database.
    #[must_use]
    pub fn build(self) -> WdaterConfig {
        let storage = self
            .storage
            .unwrap_or_else(|| self.database.table_storage(DEFAULT_TABLE_NAME));
        WdaterConfig {
            database: self.database,
            storage,
            default_schema_version: self.default_schema_version,
            initializer: self.initializer,
            logger: self.logger,
        }
    }
}
