//! Error types for the update system.

/// Errors that can occur while updating a database schema.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// New and obsolete entities were found side by side, so the intent
    /// (rename, replace, drop) cannot be inferred safely.
    #[error("Ambiguity occurred while migrating {scope}, cannot make auto migration for current state")]
    CannotAutoMigrate {
        /// Where the ambiguity was detected (`"tables"` or `"table 'name'"`).
        scope: String,
    },

    /// A migration would leave the schema version unchanged.
    #[error("Migration '{name}' does not advance the schema version ({version} -> {version})")]
    NonAdvancingMigration {
        /// Display name of the offending migration.
        name: String,
        /// The version it both starts from and ends at.
        version: i32,
    },

    /// The migration chain came back to a version it already passed.
    #[error("Migration chain revisits schema version {version}")]
    MigrationCycle {
        /// The version reached twice.
        version: i32,
    },

    /// A migration asked for its transaction to be rolled back.
    #[error("Migration '{migration}' requested a rollback")]
    RollbackRequested {
        /// Display name of the migration.
        migration: String,
    },

    /// Database error during statement execution or introspection.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading schema files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid schema or database state.
    #[error("Invalid migration state: {0}")]
    InvalidState(String),
}

impl MigrateError {
    /// Creates a [`MigrateError::CannotAutoMigrate`] for the given scope.
    #[must_use]
    pub fn cannot_auto_migrate(scope: impl Into<String>) -> Self {
        Self::CannotAutoMigrate {
            scope: scope.into(),
        }
    }

    /// Returns whether this error is an auto-migration ambiguity.
    #[must_use]
    pub fn is_ambiguity(&self) -> bool {
        matches!(self, Self::CannotAutoMigrate { .. })
    }
}

/// Result type for update operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
