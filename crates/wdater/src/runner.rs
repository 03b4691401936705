//! Migration chain runner.
//!
//! [`Wdater::update`] brings a database from its stored schema version to
//! the last version reachable through the given migrations, running each
//! migration in its own transaction.

use std::collections::HashSet;

use tracing::warn;

use crate::config::WdaterConfig;
use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use crate::logger::Logger;
use crate::migration::{describe_migration, DatabaseInitializer, Migration};

/// Work executed inside a single transaction.
enum Step<'s> {
    Initialize(&'s dyn DatabaseInitializer),
    Migrate(&'s dyn Migration),
}

/// Handles database migrations.
#[derive(Debug)]
pub struct Wdater {
    config: WdaterConfig,
    logger: Logger,
    reserved_tables: Vec<String>,
}

impl Wdater {
    /// Creates an updater from `config`.
    #[must_use]
    pub fn new(config: WdaterConfig) -> Self {
        let logger = config.logger.child("wdater");
        let reserved_tables = config
            .storage
            .reserved_table()
            .map(str::to_string)
            .into_iter()
            .collect();
        Self {
            config,
            logger,
            reserved_tables,
        }
    }

    /// Returns the schema version currently stored.
    pub async fn current_version(&self) -> Result<Option<i32>> {
        self.config.storage.get_schema_version().await
    }

    /// Updates the database with `migrations` and returns the version it
    /// ends at.
    ///
    /// A database without a stored version is initialized instead: the
    /// highest `to_version` among `migrations` is recorded and the configured
    /// initializer runs. Otherwise migrations are chained from the stored
    /// version until none starts at the version reached.
    pub async fn update(&self, migrations: &[Box<dyn Migration>]) -> Result<i32> {
        validate(migrations)?;
        self.log_dependencies(migrations);
        self.logger.log("Process of database migration started");

        let version = match self.config.storage.get_schema_version().await? {
            None => {
                self.logger
                    .log("No schema version was found, initializing database...");
                self.initialize_database(migrations).await?
            }
            Some(from_version) => {
                self.logger.log(format!(
                    "Detected schema version is: {from_version}, running migrations..."
                ));
                let migrated = self.migrate(from_version, migrations).await?;
                if migrated == from_version {
                    self.logger.log("Schema version is unchanged");
                } else {
                    self.logger
                        .log("Saving the final version of schema using storage");
                    self.config.storage.set_schema_version(migrated).await?;
                }
                migrated
            }
        };

        self.logger.log("Completed!");
        Ok(version)
    }

    async fn initialize_database(&self, migrations: &[Box<dyn Migration>]) -> Result<i32> {
        let logger = self.logger.child("db-init");

        let max_migrations_version = migrations.iter().map(|m| m.to_version()).max();
        match max_migrations_version {
            None => logger.log(format!(
                "There is no migrations, so config.default_schema_version ({}) is used as the latest schema version",
                self.config.default_schema_version
            )),
            Some(version) => logger.log(format!(
                "The latest schema version was found in migrations: {version}"
            )),
        }
        let version = max_migrations_version.unwrap_or(self.config.default_schema_version);

        // Recorded first: a failed initializer is not re-derived on the next run
        logger.log(format!("Saving {version} schema version using storage"));
        self.config.storage.set_schema_version(version).await?;

        if self.config.initializer.is_empty() {
            logger.log("No initializer provided");
        } else {
            logger.log("Running custom initializer...");
        }
        self.execute(Step::Initialize(self.config.initializer.as_ref()), &logger)
            .await?;

        logger.log("Completed!");
        Ok(version)
    }

    /// Chains migrations from `from_version` and returns the version reached.
    async fn migrate(&self, from_version: i32, migrations: &[Box<dyn Migration>]) -> Result<i32> {
        let logger = self.logger.child("migrating");
        let mut current = from_version;
        let mut visited = HashSet::from([current]);

        loop {
            let Some(migration) = migrations.iter().find(|m| m.from_version() == current) else {
                logger.log(format!(
                    "No migrations was found, therefore the ending point of migration is {current}"
                ));
                return Ok(current);
            };

            let next = migration.to_version();
            if !visited.insert(next) {
                return Err(MigrateError::MigrationCycle { version: next });
            }

            let migration_logger = logger.child(describe_migration(migration.as_ref()));
            migration_logger.log("Migration found, running it...");
            self.execute(Step::Migrate(migration.as_ref()), &migration_logger)
                .await?;

            current = next;
            migration_logger.log(format!(
                "Migration completed, current schema version is {current}"
            ));
            logger.log("Searching for the next migration...");
        }
    }

    /// Runs `step` in a fresh transaction, committing on success and rolling
    /// back on error or when the step asked for it.
    async fn execute(&self, step: Step<'_>, logger: &Logger) -> Result<()> {
        let database = self.config.database.as_ref();
        let mut tx = database.begin().await?;

        let mut ctx = MigrationContext::new(tx.as_mut(), database.dialect(), logger.clone())
            .with_reserved_tables(&self.reserved_tables);
        let (name, result) = match step {
            Step::Initialize(initializer) => (
                "DatabaseInitializer".to_string(),
                initializer.initialize(&mut ctx).await,
            ),
            Step::Migrate(migration) => (
                describe_migration(migration),
                migration.migrate(&mut ctx).await,
            ),
        };
        let rollback_requested = ctx.is_rollback_requested();
        drop(ctx);

        match result {
            Ok(()) if !rollback_requested => tx.commit().await,
            Ok(()) => {
                tx.rollback().await?;
                Err(MigrateError::RollbackRequested { migration: name })
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(step = %name, error = %rollback_err, "Failed to roll back transaction");
                }
                logger.log(format!("Failed, transaction rolled back: {err}"));
                Err(err)
            }
        }
    }

    fn log_dependencies(&self, migrations: &[Box<dyn Migration>]) {
        let logger = self.logger.child("dependencies");

        let database = self.config.database.as_ref();
        logger.log(format!(
            "• Database: {} ({})",
            database.name(),
            database.dialect().name()
        ));
        logger.log(format!(
            "• Migrations Storage: {}",
            self.config.storage.describe()
        ));
        let initializer = if self.config.initializer.is_empty() {
            "unspecified"
        } else {
            "specified"
        };
        logger.log(format!("• Initializer: {initializer}"));

        let described: Vec<String> = migrations
            .iter()
            .map(|m| describe_migration(m.as_ref()))
            .collect();
        logger.log(format!("• Migrations: [{}]", described.join(", ")));
    }
}

/// Rejects migrations that cannot make progress and reports shadowed ones.
///
/// When several migrations start at the same version, the first one wins.
pub fn validate(migrations: &[Box<dyn Migration>]) -> Result<()> {
    let mut seen = HashSet::new();

    for migration in migrations {
        let from_version = migration.from_version();
        if migration.to_version() == from_version {
            return Err(MigrateError::NonAdvancingMigration {
                name: migration.display_name().to_string(),
                version: from_version,
            });
        }
        if !seen.insert(from_version) {
            warn!(
                migration = %describe_migration(migration.as_ref()),
                "Another migration starts at the same version and takes precedence"
            );
        }
    }

    Ok(())
}
