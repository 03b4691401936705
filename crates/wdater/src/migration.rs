//! Migration steps and database initializers.

use async_trait::async_trait;

use crate::context::MigrationContext;
use crate::error::Result;

/// A versioned step taking the schema from [`from_version`] to
/// [`to_version`].
///
/// [`from_version`]: Migration::from_version
/// [`to_version`]: Migration::to_version
#[async_trait]
pub trait Migration: Send + Sync {
    /// The version this migration starts from.
    fn from_version(&self) -> i32;

    /// The version reached once this migration completes.
    fn to_version(&self) -> i32 {
        self.from_version() + 1
    }

    /// Name shown in logs.
    fn display_name(&self) -> &str {
        "Migration"
    }

    /// Performs the migration inside the transaction held by `ctx`.
    async fn migrate(&self, ctx: &mut MigrationContext<'_>) -> Result<()>;
}

/// Formats a migration as `Name{from -> to}`.
#[must_use]
pub fn describe_migration(migration: &dyn Migration) -> String {
    format!(
        "{}{{{} -> {}}}",
        migration.display_name(),
        migration.from_version(),
        migration.to_version()
    )
}

/// Sets up a database that has never been versioned.
///
/// Runs once, on the first update, instead of any migration.
#[async_trait]
pub trait DatabaseInitializer: Send + Sync {
    /// Initializes the database inside the transaction held by `ctx`.
    async fn initialize(&self, ctx: &mut MigrationContext<'_>) -> Result<()>;

    /// Returns true if this initializer does nothing.
    fn is_empty(&self) -> bool {
        false
    }
}

/// Initializer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyInitializer;

#[async_trait]
impl DatabaseInitializer for EmptyInitializer {
    async fn initialize(&self, _ctx: &mut MigrationContext<'_>) -> Result<()> {
        Ok(())
    }

    fn is_empty(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AddEmail;

    #[async_trait]
    impl Migration for AddEmail {
        fn from_version(&self) -> i32 {
            3
        }

        async fn migrate(&self, _ctx: &mut MigrationContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    struct Rebuild;

    #[async_trait]
    impl Migration for Rebuild {
        fn from_version(&self) -> i32 {
            1
        }

        fn to_version(&self) -> i32 {
            4
        }

        fn display_name(&self) -> &str {
            "Rebuild"
        }

        async fn migrate(&self, _ctx: &mut MigrationContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(AddEmail.to_version(), 4);
        assert_eq!(AddEmail.display_name(), "Migration");
        assert_eq!(describe_migration(&AddEmail), "Migration{3 -> 4}");
    }

    #[test]
    fn test_overrides() {
        assert_eq!(describe_migration(&Rebuild), "Rebuild{1 -> 4}");
    }

    #[test]
    fn test_empty_initializer() {
        assert!(EmptyInitializer.is_empty());
    }
}
