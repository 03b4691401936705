//! Automatic migrations derived from declared table definitions.
//!
//! [`AutoMigration`] compares the tables a program declares with what the
//! database actually contains and applies the difference:
//! - Tables that are declared but missing are created, tables that exist but
//!   are no longer declared are dropped
//! - Columns are added or dropped the same way, table by table
//! - Columns whose nullability drifted are modified in place
//!
//! Whenever new and obsolete entities show up side by side, the intent
//! cannot be told apart from a rename, so nothing is applied and
//! [`MigrateError::CannotAutoMigrate`] is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use wdater::prelude::*;
//! use wdater_auto::AutoMigration;
//!
//! let users = TableSchema::new("users")
//!     .column(ColumnSchema::new("id", SqlType::BigInt).primary_key().auto_increment())
//!     .column(ColumnSchema::new("name", SqlType::Text).not_null());
//!
//! let migrations: Vec<Box<dyn Migration>> = vec![Box::new(AutoMigration::new(vec![users], 1))];
//! wdater.update(&migrations).await?;
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use wdater::context::MigrationContext;
use wdater::database::ColumnMetadata;
use wdater::dialect::MigrationDialect;
use wdater::error::{MigrateError, Result};
use wdater::migration::{DatabaseInitializer, Migration};
use wdater::operations::{ColumnDiff, StructuralOperation};
use wdater::schema::{ColumnSchema, TableSchema};

pub use wdater::database::normalize_table_name;

/// Table-level difference between declared and actual tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TablePlan {
    /// Declared tables missing from the database, in declaration order.
    pub new_tables: Vec<TableSchema>,
    /// Tables present in the database but no longer declared, in the order
    /// the database listed them.
    pub obsolete_tables: Vec<String>,
}

impl TablePlan {
    /// Returns true if no table has to be created or dropped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_tables.is_empty() && self.obsolete_tables.is_empty()
    }
}

/// Column-level difference for a single table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnPlan {
    /// Declared columns missing from the table, in declaration order.
    pub missing: Vec<ColumnSchema>,
    /// Columns present in the table but no longer declared.
    pub obsolete: Vec<String>,
}

impl ColumnPlan {
    /// Returns true if no column has to be created or dropped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.obsolete.is_empty()
    }
}

/// Compares declared tables with the tables the database reports.
///
/// Names in `actual_names` and `ignored` are normalized against
/// `default_schema` before comparison. Ignored tables are never reported as
/// obsolete.
pub fn plan_tables(
    desired: &[TableSchema],
    actual_names: &[String],
    default_schema: Option<&str>,
    ignored: &[String],
) -> Result<TablePlan> {
    let actual: Vec<&str> = actual_names
        .iter()
        .map(|name| normalize_table_name(name, default_schema))
        .collect();
    let desired_names: HashSet<&str> = desired
        .iter()
        .map(|table| normalize_table_name(&table.name, default_schema))
        .collect();
    let ignored: HashSet<&str> = ignored
        .iter()
        .map(|name| normalize_table_name(name, default_schema))
        .collect();

    let new_tables: Vec<TableSchema> = desired
        .iter()
        .filter(|table| !actual.contains(&normalize_table_name(&table.name, default_schema)))
        .cloned()
        .collect();
    let obsolete_tables: Vec<String> = actual
        .iter()
        .filter(|name| !desired_names.contains(*name) && !ignored.contains(*name))
        .map(|name| (*name).to_string())
        .collect();

    if !new_tables.is_empty() && !obsolete_tables.is_empty() {
        return Err(MigrateError::cannot_auto_migrate("tables"));
    }

    Ok(TablePlan {
        new_tables,
        obsolete_tables,
    })
}

/// Compares the declared columns of `table` with the ones the database
/// reports.
pub fn plan_columns(table: &TableSchema, actual_columns: &[ColumnMetadata]) -> Result<ColumnPlan> {
    let missing: Vec<ColumnSchema> = table
        .columns
        .iter()
        .filter(|column| !actual_columns.iter().any(|actual| actual.name == column.name))
        .cloned()
        .collect();
    let obsolete: Vec<String> = actual_columns
        .iter()
        .filter(|actual| table.get_column(&actual.name).is_none())
        .map(|actual| actual.name.clone())
        .collect();

    if !missing.is_empty() && !obsolete.is_empty() {
        return Err(MigrateError::cannot_auto_migrate(format!(
            "table '{}'",
            table.name
        )));
    }

    Ok(ColumnPlan { missing, obsolete })
}

/// Returns a [`StructuralOperation::ModifyColumn`] for every declared column
/// whose nullability differs from the database.
///
/// Auto-increment columns are left alone: databases report them
/// inconsistently.
#[must_use]
pub fn plan_modifications(
    table: &TableSchema,
    actual_columns: &[ColumnMetadata],
) -> Vec<StructuralOperation> {
    table
        .columns
        .iter()
        .filter(|column| !column.auto_increment)
        .filter(|column| {
            actual_columns
                .iter()
                .find(|actual| actual.name == column.name)
                .is_some_and(|actual| actual.nullable != column.nullable)
        })
        .map(|column| StructuralOperation::ModifyColumn {
            table: table.name.clone(),
            column: column.clone(),
            nullability_changed: true,
        })
        .collect()
}

/// A migration that makes the database match a list of table definitions.
#[derive(Debug, Clone)]
pub struct AutoMigration {
    tables: Vec<TableSchema>,
    from_version: i32,
    to_version: i32,
    ignored: Vec<String>,
}

impl AutoMigration {
    /// Creates a migration from `from_version` to the next version that
    /// brings the database in line with `tables`.
    #[must_use]
    pub fn new(tables: Vec<TableSchema>, from_version: i32) -> Self {
        Self {
            tables,
            from_version,
            to_version: from_version + 1,
            ignored: Vec::new(),
        }
    }

    /// Sets the version reached once the migration completes.
    #[must_use]
    pub fn to_version(mut self, version: i32) -> Self {
        self.to_version = version;
        self
    }

    /// Never drops the table `name`, even though it is not declared.
    #[must_use]
    pub fn ignore_table(mut self, name: impl Into<String>) -> Self {
        self.ignored.push(name.into());
        self
    }

    /// The declared tables.
    #[must_use]
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Renders the statements `dialect` uses to apply `operation`.
    ///
    /// Column operations on a table that is not declared yield nothing.
    #[must_use]
    pub fn operation_statements(
        &self,
        dialect: &dyn MigrationDialect,
        operation: &StructuralOperation,
    ) -> Vec<String> {
        match operation {
            StructuralOperation::CreateTable { table } => dialect.create_table_statements(table),
            StructuralOperation::DropTable { name } => dialect.drop_table_statements(name),
            StructuralOperation::CreateColumn { table, column } => self
                .table(table)
                .map(|table| dialect.create_column_statements(table, column))
                .unwrap_or_default(),
            StructuralOperation::DropColumn { table, column_name } => {
                dialect.drop_column_statements(table, column_name)
            }
            StructuralOperation::ModifyColumn { table, column, .. } => self
                .table(table)
                .map(|table| dialect.modify_column_statements(table, column, &ColumnDiff::all()))
                .unwrap_or_default(),
        }
    }

    /// Applies the difference through `ctx` and returns the operations it
    /// executed, in order.
    pub async fn run(&self, ctx: &mut MigrationContext<'_>) -> Result<Vec<StructuralOperation>> {
        let mut applied = self.migrate_tables(ctx).await?;
        applied.extend(self.migrate_columns(ctx).await?);
        applied.extend(self.modify_columns(ctx).await?);
        Ok(applied)
    }

    async fn migrate_tables(
        &self,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<Vec<StructuralOperation>> {
        let logger = ctx.logger().child("tables");
        let default_schema = ctx.transaction().default_schema().map(str::to_string);
        let actual_names = ctx.transaction().table_names().await?;

        let mut ignored = ctx.reserved_tables().to_vec();
        ignored.extend(self.ignored.iter().cloned());

        let plan = match plan_tables(
            &self.tables,
            &actual_names,
            default_schema.as_deref(),
            &ignored,
        ) {
            Ok(plan) => plan,
            Err(err) => {
                ctx.rollback();
                return Err(err);
            }
        };

        let mut applied = Vec::new();

        if !plan.new_tables.is_empty() {
            let names: Vec<&str> = plan.new_tables.iter().map(|t| t.name.as_str()).collect();
            logger.log(format!("Creating new tables: [{}]", names.join(", ")));
            let operations: Vec<StructuralOperation> = plan
                .new_tables
                .into_iter()
                .map(|table| StructuralOperation::CreateTable { table })
                .collect();
            self.apply(ctx, &operations).await?;
            applied.extend(operations);
        }

        if !plan.obsolete_tables.is_empty() {
            logger.log(format!(
                "Dropping obsolete tables: [{}]",
                plan.obsolete_tables.join(", ")
            ));
            let operations: Vec<StructuralOperation> = plan
                .obsolete_tables
                .into_iter()
                .map(|name| StructuralOperation::DropTable { name })
                .collect();
            self.apply(ctx, &operations).await?;
            applied.extend(operations);
        }

        if applied.is_empty() {
            logger.log("Tables are up to date");
        }
        Ok(applied)
    }

    async fn migrate_columns(
        &self,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<Vec<StructuralOperation>> {
        let logger = ctx.logger().child("columns");
        let default_schema = ctx.transaction().default_schema().map(str::to_string);
        let columns = ctx.transaction().table_columns(&self.tables).await?;

        let mut applied = Vec::new();

        for table in &self.tables {
            let key = normalize_table_name(&table.name, default_schema.as_deref());
            let actual = columns.get(key).ok_or_else(|| {
                MigrateError::InvalidState(format!(
                    "Table '{}' was not found after tables were migrated",
                    table.name
                ))
            })?;

            let plan = match plan_columns(table, actual) {
                Ok(plan) => plan,
                Err(err) => {
                    ctx.rollback();
                    return Err(err);
                }
            };

            let operations: Vec<StructuralOperation> = if !plan.missing.is_empty() {
                let names: Vec<&str> = plan.missing.iter().map(|c| c.name.as_str()).collect();
                logger.log(format!(
                    "Creating columns of '{}': [{}]",
                    table.name,
                    names.join(", ")
                ));
                plan.missing
                    .into_iter()
                    .map(|column| StructuralOperation::CreateColumn {
                        table: table.name.clone(),
                        column,
                    })
                    .collect()
            } else if !plan.obsolete.is_empty() {
                logger.log(format!(
                    "Dropping columns of '{}': [{}]",
                    table.name,
                    plan.obsolete.join(", ")
                ));
                plan.obsolete
                    .into_iter()
                    .map(|column_name| StructuralOperation::DropColumn {
                        table: table.name.clone(),
                        column_name,
                    })
                    .collect()
            } else {
                continue;
            };

            self.apply(ctx, &operations).await?;
            applied.extend(operations);
        }

        Ok(applied)
    }

    async fn modify_columns(
        &self,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<Vec<StructuralOperation>> {
        let logger = ctx.logger().child("modifications");
        let default_schema = ctx.transaction().default_schema().map(str::to_string);
        let columns = ctx.transaction().table_columns(&self.tables).await?;

        let mut applied = Vec::new();

        for table in &self.tables {
            let key = normalize_table_name(&table.name, default_schema.as_deref());
            let Some(actual) = columns.get(key) else {
                continue;
            };

            let operations = plan_modifications(table, actual);
            if operations.is_empty() {
                continue;
            }
            let names: Vec<&str> = operations
                .iter()
                .filter_map(|op| match op {
                    StructuralOperation::ModifyColumn { column, .. } => Some(column.name.as_str()),
                    _ => None,
                })
                .collect();
            logger.log(format!(
                "Modifying columns of '{}': [{}]",
                table.name,
                names.join(", ")
            ));

            self.apply(ctx, &operations).await?;
            applied.extend(operations);
        }

        Ok(applied)
    }

    /// Executes `operations` as one batch.
    async fn apply(
        &self,
        ctx: &mut MigrationContext<'_>,
        operations: &[StructuralOperation],
    ) -> Result<()> {
        let dialect = ctx.dialect();
        let statements: Vec<String> = operations
            .iter()
            .flat_map(|op| self.operation_statements(dialect, op))
            .collect();
        ctx.exec_in_batch(&statements).await
    }
}

#[async_trait]
impl Migration for AutoMigration {
    fn from_version(&self) -> i32 {
        self.from_version
    }

    fn to_version(&self) -> i32 {
        self.to_version
    }

    fn display_name(&self) -> &str {
        "AutoMigration"
    }

    async fn migrate(&self, ctx: &mut MigrationContext<'_>) -> Result<()> {
        let applied = self.run(ctx).await?;
        ctx.logger()
            .log(format!("Applied {} structural operations", applied.len()));
        Ok(())
    }
}

/// Creates the declared tables on a database that was never versioned.
#[async_trait]
impl DatabaseInitializer for AutoMigration {
    async fn initialize(&self, ctx: &mut MigrationContext<'_>) -> Result<()> {
        self.run(ctx).await?;
        Ok(())
    }
}
