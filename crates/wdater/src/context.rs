//! Migration context.
//!
//! Every migration and initializer runs against a [`MigrationContext`]: the
//! transaction of the current step plus helpers for hand-written schema
//! changes.

use crate::database::{normalize_table_name, Transaction};
use crate::dialect::MigrationDialect;
use crate::error::{MigrateError, Result};
use crate::logger::Logger;
use crate::operations::ColumnDiff;
use crate::schema::{ColumnSchema, DefaultValue, TableSchema};

/// The transaction and tools available to a running migration.
pub struct MigrationContext<'a> {
    transaction: &'a mut dyn Transaction,
    dialect: &'a dyn MigrationDialect,
    logger: Logger,
    reserved_tables: &'a [String],
    rollback_requested: bool,
}

impl<'a> MigrationContext<'a> {
    /// Creates a context bound to `transaction`.
    pub fn new(
        transaction: &'a mut dyn Transaction,
        dialect: &'a dyn MigrationDialect,
        logger: Logger,
    ) -> Self {
        Self {
            transaction,
            dialect,
            logger,
            reserved_tables: &[],
            rollback_requested: false,
        }
    }

    /// Declares tables that belong to the update machinery itself.
    #[must_use]
    pub fn with_reserved_tables(mut self, tables: &'a [String]) -> Self {
        self.reserved_tables = tables;
        self
    }

    /// The transaction of the current step.
    pub fn transaction(&mut self) -> &mut dyn Transaction {
        &mut *self.transaction
    }

    /// The dialect statements are generated with.
    #[must_use]
    pub fn dialect(&self) -> &'a dyn MigrationDialect {
        self.dialect
    }

    /// The logger tagged for the current step.
    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Tables that must never be touched by schema diffs.
    #[must_use]
    pub fn reserved_tables(&self) -> &[String] {
        self.reserved_tables
    }

    /// Logs and executes `statements` as one batch.
    pub async fn exec_in_batch(&mut self, statements: &[String]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        for statement in statements {
            self.logger.sql(statement);
        }
        self.transaction.exec_in_batch(statements).await
    }

    /// Creates `table` with all of its columns.
    pub async fn create_table(&mut self, table: &TableSchema) -> Result<()> {
        let statements = self.dialect.create_table_statements(table);
        self.exec_in_batch(&statements).await
    }

    /// Drops the table `name`.
    pub async fn drop_table(&mut self, name: &str) -> Result<()> {
        let statements = self.dialect.drop_table_statements(name);
        self.exec_in_batch(&statements).await
    }

    /// Fails when the dialect rebuilds tables and the live `table` has
    /// columns its definition does not list: the rebuild would drop them.
    async fn ensure_complete_definition(&mut self, table: &TableSchema) -> Result<()> {
        if !self.dialect.recreates_tables() {
            return Ok(());
        }

        let key = normalize_table_name(&table.name, self.transaction.default_schema()).to_string();
        let columns = self
            .transaction
            .table_columns(std::slice::from_ref(table))
            .await?;
        let Some(actual) = columns.get(&key) else {
            return Ok(());
        };

        let unlisted: Vec<&str> = actual
            .iter()
            .filter(|c| table.get_column(&c.name).is_none())
            .map(|c| c.name.as_str())
            .collect();
        if unlisted.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::InvalidState(format!(
                "Definition of table '{}' does not list its columns [{}], rebuilding it would drop them",
                table.name,
                unlisted.join(", ")
            )))
        }
    }

    /// Adds `column` to `table`.
    ///
    /// A primary key column may rebuild the table, so `table` must then list
    /// every existing column.
    pub async fn create_column(&mut self, table: &TableSchema, column: &ColumnSchema) -> Result<()> {
        if column.primary_key {
            self.ensure_complete_definition(table).await?;
        }
        let statements = self.dialect.create_column_statements(table, column);
        self.exec_in_batch(&statements).await
    }

    /// Adds `column` to `table`, filling existing rows with `initial`.
    ///
    /// The column is first created with `initial` as its default, then
    /// modified back to its declared default so new rows are not forced to
    /// take `initial`. `table` must list every existing column.
    pub async fn create_column_with_initial(
        &mut self,
        table: &TableSchema,
        column: &ColumnSchema,
        initial: DefaultValue,
    ) -> Result<()> {
        self.ensure_complete_definition(table).await?;
        let with_initial = column.clone().default(initial);
        let create = self.dialect.create_column_statements(table, &with_initial);
        self.exec_in_batch(&create).await?;

        let modify = self
            .dialect
            .modify_column_statements(table, column, &ColumnDiff::defaults_only());
        self.exec_in_batch(&modify).await
    }

    /// Brings `column` of `table` in line with its definition.
    ///
    /// `table` must list every existing column.
    pub async fn modify_column(&mut self, table: &TableSchema, column: &ColumnSchema) -> Result<()> {
        self.ensure_complete_definition(table).await?;
        let statements = self
            .dialect
            .modify_column_statements(table, column, &ColumnDiff::all());
        self.exec_in_batch(&statements).await
    }

    /// Drops the column `column_name` from `table`.
    pub async fn drop_column(&mut self, table: &str, column_name: &str) -> Result<()> {
        let statements = self.dialect.drop_column_statements(table, column_name);
        self.exec_in_batch(&statements).await
    }

    /// Marks the transaction of this step for rollback.
    ///
    /// The step is rolled back instead of committed even if it returns
    /// `Ok`.
    pub fn rollback(&mut self) {
        self.logger.log("Rollback requested");
        self.rollback_requested = true;
    }

    /// Returns whether [`rollback`](Self::rollback) was called.
    #[must_use]
    pub fn is_rollback_requested(&self) -> bool {
        self.rollback_requested
    }
}
