#![allow(dead_code)]

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use wdater::prelude::*;
use wdater_auto::AutoMigration;

pub async fn memory_database() -> Arc<SqliteDatabase> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    Arc::new(SqliteDatabase::new(pool))
}

pub async fn execute(db: &SqliteDatabase, sql: &str) {
    sqlx::query(sql)
        .execute(db.pool())
        .await
        .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e:?}"));
}

pub async fn table_names(db: &SqliteDatabase) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
    )
    .fetch_all(db.pool())
    .await
    .expect("Failed to list tables")
}

pub async fn columns(db: &SqliteDatabase, table: &TableSchema) -> Vec<ColumnMetadata> {
    let mut tx = db.begin().await.unwrap();
    let mut columns = tx.table_columns(std::slice::from_ref(table)).await.unwrap();
    tx.rollback().await.unwrap();
    columns.remove(&table.name).unwrap_or_default()
}

/// Runs `migration` in its own transaction, committing only on success.
pub async fn run_auto(
    db: &SqliteDatabase,
    migration: &AutoMigration,
) -> Result<Vec<StructuralOperation>> {
    let mut tx = db.begin().await?;
    let mut ctx = MigrationContext::new(tx.as_mut(), db.dialect(), Logger::none());
    let result = migration.run(&mut ctx).await;
    let rollback_requested = ctx.is_rollback_requested();
    drop(ctx);

    match result {
        Ok(applied) if !rollback_requested => {
            tx.commit().await?;
            Ok(applied)
        }
        Ok(_) => {
            tx.rollback().await?;
            Err(MigrateError::RollbackRequested {
                migration: "AutoMigration".into(),
            })
        }
        Err(err) => {
            tx.rollback().await?;
            Err(err)
        }
    }
}

pub fn users_v1() -> TableSchema {
    TableSchema::new("users")
        .column(
            ColumnSchema::new("id", SqlType::BigInt)
                .primary_key()
                .auto_increment(),
        )
        .column(ColumnSchema::new("name", SqlType::Text).not_null())
}

pub fn users_v2() -> TableSchema {
    users_v1().column(ColumnSchema::new("email", SqlType::Varchar(255)))
}

pub fn posts() -> TableSchema {
    TableSchema::new("posts")
        .column(
            ColumnSchema::new("id", SqlType::BigInt)
                .primary_key()
                .auto_increment(),
        )
        .column(ColumnSchema::new("title", SqlType::Text).not_null())
        .column(
            ColumnSchema::new("published", SqlType::Boolean)
                .not_null()
                .default(DefaultValue::Bool(false)),
        )
}
