//! Integration tests for automatic migrations on SQLite.
//!
//! Each test prepares a database by hand, runs an [`AutoMigration`] against
//! it and checks both the reported operations and the resulting schema.

mod common;

use std::sync::Arc;

use common::*;
use wdater::prelude::*;
use wdater_auto::AutoMigration;

// =============================================================================
// Tables
// =============================================================================

#[tokio::test]
async fn test_creates_schema_on_empty_database() {
    let db = memory_database().await;
    let migration = AutoMigration::new(vec![users_v2(), posts()], 0);

    let applied = run_auto(&db, &migration).await.unwrap();
    assert_eq!(applied.len(), 2);
    assert!(applied
        .iter()
        .all(|op| matches!(op, StructuralOperation::CreateTable { .. })));
    assert_eq!(table_names(&db).await, vec!["posts", "users"]);

    // A second run finds nothing to do
    let applied = run_auto(&db, &migration).await.unwrap();
    assert!(applied.is_empty(), "Expected no operations, got {applied:?}");
}

#[tokio::test]
async fn test_table_ambiguity_changes_nothing() {
    let db = memory_database().await;
    execute(&db, "CREATE TABLE legacy_users (id INTEGER PRIMARY KEY, name TEXT)").await;

    let migration = AutoMigration::new(vec![users_v1()], 0);
    let err = run_auto(&db, &migration).await.unwrap_err();

    assert!(err.is_ambiguity(), "Expected ambiguity, got {err:?}");
    assert_eq!(table_names(&db).await, vec!["legacy_users"]);
}

#[tokio::test]
async fn test_drops_obsolete_tables_only() {
    let db = memory_database().await;
    execute(&db, "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)").await;
    execute(&db, "CREATE TABLE sessions (token TEXT)").await;
    execute(&db, "CREATE TABLE audit (entry TEXT)").await;

    let migration = AutoMigration::new(vec![users_v1()], 0).ignore_table("audit");
    let applied = run_auto(&db, &migration).await.unwrap();

    assert_eq!(
        applied,
        vec![StructuralOperation::DropTable {
            name: "sessions".into()
        }]
    );
    assert_eq!(table_names(&db).await, vec!["audit", "users"]);
}

// =============================================================================
// Columns
// =============================================================================

#[tokio::test]
async fn test_adds_missing_column_and_keeps_rows() {
    let db = memory_database().await;
    run_auto(&db, &AutoMigration::new(vec![users_v1()], 0))
        .await
        .unwrap();
    execute(&db, "INSERT INTO users (name) VALUES ('ada'), ('grace')").await;

    let applied = run_auto(&db, &AutoMigration::new(vec![users_v2()], 1))
        .await
        .unwrap();

    assert_eq!(applied.len(), 1);
    match &applied[0] {
        StructuralOperation::CreateColumn { table, column } => {
            assert_eq!(table, "users");
            assert_eq!(column.name, "email");
        }
        other => panic!("Expected CreateColumn, got {other:?}"),
    }

    let names: Vec<String> = columns(&db, &users_v2())
        .await
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["id", "name", "email"]);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_adds_unique_column_to_existing_table() {
    let db = memory_database().await;
    run_auto(&db, &AutoMigration::new(vec![users_v1()], 0))
        .await
        .unwrap();
    execute(&db, "INSERT INTO users (name) VALUES ('ada'), ('grace')").await;

    let users = users_v1().column(ColumnSchema::new("handle", SqlType::Text).unique());
    let applied = run_auto(&db, &AutoMigration::new(vec![users.clone()], 1))
        .await
        .unwrap();

    assert_eq!(applied.len(), 1);
    assert!(matches!(
        &applied[0],
        StructuralOperation::CreateColumn { column, .. } if column.name == "handle"
    ));
    let names: Vec<String> = columns(&db, &users)
        .await
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["id", "name", "handle"]);

    // Existing rows keep NULL handles, new duplicates are rejected
    execute(&db, "UPDATE users SET handle = 'ada' WHERE name = 'ada'").await;
    let duplicate = sqlx::query("UPDATE users SET handle = 'ada' WHERE name = 'grace'")
        .execute(db.pool())
        .await;
    assert!(duplicate.is_err(), "Expected a unique violation");

    let applied = run_auto(&db, &AutoMigration::new(vec![users], 2))
        .await
        .unwrap();
    assert!(applied.is_empty(), "Expected no operations, got {applied:?}");
}

#[tokio::test]
async fn test_drops_obsolete_column() {
    let db = memory_database().await;
    execute(
        &db,
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, nickname TEXT)",
    )
    .await;

    let applied = run_auto(&db, &AutoMigration::new(vec![users_v1()], 0))
        .await
        .unwrap();

    assert_eq!(
        applied,
        vec![StructuralOperation::DropColumn {
            table: "users".into(),
            column_name: "nickname".into(),
        }]
    );
    assert_eq!(columns(&db, &users_v1()).await.len(), 2);
}

#[tokio::test]
async fn test_column_ambiguity_changes_nothing() {
    let db = memory_database().await;
    execute(
        &db,
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, mail TEXT)",
    )
    .await;

    // posts is new and would be created before the column diff of users
    let migration = AutoMigration::new(vec![posts(), users_v2()], 0);
    let err = run_auto(&db, &migration).await.unwrap_err();

    assert!(err.to_string().contains("table 'users'"), "{err}");
    assert_eq!(table_names(&db).await, vec!["users"]);
    let names: Vec<String> = columns(&db, &users_v2())
        .await
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["id", "name", "mail"]);
}

// =============================================================================
// Modifications
// =============================================================================

#[tokio::test]
async fn test_nullability_drift_modifies_one_column() {
    let db = memory_database().await;
    execute(
        &db,
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, email TEXT)",
    )
    .await;
    execute(&db, "INSERT INTO users (name, email) VALUES ('ada', NULL)").await;

    let applied = run_auto(&db, &AutoMigration::new(vec![users_v2()], 0))
        .await
        .unwrap();

    assert_eq!(applied.len(), 1);
    match &applied[0] {
        StructuralOperation::ModifyColumn {
            column,
            nullability_changed,
            ..
        } => {
            assert_eq!(column.name, "name");
            assert!(nullability_changed);
        }
        other => panic!("Expected ModifyColumn, got {other:?}"),
    }

    let columns = columns(&db, &users_v2()).await;
    let name = columns.iter().find(|c| c.name == "name").unwrap();
    let email = columns.iter().find(|c| c.name == "email").unwrap();
    assert!(!name.nullable);
    assert!(email.nullable);

    let kept: String = sqlx::query_scalar("SELECT name FROM users")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(kept, "ada");

    let applied = run_auto(&db, &AutoMigration::new(vec![users_v2()], 1))
        .await
        .unwrap();
    assert!(applied.is_empty());
}

#[tokio::test]
async fn test_auto_increment_column_is_never_modified() {
    let db = memory_database().await;
    execute(&db, "CREATE TABLE counters (id INTEGER, hits INTEGER NOT NULL)").await;

    let counters = TableSchema::new("counters")
        .column(
            ColumnSchema::new("id", SqlType::Integer)
                .not_null()
                .auto_increment(),
        )
        .column(ColumnSchema::new("hits", SqlType::Integer).not_null());

    let applied = run_auto(&db, &AutoMigration::new(vec![counters.clone()], 0))
        .await
        .unwrap();
    assert!(applied.is_empty(), "Expected no operations, got {applied:?}");

    let id = columns(&db, &counters)
        .await
        .into_iter()
        .find(|c| c.name == "id")
        .unwrap();
    assert!(id.nullable);
}

// =============================================================================
// Through the updater
// =============================================================================

#[tokio::test]
async fn test_version_table_survives_auto_migrations() {
    let db = memory_database().await;
    let wdater = Wdater::new(WdaterConfig::new(db.clone()));

    // Stamps version 0 and creates the version table
    assert_eq!(wdater.update(&[]).await.unwrap(), 0);

    let migrations: Vec<Box<dyn Migration>> = vec![
        Box::new(AutoMigration::new(vec![users_v1()], 0)),
        Box::new(AutoMigration::new(vec![users_v2(), posts()], 1).to_version(5)),
    ];
    assert_eq!(wdater.update(&migrations).await.unwrap(), 5);
    assert_eq!(table_names(&db).await, vec!["migrations", "posts", "users"]);

    // Everything declared away is dropped, except the version table
    let migrations: Vec<Box<dyn Migration>> = vec![Box::new(AutoMigration::new(Vec::new(), 5))];
    assert_eq!(wdater.update(&migrations).await.unwrap(), 6);
    assert_eq!(table_names(&db).await, vec!["migrations"]);
    assert_eq!(wdater.current_version().await.unwrap(), Some(6));
}

#[tokio::test]
async fn test_ambiguity_through_updater_keeps_version() {
    let db = memory_database().await;
    execute(&db, "CREATE TABLE legacy_users (id INTEGER PRIMARY KEY)").await;
    let storage = Arc::new(MemoryStorage::with_version(3));
    let wdater = Wdater::new(WdaterConfig::builder(db.clone()).storage(storage).build());

    let migrations: Vec<Box<dyn Migration>> = vec![Box::new(AutoMigration::new(vec![users_v1()], 3))];
    let err = wdater.update(&migrations).await.unwrap_err();

    assert!(matches!(err, MigrateError::CannotAutoMigrate { .. }));
    assert_eq!(wdater.current_version().await.unwrap(), Some(3));
    assert_eq!(table_names(&db).await, vec!["legacy_users"]);
}

#[tokio::test]
async fn test_initializes_fresh_database_from_declared_tables() {
    let db = memory_database().await;
    let auto = AutoMigration::new(vec![users_v2(), posts()], 0).to_version(2);
    let wdater = Wdater::new(WdaterConfig::builder(db.clone()).initializer(auto.clone()).build());

    let migrations: Vec<Box<dyn Migration>> = vec![Box::new(auto)];
    assert_eq!(wdater.update(&migrations).await.unwrap(), 2);
    assert_eq!(table_names(&db).await, vec!["migrations", "posts", "users"]);
}
