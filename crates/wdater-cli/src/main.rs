//! wdater CLI
//!
//! Command-line tool for inspecting the schema version of a database and
//! bringing it in line with a JSON schema file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wdater::prelude::*;
use wdater_auto::AutoMigration;

/// Versioned, transactional schema updates.
#[derive(Parser)]
#[command(name = "wdater")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Table the schema version is stored in.
    #[arg(short, long, default_value = wdater::storage::DEFAULT_TABLE_NAME)]
    table: String,

    /// Enable verbose output (logs executed SQL).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored schema version.
    Version,

    /// Overwrite the stored schema version.
    SetVersion {
        /// New schema version.
        version: i32,
    },

    /// Show what an automatic migration would do, without applying it.
    Plan {
        /// JSON file with the declared tables.
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Bring the database in line with a schema file.
    Migrate {
        /// JSON file with the declared tables.
        #[arg(short, long)]
        schema: PathBuf,

        /// Version the migration starts from (stored version if not specified).
        #[arg(long)]
        from: Option<i32>,

        /// Version reached once migrated (next version if not specified).
        #[arg(long)]
        to: Option<i32>,
    },
}

fn load_schema(path: &Path) -> anyhow::Result<Vec<TableSchema>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let tables: Vec<TableSchema> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid schema file {}", path.display()))?;
    Ok(tables)
}

/// Runs the automatic migration in a transaction that is always rolled back.
async fn plan(
    database: &SqliteDatabase,
    reserved: &[String],
    auto: &AutoMigration,
) -> Result<Vec<StructuralOperation>> {
    let mut tx = database.begin().await?;
    let mut ctx = MigrationContext::new(tx.as_mut(), database.dialect(), Logger::none())
        .with_reserved_tables(reserved);
    let result = auto.run(&mut ctx).await;
    drop(ctx);
    tx.rollback().await?;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let database = Arc::new(SqliteDatabase::connect(&cli.database).await?);
    let storage = Arc::new(TableStorage::new(database.pool().clone(), cli.table.clone()));

    match cli.command {
        Commands::Version => match storage.get_schema_version().await? {
            Some(version) => {
                println!("Schema version: {version}");
                if let Some(updated_at) = storage.last_updated().await? {
                    println!("Last updated:   {}", updated_at.to_rfc3339());
                }
            }
            None => println!("Schema version: unset"),
        },

        Commands::SetVersion { version } => {
            storage.set_schema_version(version).await?;
            info!("Schema version set to {version}");
        }

        Commands::Plan { schema } => {
            let tables = load_schema(&schema)?;
            let auto = AutoMigration::new(tables, 0);
            let reserved = vec![cli.table.clone()];

            let operations = plan(&database, &reserved, &auto).await?;
            if operations.is_empty() {
                info!("Database already matches {}", schema.display());
                return Ok(());
            }

            println!("\nPlanned operations:");
            println!("{:-<60}", "");
            for operation in &operations {
                let marker = if operation.is_destructive() { "!" } else { "+" };
                println!("{marker} {operation}");
                for sql in auto.operation_statements(database.dialect(), operation) {
                    println!("    {sql};");
                }
            }
            println!();
        }

        Commands::Migrate { schema, from, to } => {
            let tables = load_schema(&schema)?;
            let stored = storage.get_schema_version().await?;
            let from = from.or(stored).unwrap_or_default();

            let mut auto = AutoMigration::new(tables, from);
            if let Some(to) = to {
                auto = auto.to_version(to);
            }

            let config = WdaterConfig::builder(database.clone())
                .storage(storage.clone())
                .initializer(auto.clone())
                .logger(Logger::new())
                .build();
            let migrations: Vec<Box<dyn Migration>> = vec![Box::new(auto)];

            let version = Wdater::new(config).update(&migrations).await?;
            info!("Database is at schema version {version}");
        }
    }

    Ok(())
}
