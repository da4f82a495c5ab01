//! Database initialization
//!
//! Creates the database file and tables on first run. Table creation is
//! idempotent, so opening an existing database runs the same path.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open (creating if needed) the ledger database at `db_path`
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with all tables (tests, scratch use)
pub async fn open_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    create_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;
    Ok(pool)
}

/// Create every table if missing
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_contracts_table(pool).await?;
    create_interested_parties_table(pool).await?;
    create_schedule_works_table(pool).await?;
    create_work_writers_table(pool).await?;
    create_registrations_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contracts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contracts (
            guid TEXT PRIMARY KEY,
            counterparty TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft',
            contract_type TEXT NOT NULL,
            terms TEXT NOT NULL,
            territories TEXT NOT NULL DEFAULT '[]',
            start_date TEXT,
            end_date TEXT,
            advance REAL,
            rate_reduction REAL,
            recouped INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_interested_parties_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interested_parties (
            guid TEXT PRIMARY KEY,
            contract_guid TEXT NOT NULL REFERENCES contracts(guid) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            alias TEXT,
            party_type TEXT NOT NULL,
            control TEXT NOT NULL DEFAULT 'NC',
            performance REAL NOT NULL DEFAULT 0,
            mechanical REAL NOT NULL DEFAULT 0,
            print REAL NOT NULL DEFAULT 0,
            synch REAL NOT NULL DEFAULT 0,
            grand_rights REAL NOT NULL DEFAULT 0,
            karaoke REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_schedule_works_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedule_works (
            guid TEXT PRIMARY KEY,
            contract_guid TEXT NOT NULL REFERENCES contracts(guid) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            title TEXT NOT NULL,
            artist TEXT,
            album TEXT,
            catalog_ref TEXT,
            external_work_id TEXT,
            isrc TEXT,
            iswc TEXT,
            inherits_royalty_splits INTEGER NOT NULL DEFAULT 1,
            inherits_recoupment_status INTEGER NOT NULL DEFAULT 1,
            inherits_controlled_status INTEGER NOT NULL DEFAULT 1,
            advance_override REAL,
            rate_reduction_override REAL,
            recouped_override INTEGER,
            finalized INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_work_writers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_writers (
            work_guid TEXT NOT NULL REFERENCES schedule_works(guid) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            ipi TEXT,
            share REAL NOT NULL,
            PRIMARY KEY (work_guid, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_registrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS registrations (
            work_guid TEXT NOT NULL REFERENCES schedule_works(guid) ON DELETE CASCADE,
            body TEXT NOT NULL COLLATE NOCASE,
            territory TEXT NOT NULL,
            work_number TEXT,
            status TEXT NOT NULL DEFAULT 'not_registered',
            updated_at TEXT,
            PRIMARY KEY (work_guid, body)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
