//! rlm - Royalty-rights ledger CLI
//!
//! Resolves configuration, opens the ledger database and runs one command.

use anyhow::Result;
use clap::Parser;
use rlm_cli::{run, Cli};
use rlm_common::config::LedgerConfig;
use rlm_common::db::{init_database, SqliteStore};
use rlm_common::events::EventBus;
use rlm_common::service::LedgerService;
use rlm_common::SplitValidator;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = LedgerConfig::resolve(cli.database.as_deref(), cli.config.as_deref());

    // RUST_LOG wins over the configured level; stdout is reserved for JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting rlm v{}", env!("CARGO_PKG_VERSION"));
    info!("Database path: {}", config.database_path.display());

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let service = LedgerService::new(
        Arc::new(SqliteStore::new(pool)),
        EventBus::new(config.event_bus_capacity),
        SplitValidator::with_tolerance(config.share_tolerance),
    );

    let output = match run(cli.command, &service).await {
        Ok(output) => output,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
