//! rlm - royalty-rights ledger command line tool
//!
//! Every command prints one JSON document on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rlm_common::normalize::parse_contract_json;
use rlm_common::resolver::resolve_work;
use rlm_common::service::LedgerService;
use rlm_common::store::ContractStore;
use rlm_common::{ContractId, ContractStatus, RegistrationStatus, TransitionTrigger, WorkId};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "rlm")]
#[command(about = "Royalty-rights ledger: import, validate and export contract splits")]
#[command(version)]
pub struct Cli {
    /// Ledger database file (overrides RLM_DATABASE and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// TOML config file (overrides RLM_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Import a contract from a JSON file (camelCase and legacy field names accepted)
    Import { file: PathBuf },

    /// List stored contracts
    List,

    /// Validate a contract's party ledger
    Validate { contract_id: Uuid },

    /// Show the effective terms of one scheduled work
    Resolve { contract_id: Uuid, work_id: Uuid },

    /// Build the registration export for one scheduled work
    Export { contract_id: Uuid, work_id: Uuid },

    /// Move a work's registration with a collecting body to a new status
    Register {
        contract_id: Uuid,
        work_id: Uuid,
        body: String,
        #[arg(value_parser = parse_registration_status)]
        status: RegistrationStatus,

        /// Territory recorded when the body has no record yet
        #[arg(long, default_value = "WW")]
        territory: String,

        /// Manual correction (allows any status change)
        #[arg(long)]
        manual: bool,
    },

    /// Change a contract's lifecycle status (activation is gated)
    Status {
        contract_id: Uuid,
        #[arg(value_parser = parse_contract_status)]
        status: ContractStatus,
    },

    /// Finalize a scheduled work (requires writer shares totalling 100%)
    Finalize { contract_id: Uuid, work_id: Uuid },
}

fn parse_registration_status(s: &str) -> std::result::Result<RegistrationStatus, String> {
    RegistrationStatus::from_str(s).ok_or_else(|| format!("unknown registration status: {}", s))
}

fn parse_contract_status(s: &str) -> std::result::Result<ContractStatus, String> {
    ContractStatus::from_str(s).ok_or_else(|| format!("unknown contract status: {}", s))
}

/// Execute one command against the ledger service
pub async fn run<S: ContractStore>(command: Command, service: &LedgerService<S>) -> Result<Value> {
    let output = match command {
        Command::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let contract = parse_contract_json(&content)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            let report = service.save_contract(&contract).await?;
            info!("Imported contract {} from {}", contract.id, file.display());
            json!({
                "contract_id": contract.id,
                "counterparty": contract.counterparty,
                "parties": contract.ledger.len(),
                "works": contract.schedule.len(),
                "report": report,
            })
        }
        Command::List => serde_json::to_value(service.list_contracts().await?)?,
        Command::Validate { contract_id } => {
            serde_json::to_value(service.validate(ContractId(contract_id)).await?)?
        }
        Command::Resolve {
            contract_id,
            work_id,
        } => {
            let contract = service.load_contract(ContractId(contract_id)).await?;
            let terms = resolve_work(&contract, WorkId(work_id))?;
            serde_json::to_value(&terms)?
        }
        Command::Export {
            contract_id,
            work_id,
        } => serde_json::to_value(
            service
                .export_work(ContractId(contract_id), WorkId(work_id))
                .await?,
        )?,
        Command::Register {
            contract_id,
            work_id,
            body,
            status,
            territory,
            manual,
        } => {
            let trigger = if manual {
                TransitionTrigger::Manual
            } else {
                TransitionTrigger::Automatic
            };
            let record = service
                .transition_registration(
                    ContractId(contract_id),
                    WorkId(work_id),
                    &body,
                    &territory,
                    status,
                    trigger,
                )
                .await?;
            serde_json::to_value(record)?
        }
        Command::Status {
            contract_id,
            status,
        } => {
            let report = service
                .set_contract_status(ContractId(contract_id), status)
                .await?;
            json!({ "contract_id": contract_id, "status": status, "report": report })
        }
        Command::Finalize {
            contract_id,
            work_id,
        } => {
            let report = service
                .finalize_work(ContractId(contract_id), WorkId(work_id))
                .await?;
            json!({ "work_id": work_id, "finalized": true, "report": report })
        }
    };
    Ok(output)
}
