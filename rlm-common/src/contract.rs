//! Contract model
//!
//! A contract owns one party ledger and one work schedule. Type-specific
//! terms are a tagged union selected by the contract type, so each
//! agreement kind carries its own strongly-typed fields.

use crate::ledger::PartyLedger;
use crate::schedule::WorkSchedule;
use crate::validator::{SplitValidator, ValidationReport};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

/// Contract identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub Uuid);

impl ContractId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContractId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contract lifecycle status
///
/// Contracts are never hard-deleted here; they move to `Expired` or
/// `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Draft,
    Signed,
    Active,
    Expired,
    Terminated,
}

impl ContractStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(ContractStatus::Draft),
            "signed" => Some(ContractStatus::Signed),
            "active" => Some(ContractStatus::Active),
            "expired" => Some(ContractStatus::Expired),
            "terminated" => Some(ContractStatus::Terminated),
            _ => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Signed => "signed",
            ContractStatus::Active => "active",
            ContractStatus::Expired => "expired",
            ContractStatus::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Contract type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    Publishing,
    Artist,
    Producer,
    Sync,
    Distribution,
}

impl ContractType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "publishing" => Some(ContractType::Publishing),
            "artist" => Some(ContractType::Artist),
            "producer" => Some(ContractType::Producer),
            "sync" | "synch" => Some(ContractType::Sync),
            "distribution" => Some(ContractType::Distribution),
            _ => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            ContractType::Publishing => "publishing",
            ContractType::Artist => "artist",
            ContractType::Producer => "producer",
            ContractType::Sync => "sync",
            ContractType::Distribution => "distribution",
        }
    }
}

/// Type-specific contract terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "contract_type", rename_all = "snake_case")]
pub enum ContractTerms {
    Publishing {
        administration_fee_pct: f64,
        #[serde(default)]
        co_publishing_share_pct: Option<f64>,
        #[serde(default)]
        term_years: Option<u32>,
        #[serde(default)]
        retention_years: Option<u32>,
    },
    Artist {
        royalty_rate_pct: f64,
        #[serde(default)]
        album_commitment: Option<u32>,
        #[serde(default)]
        exclusivity_months: Option<u32>,
    },
    Producer {
        producer_points: f64,
        #[serde(default)]
        per_track_fee: Option<f64>,
    },
    Sync {
        license_fee: f64,
        #[serde(default)]
        media: Vec<String>,
        #[serde(default)]
        exclusivity_window_days: Option<u32>,
    },
    Distribution {
        distribution_fee_pct: f64,
        #[serde(default)]
        acquisition_price: Option<f64>,
    },
}

impl ContractTerms {
    pub fn contract_type(&self) -> ContractType {
        match self {
            ContractTerms::Publishing { .. } => ContractType::Publishing,
            ContractTerms::Artist { .. } => ContractType::Artist,
            ContractTerms::Producer { .. } => ContractType::Producer,
            ContractTerms::Sync { .. } => ContractType::Sync,
            ContractTerms::Distribution { .. } => ContractType::Distribution,
        }
    }
}

/// Contract-level financial terms that schedule works may override
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialTerms {
    pub advance: Option<f64>,
    pub rate_reduction: Option<f64>,
    /// Whether the advance has been recouped
    #[serde(default)]
    pub recouped: bool,
}

/// Agreement with a counterparty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub counterparty: String,
    #[serde(default)]
    pub status: ContractStatus,
    #[serde(default)]
    pub territories: BTreeSet<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub terms: ContractTerms,
    #[serde(default)]
    pub financials: FinancialTerms,
    #[serde(default)]
    pub ledger: PartyLedger,
    #[serde(default)]
    pub schedule: WorkSchedule,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contract {
    /// New draft contract with empty ledger and schedule
    pub fn new(counterparty: impl Into<String>, terms: ContractTerms) -> Self {
        Self {
            id: ContractId::new(),
            counterparty: counterparty.into(),
            status: ContractStatus::Draft,
            territories: BTreeSet::new(),
            start_date: None,
            end_date: None,
            terms,
            financials: FinancialTerms::default(),
            ledger: PartyLedger::new(),
            schedule: WorkSchedule::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn contract_type(&self) -> ContractType {
        self.terms.contract_type()
    }

    /// Reject an end date earlier than the start date
    pub fn check_dates(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(Error::InvalidInput(format!(
                    "contract {} ends ({}) before it starts ({})",
                    self.id, end, start
                )));
            }
        }
        Ok(())
    }

    /// Change lifecycle status
    ///
    /// Moving to `Active` is gated on the controlled-share limit. Right-type
    /// imbalance is logged but allowed. Other statuses are never blocked.
    pub fn set_status(
        &mut self,
        next: ContractStatus,
        validator: &SplitValidator,
    ) -> Result<ValidationReport> {
        let report = validator.validate(&self.ledger);
        if next == ContractStatus::Active {
            report.check_activation()?;
            if report.has_warnings() {
                warn!(
                    "Activating contract {} with {} imbalanced right type(s)",
                    self.id,
                    report.imbalanced_types.len()
                );
            }
        }
        if self.status != next {
            info!("Contract {} status {} -> {}", self.id, self.status, next);
            self.status = next;
        }
        Ok(report)
    }

    pub fn activate(&mut self, validator: &SplitValidator) -> Result<ValidationReport> {
        self.set_status(ContractStatus::Active, validator)
    }
}
