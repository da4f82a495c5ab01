//! Import normalization
//!
//! Contract records arriving from outside (JSON exports, older form
//! payloads) spell the same concept several ways: `inheritsRoyaltySplits`
//! vs `inherits_royalty_splits`, `perf_share` vs `performance`, `"50%"` vs
//! `50`. This module maps every accepted spelling onto the single canonical
//! field before anything reaches the core. Two spellings of the same field
//! in one record are rejected rather than resolved by precedence.

use crate::contract::{Contract, ContractId, ContractStatus, ContractTerms, FinancialTerms};
use crate::ledger::{ControlStatus, InterestedParty, PartyId, PartyLedger, PartyType};
use crate::rights::{RightType, ShareSet};
use crate::schedule::{
    ExternalIds, InheritanceFlags, ScheduleWork, WorkId, WorkOverrides, WorkSchedule, WorkWriter,
};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

/// Percentage as number or text ("50", "50%", " 12.5 % ")
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPercent {
    Number(f64),
    Text(String),
}

impl RawPercent {
    pub fn to_percentage(&self) -> Result<f64> {
        let value = match self {
            RawPercent::Number(n) => *n,
            RawPercent::Text(s) => {
                let trimmed = s.trim().trim_end_matches('%').trim();
                if trimmed.is_empty() {
                    return Ok(0.0);
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| Error::InvalidInput(format!("not a percentage: {:?}", s)))?
            }
        };
        if !value.is_finite() {
            return Err(Error::InvalidInput(format!("not a percentage: {}", value)));
        }
        Ok(value)
    }
}

/// Control flag as boolean or code ("C", "NC")
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawControl {
    Flag(bool),
    Code(String),
}

impl RawControl {
    fn to_status(&self) -> Result<ControlStatus> {
        match self {
            RawControl::Flag(true) => Ok(ControlStatus::Controlled),
            RawControl::Flag(false) => Ok(ControlStatus::NonControlled),
            RawControl::Code(code) => ControlStatus::from_str(code)
                .ok_or_else(|| Error::InvalidInput(format!("unknown control status: {:?}", code))),
        }
    }
}

/// Territory list as array or comma-separated text
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTerritories {
    List(Vec<String>),
    Text(String),
}

impl RawTerritories {
    fn to_set(&self) -> BTreeSet<String> {
        let items: Vec<&str> = match self {
            RawTerritories::List(list) => list.iter().map(String::as_str).collect(),
            RawTerritories::Text(text) => text.split(',').collect(),
        };
        items
            .into_iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawParty {
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default, alias = "aka")]
    pub alias: Option<String>,
    #[serde(alias = "partyType", alias = "type", alias = "role")]
    pub party_type: String,
    #[serde(default, alias = "controlled", alias = "controlStatus", alias = "control_status")]
    pub control: Option<RawControl>,
    /// Share columns under any accepted spelling
    #[serde(flatten)]
    pub share_fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWriter {
    pub name: String,
    #[serde(default, alias = "ipiNumber", alias = "ipi_number")]
    pub ipi: Option<String>,
    #[serde(alias = "writer_share", alias = "writerShare", alias = "percentage")]
    pub share: RawPercent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWork {
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default, alias = "catalogRef", alias = "track_id", alias = "trackId")]
    pub catalog_ref: Option<String>,
    #[serde(default, alias = "workId")]
    pub work_id: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub iswc: Option<String>,
    #[serde(default, alias = "inheritsRoyaltySplits", alias = "inherit_splits")]
    pub inherits_royalty_splits: Option<bool>,
    #[serde(default, alias = "inheritsRecoupmentStatus", alias = "inherit_recoupment")]
    pub inherits_recoupment_status: Option<bool>,
    #[serde(default, alias = "inheritsControlledStatus", alias = "inherit_controlled")]
    pub inherits_controlled_status: Option<bool>,
    #[serde(default, alias = "advanceOverride")]
    pub advance_override: Option<RawPercentOrAmount>,
    #[serde(default, alias = "rateReductionOverride")]
    pub rate_reduction_override: Option<RawPercentOrAmount>,
    #[serde(default, alias = "recoupedOverride", alias = "recouped")]
    pub recouped_override: Option<bool>,
    #[serde(default)]
    pub writers: Vec<RawWriter>,
}

/// Amounts share the percentage parser (numbers or numeric text)
pub type RawPercentOrAmount = RawPercent;

#[derive(Debug, Clone, Deserialize)]
pub struct RawContract {
    pub id: Option<Uuid>,
    #[serde(alias = "counterpartyName", alias = "counterparty_name")]
    pub counterparty: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub territories: Option<RawTerritories>,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,
    #[serde(alias = "contractTerms", alias = "contract_terms")]
    pub terms: ContractTerms,
    #[serde(default)]
    pub advance: Option<RawPercentOrAmount>,
    #[serde(default, alias = "rateReduction")]
    pub rate_reduction: Option<RawPercentOrAmount>,
    #[serde(default)]
    pub recouped: bool,
    #[serde(default, alias = "interested_parties", alias = "interestedParties")]
    pub parties: Vec<RawParty>,
    #[serde(default, alias = "schedule", alias = "scheduleWorks")]
    pub works: Vec<RawWork>,
}

/// Map a share column name onto its right type
///
/// Accepts `<right>`, `<right>_share`, `<right>_pct`, `<right>_percentage`
/// and camelCase forms such as `performanceShare`.
fn share_column(key: &str) -> Option<RightType> {
    let lower = key.to_lowercase();
    let base = ["_percentage", "percentage", "_share", "share", "_pct", "pct"]
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))
        .unwrap_or(lower.as_str());
    RightType::from_str(base.trim_end_matches('_'))
}

fn normalize_party(raw: RawParty) -> Result<InterestedParty> {
    let party_type = PartyType::from_str(&raw.party_type)
        .ok_or_else(|| Error::InvalidInput(format!("unknown party type: {:?}", raw.party_type)))?;
    let control = match &raw.control {
        Some(control) => control.to_status()?,
        None => ControlStatus::NonControlled,
    };

    let mut shares = ShareSet::default();
    let mut seen: BTreeMap<RightType, String> = BTreeMap::new();
    for (key, value) in &raw.share_fields {
        let Some(right) = share_column(key) else {
            debug!("Ignoring unrecognised party field {:?}", key);
            continue;
        };
        if let Some(previous) = seen.insert(right, key.clone()) {
            return Err(Error::InvalidInput(format!(
                "party {:?} sets {} twice ({:?} and {:?})",
                raw.name, right, previous, key
            )));
        }
        let percent: RawPercent = serde_json::from_value(value.clone())?;
        shares.set(right, percent.to_percentage()?);
    }

    Ok(InterestedParty {
        id: raw.id.map(PartyId).unwrap_or_default(),
        name: raw.name,
        alias: raw.alias.filter(|a| !a.trim().is_empty()),
        party_type,
        control,
        shares,
    })
}

fn normalize_work(raw: RawWork) -> Result<ScheduleWork> {
    let defaults = InheritanceFlags::default();
    let inheritance = InheritanceFlags {
        royalty_splits: raw.inherits_royalty_splits.unwrap_or(defaults.royalty_splits),
        recoupment_status: raw
            .inherits_recoupment_status
            .unwrap_or(defaults.recoupment_status),
        controlled_status: raw
            .inherits_controlled_status
            .unwrap_or(defaults.controlled_status),
    };
    let overrides = WorkOverrides {
        advance: raw.advance_override.map(|v| v.to_percentage()).transpose()?,
        rate_reduction: raw
            .rate_reduction_override
            .map(|v| v.to_percentage())
            .transpose()?,
        recouped: raw.recouped_override,
    };
    let writers = raw
        .writers
        .into_iter()
        .map(|w| {
            Ok(WorkWriter {
                name: w.name,
                ipi: w.ipi,
                share: w.share.to_percentage()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScheduleWork {
        id: raw.id.map(WorkId).unwrap_or_default(),
        title: raw.title,
        artist: raw.artist,
        album: raw.album,
        catalog_ref: raw.catalog_ref,
        external_ids: ExternalIds {
            work_id: raw.work_id,
            isrc: raw.isrc,
            iswc: raw.iswc,
        },
        inheritance,
        overrides,
        writers,
        registrations: Vec::new(),
        finalized: false,
    })
}

fn parse_date(field: &str, value: Option<String>) -> Result<Option<NaiveDate>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{} {:?}: {}", field, text, e))),
    }
}

/// Convert a raw record into a canonical contract
pub fn normalize_contract(raw: RawContract) -> Result<Contract> {
    let status = match raw.status.as_deref() {
        None => ContractStatus::Draft,
        Some(s) => ContractStatus::from_str(s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown contract status: {:?}", s)))?,
    };

    let parties = raw
        .parties
        .into_iter()
        .map(normalize_party)
        .collect::<Result<Vec<_>>>()?;
    let works = raw
        .works
        .into_iter()
        .map(normalize_work)
        .collect::<Result<Vec<_>>>()?;

    let contract = Contract {
        id: raw.id.map(ContractId).unwrap_or_default(),
        counterparty: raw.counterparty.trim().to_string(),
        status,
        territories: raw.territories.map(|t| t.to_set()).unwrap_or_default(),
        start_date: parse_date("start_date", raw.start_date)?,
        end_date: parse_date("end_date", raw.end_date)?,
        terms: raw.terms,
        financials: FinancialTerms {
            advance: raw.advance.map(|v| v.to_percentage()).transpose()?,
            rate_reduction: raw.rate_reduction.map(|v| v.to_percentage()).transpose()?,
            recouped: raw.recouped,
        },
        ledger: PartyLedger::from_parties(parties),
        schedule: WorkSchedule::from_works(works),
        created_at: None,
        updated_at: None,
    };
    contract.check_dates()?;
    Ok(contract)
}

/// Parse and normalize a contract from JSON text
pub fn parse_contract_json(json: &str) -> Result<Contract> {
    let raw: RawContract = serde_json::from_str(json)?;
    normalize_contract(raw)
}
