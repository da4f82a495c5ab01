//! Party ledger
//!
//! Interested parties of one contract with their per-right-type shares.
//! The ledger stores whatever the caller hands it; consistency checks live
//! in [`crate::validator`]. Every mutation that changes totals should be
//! followed by a call to [`crate::validator::revalidate`].

use crate::rights::{RightType, ShareSet};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Interested party identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub Uuid);

impl PartyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a contributor on the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    Writer,
    Producer,
    Publisher,
    Administrator,
    CoPublisher,
    Label,
}

impl PartyType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "writer" | "composer" | "songwriter" => Some(PartyType::Writer),
            "producer" => Some(PartyType::Producer),
            "publisher" => Some(PartyType::Publisher),
            "administrator" | "admin" => Some(PartyType::Administrator),
            "co_publisher" | "co-publisher" | "copublisher" => Some(PartyType::CoPublisher),
            "label" => Some(PartyType::Label),
            _ => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            PartyType::Writer => "writer",
            PartyType::Producer => "producer",
            PartyType::Publisher => "publisher",
            PartyType::Administrator => "administrator",
            PartyType::CoPublisher => "co_publisher",
            PartyType::Label => "label",
        }
    }
}

/// Whether the party's interest is administered under this contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlStatus {
    /// Controlled (`C`)
    #[serde(rename = "C")]
    Controlled,
    /// Non-controlled (`NC`), administered elsewhere
    #[serde(rename = "NC")]
    #[default]
    NonControlled,
}

impl ControlStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" | "CONTROLLED" => Some(ControlStatus::Controlled),
            "NC" | "NON_CONTROLLED" | "NON-CONTROLLED" | "NONCONTROLLED" => {
                Some(ControlStatus::NonControlled)
            }
            _ => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            ControlStatus::Controlled => "C",
            ControlStatus::NonControlled => "NC",
        }
    }

    pub fn is_controlled(&self) -> bool {
        matches!(self, ControlStatus::Controlled)
    }
}

/// Contributor attached to exactly one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestedParty {
    pub id: PartyId,
    /// Legal name (not unique: the same writer may appear under two IPI numbers)
    pub name: String,
    pub alias: Option<String>,
    pub party_type: PartyType,
    #[serde(default)]
    pub control: ControlStatus,
    #[serde(default)]
    pub shares: ShareSet,
}

impl InterestedParty {
    pub fn is_controlled(&self) -> bool {
        self.control.is_controlled()
    }
}

/// Input for [`PartyLedger::add_party`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyDraft {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub party_type: PartyType,
}

impl PartyDraft {
    pub fn new(name: impl Into<String>, party_type: PartyType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            party_type,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Ordered list of a contract's interested parties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyLedger {
    parties: Vec<InterestedParty>,
}

impl PartyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from stored parties (store boundary only)
    pub fn from_parties(parties: Vec<InterestedParty>) -> Self {
        Self { parties }
    }

    /// Append a party with all shares at 0 and status `NC`
    pub fn add_party(&mut self, draft: PartyDraft) -> PartyId {
        let id = PartyId::new();
        self.parties.push(InterestedParty {
            id,
            name: draft.name,
            alias: draft.alias,
            party_type: draft.party_type,
            control: ControlStatus::NonControlled,
            shares: ShareSet::default(),
        });
        id
    }

    /// Remove a party and return it
    ///
    /// Totals change, so the caller must revalidate afterwards.
    pub fn remove_party(&mut self, id: PartyId) -> Result<InterestedParty> {
        let index = self.index_of(id)?;
        Ok(self.parties.remove(index))
    }

    /// Store a raw percentage for one right type
    ///
    /// No range check here: transient out-of-range values are reported by
    /// the validator instead of being rejected.
    pub fn update_share(&mut self, id: PartyId, right: RightType, percentage: f64) -> Result<()> {
        if !percentage.is_finite() {
            return Err(Error::InvalidInput(format!(
                "share for {} must be a number, got {}",
                right, percentage
            )));
        }
        self.party_mut(id)?.shares.set(right, percentage);
        Ok(())
    }

    pub fn set_control(&mut self, id: PartyId, control: ControlStatus) -> Result<()> {
        self.party_mut(id)?.control = control;
        Ok(())
    }

    pub fn party(&self, id: PartyId) -> Option<&InterestedParty> {
        self.parties.iter().find(|p| p.id == id)
    }

    pub fn parties(&self) -> &[InterestedParty] {
        &self.parties
    }

    /// Parties flagged `C`, in ledger order
    pub fn controlled_parties(&self) -> impl Iterator<Item = &InterestedParty> {
        self.parties.iter().filter(|p| p.is_controlled())
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    fn index_of(&self, id: PartyId) -> Result<usize> {
        self.parties
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("interested party {}", id)))
    }

    fn party_mut(&mut self, id: PartyId) -> Result<&mut InterestedParty> {
        let index = self.index_of(id)?;
        Ok(&mut self.parties[index])
    }

    /// Insert or replace a party by id (store boundary only)
    pub(crate) fn upsert(&mut self, party: InterestedParty) {
        match self.parties.iter_mut().find(|p| p.id == party.id) {
            Some(existing) => *existing = party,
            None => self.parties.push(party),
        }
    }
}
