//! Contract store
//!
//! Narrow persistence contract the ledger core reads and writes through.
//! Failures are returned unchanged; stores do not retry. One mutation per
//! entity is assumed to be in flight at a time.

use crate::contract::{Contract, ContractId, ContractStatus, ContractType};
use crate::ledger::{InterestedParty, PartyId};
use crate::registration::RegistrationRecord;
use crate::schedule::{ScheduleWork, WorkId};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One line of a contract listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSummary {
    pub id: ContractId,
    pub counterparty: String,
    pub status: ContractStatus,
    pub contract_type: ContractType,
    pub party_count: usize,
    pub work_count: usize,
}

impl ContractSummary {
    pub fn of(contract: &Contract) -> Self {
        Self {
            id: contract.id,
            counterparty: contract.counterparty.clone(),
            status: contract.status,
            contract_type: contract.contract_type(),
            party_count: contract.ledger.len(),
            work_count: contract.schedule.len(),
        }
    }
}

/// Persistence collaborator for contracts, parties, works and registrations
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Load a contract including its party ledger and work schedule
    async fn load_contract(&self, id: ContractId) -> Result<Contract>;

    async fn list_contracts(&self) -> Result<Vec<ContractSummary>>;

    /// Insert or replace a contract with its full ledger and schedule
    async fn save_contract(&self, contract: &Contract) -> Result<()>;

    async fn save_party(&self, contract_id: ContractId, party: &InterestedParty) -> Result<()>;

    async fn delete_party(&self, party_id: PartyId) -> Result<()>;

    async fn save_schedule_work(&self, contract_id: ContractId, work: &ScheduleWork) -> Result<()>;

    async fn delete_schedule_work(&self, work_id: WorkId) -> Result<()>;

    /// Insert or replace the record for `record.body` on one work
    async fn save_registration(&self, work_id: WorkId, record: &RegistrationRecord) -> Result<()>;
}

/// In-memory store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    contracts: RwLock<HashMap<ContractId, Contract>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContractStore for MemoryStore {
    async fn load_contract(&self, id: ContractId) -> Result<Contract> {
        self.contracts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("contract {}", id)))
    }

    async fn list_contracts(&self) -> Result<Vec<ContractSummary>> {
        let contracts = self.contracts.read().await;
        let mut summaries: Vec<_> = contracts.values().map(ContractSummary::of).collect();
        summaries.sort_by(|a, b| a.counterparty.cmp(&b.counterparty).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    async fn save_contract(&self, contract: &Contract) -> Result<()> {
        let now = Utc::now();
        let mut stored = contract.clone();
        stored.created_at.get_or_insert(now);
        stored.updated_at = Some(now);

        let mut contracts = self.contracts.write().await;
        for party in contract.ledger.parties() {
            check_party_owner(&contracts, contract.id, party.id)?;
        }
        for work in contract.schedule.works() {
            check_work_owner(&contracts, contract.id, work.id)?;
        }
        contracts.insert(stored.id, stored);
        Ok(())
    }

    async fn save_party(&self, contract_id: ContractId, party: &InterestedParty) -> Result<()> {
        let mut contracts = self.contracts.write().await;
        check_party_owner(&contracts, contract_id, party.id)?;
        let contract = contracts
            .get_mut(&contract_id)
            .ok_or_else(|| Error::NotFound(format!("contract {}", contract_id)))?;
        contract.ledger.upsert(party.clone());
        contract.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_party(&self, party_id: PartyId) -> Result<()> {
        let mut contracts = self.contracts.write().await;
        for contract in contracts.values_mut() {
            if contract.ledger.party(party_id).is_some() {
                contract.ledger.remove_party(party_id)?;
                contract.updated_at = Some(Utc::now());
                return Ok(());
            }
        }
        Err(Error::NotFound(format!("interested party {}", party_id)))
    }

    async fn save_schedule_work(&self, contract_id: ContractId, work: &ScheduleWork) -> Result<()> {
        let mut contracts = self.contracts.write().await;
        check_work_owner(&contracts, contract_id, work.id)?;
        let contract = contracts
            .get_mut(&contract_id)
            .ok_or_else(|| Error::NotFound(format!("contract {}", contract_id)))?;
        contract.schedule.add_work(work.clone());
        contract.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_schedule_work(&self, work_id: WorkId) -> Result<()> {
        let mut contracts = self.contracts.write().await;
        for contract in contracts.values_mut() {
            if contract.schedule.work(work_id).is_some() {
                contract.schedule.remove_work(work_id)?;
                contract.updated_at = Some(Utc::now());
                return Ok(());
            }
        }
        Err(Error::NotFound(format!("schedule work {}", work_id)))
    }

    async fn save_registration(&self, work_id: WorkId, record: &RegistrationRecord) -> Result<()> {
        let mut contracts = self.contracts.write().await;
        for contract in contracts.values_mut() {
            if let Ok(work) = contract.schedule.work_mut(work_id) {
                match work
                    .registrations
                    .iter_mut()
                    .find(|r| r.body.eq_ignore_ascii_case(&record.body))
                {
                    Some(existing) => *existing = record.clone(),
                    None => work.registrations.push(record.clone()),
                }
                return Ok(());
            }
        }
        Err(Error::NotFound(format!("schedule work {}", work_id)))
    }
}

/// A party belongs to exactly one contract
fn check_party_owner(
    contracts: &HashMap<ContractId, Contract>,
    contract_id: ContractId,
    party_id: PartyId,
) -> Result<()> {
    match contracts
        .values()
        .find(|c| c.id != contract_id && c.ledger.party(party_id).is_some())
    {
        Some(owner) => Err(Error::InvalidInput(format!(
            "interested party {} belongs to contract {}",
            party_id, owner.id
        ))),
        None => Ok(()),
    }
}

/// A work is scheduled under exactly one contract
fn check_work_owner(
    contracts: &HashMap<ContractId, Contract>,
    contract_id: ContractId,
    work_id: WorkId,
) -> Result<()> {
    match contracts
        .values()
        .find(|c| c.id != contract_id && c.schedule.work(work_id).is_some())
    {
        Some(owner) => Err(Error::InvalidInput(format!(
            "schedule work {} belongs to contract {}",
            work_id, owner.id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractTerms;
    use crate::ledger::{PartyDraft, PartyType};

    fn contract() -> Contract {
        Contract::new(
            "Acme Music",
            ContractTerms::Producer {
                producer_points: 4.0,
                per_track_fee: None,
            },
        )
    }

    #[tokio::test]
    async fn test_save_and_load_contract() {
        let store = MemoryStore::new();
        let contract = contract();
        store.save_contract(&contract).await.unwrap();

        let loaded = store.load_contract(contract.id).await.unwrap();
        assert_eq!(loaded.counterparty, "Acme Music");
        assert!(loaded.created_at.is_some());
        assert!(loaded.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_load_missing_contract() {
        let store = MemoryStore::new();
        let result = store.load_contract(ContractId::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_party_round_trip() {
        let store = MemoryStore::new();
        let mut contract = contract();
        let party_id = contract.ledger.add_party(PartyDraft::new("A", PartyType::Producer));
        store.save_contract(&contract).await.unwrap();

        let mut party = contract.ledger.party(party_id).unwrap().clone();
        party.name = "A (renamed)".into();
        store.save_party(contract.id, &party).await.unwrap();
        let loaded = store.load_contract(contract.id).await.unwrap();
        assert_eq!(loaded.ledger.len(), 1);
        assert_eq!(loaded.ledger.party(party_id).unwrap().name, "A (renamed)");

        store.delete_party(party_id).await.unwrap();
        assert!(store.load_contract(contract.id).await.unwrap().ledger.is_empty());
        assert!(matches!(store.delete_party(party_id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_registration_replaced_per_body() {
        let store = MemoryStore::new();
        let mut contract = contract();
        let work_id = contract.schedule.add_work(ScheduleWork::new("Song"));
        store.save_contract(&contract).await.unwrap();

        let mut record = RegistrationRecord::new("ASCAP", "US");
        store.save_registration(work_id, &record).await.unwrap();
        record.work_number = Some("W-1".into());
        store.save_registration(work_id, &record).await.unwrap();

        let loaded = store.load_contract(contract.id).await.unwrap();
        let work = loaded.schedule.work(work_id).unwrap();
        assert_eq!(work.registrations.len(), 1);
        assert_eq!(work.registrations[0].work_number.as_deref(), Some("W-1"));
    }

    #[tokio::test]
    async fn test_party_and_work_cannot_move_between_contracts() {
        let store = MemoryStore::new();
        let mut owner = contract();
        let party_id = owner.ledger.add_party(PartyDraft::new("A", PartyType::Producer));
        let work_id = owner.schedule.add_work(ScheduleWork::new("Song"));
        store.save_contract(&owner).await.unwrap();
        let other = contract();
        store.save_contract(&other).await.unwrap();

        let party = owner.ledger.party(party_id).unwrap().clone();
        assert!(matches!(
            store.save_party(other.id, &party).await,
            Err(Error::InvalidInput(_))
        ));
        let work = owner.schedule.work(work_id).unwrap().clone();
        assert!(matches!(
            store.save_schedule_work(other.id, &work).await,
            Err(Error::InvalidInput(_))
        ));

        let mut copy = other.clone();
        copy.ledger.upsert(party);
        assert!(matches!(
            store.save_contract(&copy).await,
            Err(Error::InvalidInput(_))
        ));

        let other = store.load_contract(other.id).await.unwrap();
        assert!(other.ledger.is_empty());
        assert!(other.schedule.is_empty());
        assert_eq!(store.load_contract(owner.id).await.unwrap().ledger.len(), 1);
    }
}
