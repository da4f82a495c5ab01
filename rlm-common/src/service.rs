//! Ledger service
//!
//! Caller-side orchestration of the pure core: load from the store, apply
//! the mutation, persist it, revalidate, and broadcast the fresh report.
//! The core itself never revalidates on its own.

use crate::contract::{Contract, ContractId, ContractStatus};
use crate::events::{EventBus, LedgerEvent};
use crate::export::{registration_export, RegistrationExport};
use crate::ledger::{ControlStatus, PartyDraft, PartyId};
use crate::registration::{record_for_body, RegistrationRecord, RegistrationStatus, TransitionTrigger};
use crate::rights::RightType;
use crate::schedule::{ScheduleWork, WorkId};
use crate::store::{ContractStore, ContractSummary};
use crate::validator::{SplitValidator, ValidationReport};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Store-backed ledger operations with revalidation and events
pub struct LedgerService<S: ContractStore> {
    store: Arc<S>,
    events: EventBus,
    validator: SplitValidator,
}

impl<S: ContractStore> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            validator: self.validator,
        }
    }
}

impl<S: ContractStore> LedgerService<S> {
    pub fn new(store: Arc<S>, events: EventBus, validator: SplitValidator) -> Self {
        Self {
            store,
            events,
            validator,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn load_contract(&self, id: ContractId) -> Result<Contract> {
        self.store.load_contract(id).await
    }

    pub async fn list_contracts(&self) -> Result<Vec<ContractSummary>> {
        self.store.list_contracts().await
    }

    /// Save a new or edited contract (drafts are never blocked)
    pub async fn save_contract(&self, contract: &Contract) -> Result<ValidationReport> {
        contract.check_dates()?;
        self.store.save_contract(contract).await?;
        info!("Saved contract {} ({})", contract.id, contract.counterparty);
        Ok(self.revalidated(contract))
    }

    pub async fn add_party(
        &self,
        contract_id: ContractId,
        draft: PartyDraft,
    ) -> Result<(PartyId, ValidationReport)> {
        let mut contract = self.store.load_contract(contract_id).await?;
        let party_id = contract.ledger.add_party(draft);
        let party = contract
            .ledger
            .party(party_id)
            .ok_or_else(|| Error::Internal(format!("party {} missing after add", party_id)))?;
        self.store.save_party(contract_id, party).await?;

        self.events.emit_lossy(LedgerEvent::PartyAdded {
            contract_id,
            party_id,
            timestamp: Utc::now(),
        });
        Ok((party_id, self.revalidated(&contract)))
    }

    /// Remove a party and revalidate the remaining ledger
    pub async fn remove_party(
        &self,
        contract_id: ContractId,
        party_id: PartyId,
    ) -> Result<ValidationReport> {
        let mut contract = self.store.load_contract(contract_id).await?;
        contract.ledger.remove_party(party_id)?;
        self.store.delete_party(party_id).await?;

        self.events.emit_lossy(LedgerEvent::PartyRemoved {
            contract_id,
            party_id,
            timestamp: Utc::now(),
        });
        Ok(self.revalidated(&contract))
    }

    pub async fn update_share(
        &self,
        contract_id: ContractId,
        party_id: PartyId,
        right: RightType,
        percentage: f64,
    ) -> Result<ValidationReport> {
        let mut contract = self.store.load_contract(contract_id).await?;
        contract.ledger.update_share(party_id, right, percentage)?;
        self.save_party_of(&contract, party_id).await?;

        self.events.emit_lossy(LedgerEvent::ShareUpdated {
            contract_id,
            party_id,
            right_type: right,
            percentage,
            timestamp: Utc::now(),
        });
        Ok(self.revalidated(&contract))
    }

    pub async fn set_control(
        &self,
        contract_id: ContractId,
        party_id: PartyId,
        control: ControlStatus,
    ) -> Result<ValidationReport> {
        let mut contract = self.store.load_contract(contract_id).await?;
        contract.ledger.set_control(party_id, control)?;
        self.save_party_of(&contract, party_id).await?;
        Ok(self.revalidated(&contract))
    }

    /// Validate the stored ledger without mutating it
    pub async fn validate(&self, contract_id: ContractId) -> Result<ValidationReport> {
        let contract = self.store.load_contract(contract_id).await?;
        Ok(self.validator.validate(&contract.ledger))
    }

    pub async fn set_contract_status(
        &self,
        contract_id: ContractId,
        next: ContractStatus,
    ) -> Result<ValidationReport> {
        let mut contract = self.store.load_contract(contract_id).await?;
        let previous = contract.status;
        let report = contract.set_status(next, &self.validator)?;
        if previous != next {
            self.store.save_contract(&contract).await?;
            self.events.emit_lossy(LedgerEvent::ContractStatusChanged {
                contract_id,
                old_status: previous,
                new_status: next,
                timestamp: Utc::now(),
            });
        }
        Ok(report)
    }

    pub async fn schedule_work(&self, contract_id: ContractId, work: ScheduleWork) -> Result<WorkId> {
        // Existence check so a work is never attached to an unknown contract
        self.store.load_contract(contract_id).await?;
        let work_id = work.id;
        self.store.save_schedule_work(contract_id, &work).await?;
        debug!("Scheduled work {} under contract {}", work_id, contract_id);

        self.events.emit_lossy(LedgerEvent::WorkScheduled {
            contract_id,
            work_id,
            timestamp: Utc::now(),
        });
        Ok(work_id)
    }

    pub async fn remove_work(&self, contract_id: ContractId, work_id: WorkId) -> Result<()> {
        let contract = self.store.load_contract(contract_id).await?;
        if contract.schedule.work(work_id).is_none() {
            return Err(Error::NotFound(format!(
                "schedule work {} in contract {}",
                work_id, contract_id
            )));
        }
        self.store.delete_schedule_work(work_id).await?;

        self.events.emit_lossy(LedgerEvent::WorkRemoved {
            contract_id,
            work_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Finalize a work; blocked unless writer shares total exactly 100
    pub async fn finalize_work(
        &self,
        contract_id: ContractId,
        work_id: WorkId,
    ) -> Result<ValidationReport> {
        let mut contract = self.store.load_contract(contract_id).await?;
        let report = contract
            .schedule
            .finalize_work(work_id, &contract.ledger, &self.validator)?;
        if let Some(work) = contract.schedule.work(work_id) {
            self.store.save_schedule_work(contract_id, work).await?;
        }

        self.events.emit_lossy(LedgerEvent::WorkFinalized {
            contract_id,
            work_id,
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    pub async fn export_work(
        &self,
        contract_id: ContractId,
        work_id: WorkId,
    ) -> Result<RegistrationExport> {
        let contract = self.store.load_contract(contract_id).await?;
        registration_export(&contract, work_id)
    }

    /// Change the registration status of one work with one collecting body
    pub async fn transition_registration(
        &self,
        contract_id: ContractId,
        work_id: WorkId,
        body: &str,
        territory: &str,
        next: RegistrationStatus,
        trigger: TransitionTrigger,
    ) -> Result<RegistrationRecord> {
        let mut contract = self.store.load_contract(contract_id).await?;
        let work = contract.schedule.work_mut(work_id)?;
        let record = record_for_body(&mut work.registrations, body, territory);
        let previous = record.transition(next, trigger)?;
        let record = record.clone();
        self.store.save_registration(work_id, &record).await?;

        info!(
            "Registration of work {} with {}: {} -> {} ({:?})",
            work_id, record.body, previous, next, trigger
        );
        self.events.emit_lossy(LedgerEvent::RegistrationStatusChanged {
            contract_id,
            work_id,
            body: record.body.clone(),
            old_status: previous,
            new_status: next,
            trigger,
            timestamp: Utc::now(),
        });
        Ok(record)
    }

    async fn save_party_of(&self, contract: &Contract, party_id: PartyId) -> Result<()> {
        let party = contract
            .ledger
            .party(party_id)
            .ok_or_else(|| Error::NotFound(format!("interested party {}", party_id)))?;
        self.store.save_party(contract.id, party).await
    }

    fn revalidated(&self, contract: &Contract) -> ValidationReport {
        let report = self.validator.validate(&contract.ledger);
        self.events.emit_lossy(LedgerEvent::LedgerRevalidated {
            contract_id: contract.id,
            report: report.clone(),
            timestamp: Utc::now(),
        });
        report
    }
}
