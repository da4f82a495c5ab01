//! Registration export
//!
//! Builds the per-work record handed to a registration-file generator.
//! Undefined splits are a hard stop: the exporter never fills them with
//! zeros.

use crate::contract::ContractId;
use crate::ledger::{ControlStatus, PartyId, PartyType};
use crate::resolver::{resolve_work, EffectiveTerms};
use crate::rights::ShareSet;
use crate::schedule::{WorkId, WorkWriter};
use crate::{Contract, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One interested-party line of an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportParty {
    pub party_id: PartyId,
    pub name: String,
    pub party_type: PartyType,
    /// `None` when the work does not inherit controlled status; the
    /// exporter must then collect it manually
    pub control: Option<ControlStatus>,
    pub shares: ShareSet,
}

/// Registration record for one scheduled work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationExport {
    pub contract_id: ContractId,
    pub work_id: WorkId,
    pub title: String,
    pub iswc: Option<String>,
    pub isrc: Option<String>,
    pub territories: Vec<String>,
    pub parties: Vec<ExportParty>,
    pub writers: Vec<WorkWriter>,
    pub advance: Option<f64>,
    pub rate_reduction: Option<f64>,
    pub finalized: bool,
}

/// Build the export record for `work_id`
///
/// Fails with [`Error::ManualEntryRequired`] when the work declines split
/// inheritance.
pub fn registration_export(contract: &Contract, work_id: WorkId) -> Result<RegistrationExport> {
    let terms = resolve_work(contract, work_id)?;
    build_export(contract, &terms)
}

fn build_export(contract: &Contract, terms: &EffectiveTerms<'_>) -> Result<RegistrationExport> {
    let work = contract
        .schedule
        .work(terms.work_id)
        .ok_or_else(|| Error::NotFound(format!("schedule work {}", terms.work_id)))?;

    let ledger = terms.splits.ledger().ok_or_else(|| {
        Error::ManualEntryRequired(format!(
            "work {:?} ({}) declines contract splits and has none of its own",
            work.title, work.id
        ))
    })?;

    if !work.finalized {
        warn!("Exporting work {} before it was finalized", work.id);
    }

    let control_inherited = work.inheritance.controlled_status;
    let parties = ledger
        .parties()
        .iter()
        .map(|p| ExportParty {
            party_id: p.id,
            name: p.name.clone(),
            party_type: p.party_type,
            control: if !control_inherited {
                None
            } else if terms.controlled_parties.contains(&p.id) {
                Some(ControlStatus::Controlled)
            } else {
                Some(ControlStatus::NonControlled)
            },
            shares: p.shares,
        })
        .collect();

    Ok(RegistrationExport {
        contract_id: contract.id,
        work_id: work.id,
        title: work.title.clone(),
        iswc: work.external_ids.iswc.clone(),
        isrc: work.external_ids.isrc.clone(),
        territories: contract.territories.iter().cloned().collect(),
        parties,
        writers: work.writers.clone(),
        advance: terms.advance.value,
        rate_reduction: terms.rate_reduction.value,
        finalized: work.finalized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractTerms;
    use crate::ledger::PartyDraft;
    use crate::rights::RightType;
    use crate::schedule::{InheritanceFlags, ScheduleWork};

    fn contract() -> (Contract, PartyId) {
        let mut contract = Contract::new(
            "Acme Music",
            ContractTerms::Sync {
                license_fee: 1200.0,
                media: vec!["film".into()],
                exclusivity_window_days: Some(90),
            },
        );
        contract.territories.insert("US".into());
        let a = contract.ledger.add_party(PartyDraft::new("A", PartyType::Writer));
        contract.ledger.set_control(a, ControlStatus::Controlled).unwrap();
        contract.ledger.update_share(a, RightType::Synch, 100.0).unwrap();
        (contract, a)
    }

    #[test]
    fn test_export_inherited_work() {
        let (mut contract, a) = contract();
        let work_id = contract.schedule.add_work(ScheduleWork::new("Cue 1"));

        let export = registration_export(&contract, work_id).unwrap();
        assert_eq!(export.parties.len(), 1);
        assert_eq!(export.parties[0].party_id, a);
        assert_eq!(export.parties[0].control, Some(ControlStatus::Controlled));
        assert_eq!(export.parties[0].shares.synch, 100.0);
        assert_eq!(export.territories, vec!["US".to_string()]);
    }

    #[test]
    fn test_export_stops_on_undefined_splits() {
        let (mut contract, _) = contract();
        let work_id = contract
            .schedule
            .add_work(ScheduleWork::new("Cue 2").with_inheritance(InheritanceFlags::none()));

        let result = registration_export(&contract, work_id);
        assert!(matches!(result, Err(Error::ManualEntryRequired(_))));
    }

    #[test]
    fn test_export_leaves_control_unset_when_not_inherited() {
        let (mut contract, a) = contract();
        let b = contract.ledger.add_party(PartyDraft::new("B", PartyType::Publisher));
        let mut flags = InheritanceFlags::all();
        flags.controlled_status = false;
        let work_id = contract
            .schedule
            .add_work(ScheduleWork::new("Cue 3").with_inheritance(flags));

        let export = registration_export(&contract, work_id).unwrap();
        assert_eq!(contract.ledger.party(a).unwrap().control, ControlStatus::Controlled);
        assert_eq!(export.parties.len(), 2);
        assert!(export.parties.iter().all(|p| p.control.is_none()));
        assert!(export.parties.iter().any(|p| p.party_id == b));

        let json = serde_json::to_value(&export).unwrap();
        assert!(json["parties"][0]["control"].is_null());
    }

    #[test]
    fn test_export_marks_uncontrolled_parties_when_inherited() {
        let (mut contract, _) = contract();
        let b = contract.ledger.add_party(PartyDraft::new("B", PartyType::Publisher));
        let work_id = contract.schedule.add_work(ScheduleWork::new("Cue 4"));

        let export = registration_export(&contract, work_id).unwrap();
        let party_b = export.parties.iter().find(|p| p.party_id == b).unwrap();
        assert_eq!(party_b.control, Some(ControlStatus::NonControlled));
    }
}
