//! Inheritance resolver
//!
//! Computes the effective royalty terms of one schedule work from its
//! contract, its inheritance flags and its overrides.
//!
//! Inherited splits borrow the contract's ledger instead of copying it, so
//! re-resolving after a ledger edit always reflects the current ledger.
//! Nothing is invented: a declined inheritance with no work-level data is
//! reported as undefined or unset, never filled from the contract.

use crate::contract::{Contract, ContractId};
use crate::ledger::{PartyId, PartyLedger};
use crate::rights::RightType;
use crate::schedule::{ScheduleWork, WorkId};
use crate::{Error, Result};
use serde::{Serialize, Serializer};

/// Effective per-right-type splits of a work
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectiveSplits<'a> {
    /// Live view of the contract ledger
    Inherited(&'a PartyLedger),
    /// Work declines contract inheritance and has no splits of its own;
    /// manual entry is required
    Undefined,
}

impl<'a> EffectiveSplits<'a> {
    pub fn is_undefined(&self) -> bool {
        matches!(self, EffectiveSplits::Undefined)
    }

    pub fn ledger(&self) -> Option<&'a PartyLedger> {
        match self {
            EffectiveSplits::Inherited(ledger) => Some(*ledger),
            EffectiveSplits::Undefined => None,
        }
    }

    /// Share of one party for one right type, if splits are defined
    pub fn share(&self, party: PartyId, right: RightType) -> Option<f64> {
        self.ledger()?.party(party).map(|p| p.shares.get(right))
    }
}

impl Serialize for EffectiveSplits<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            EffectiveSplits::Inherited(ledger) => ledger.serialize(serializer),
            EffectiveSplits::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

/// Effective recoupment status of a work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EffectiveRecoupment {
    /// Passed through from the contract
    Inherited { recouped: bool },
    /// Set explicitly on the work
    WorkDefined { recouped: bool },
    /// Inheritance declined and nothing set on the work
    Unset,
}

impl EffectiveRecoupment {
    pub fn recouped(&self) -> Option<bool> {
        match self {
            EffectiveRecoupment::Inherited { recouped }
            | EffectiveRecoupment::WorkDefined { recouped } => Some(*recouped),
            EffectiveRecoupment::Unset => None,
        }
    }
}

/// Where an effective financial value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermSource {
    Contract,
    WorkOverride,
}

/// Effective financial value with its origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectiveAmount {
    pub value: Option<f64>,
    pub source: TermSource,
}

impl EffectiveAmount {
    /// Override wins whenever present, including an explicit zero
    fn resolve(contract_value: Option<f64>, work_override: Option<f64>) -> Self {
        match work_override {
            Some(value) => Self {
                value: Some(value),
                source: TermSource::WorkOverride,
            },
            None => Self {
                value: contract_value,
                source: TermSource::Contract,
            },
        }
    }
}

/// Resolved royalty and financial terms for one work
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveTerms<'a> {
    pub contract_id: ContractId,
    pub work_id: WorkId,
    pub splits: EffectiveSplits<'a>,
    pub recoupment: EffectiveRecoupment,
    /// Contract's `C` parties when controlled status is inherited, else empty
    pub controlled_parties: Vec<PartyId>,
    pub advance: EffectiveAmount,
    pub rate_reduction: EffectiveAmount,
}

/// Resolve effective terms for `work` under `contract`
pub fn resolve_effective_terms<'a>(contract: &'a Contract, work: &ScheduleWork) -> EffectiveTerms<'a> {
    let flags = work.inheritance;

    let splits = if flags.royalty_splits {
        EffectiveSplits::Inherited(&contract.ledger)
    } else {
        EffectiveSplits::Undefined
    };

    let recoupment = if flags.recoupment_status {
        EffectiveRecoupment::Inherited {
            recouped: contract.financials.recouped,
        }
    } else {
        match work.overrides.recouped {
            Some(recouped) => EffectiveRecoupment::WorkDefined { recouped },
            None => EffectiveRecoupment::Unset,
        }
    };

    let controlled_parties = if flags.controlled_status {
        contract.ledger.controlled_parties().map(|p| p.id).collect()
    } else {
        Vec::new()
    };

    EffectiveTerms {
        contract_id: contract.id,
        work_id: work.id,
        splits,
        recoupment,
        controlled_parties,
        advance: EffectiveAmount::resolve(contract.financials.advance, work.overrides.advance),
        rate_reduction: EffectiveAmount::resolve(
            contract.financials.rate_reduction,
            work.overrides.rate_reduction,
        ),
    }
}

/// Resolve effective terms for a work looked up by id in the contract's schedule
pub fn resolve_work(contract: &Contract, work_id: WorkId) -> Result<EffectiveTerms<'_>> {
    let work = contract
        .schedule
        .work(work_id)
        .ok_or_else(|| Error::NotFound(format!("schedule work {} in contract {}", work_id, contract.id)))?;
    Ok(resolve_effective_terms(contract, work))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ContractTerms, FinancialTerms};
    use crate::ledger::{ControlStatus, PartyDraft, PartyType};
    use crate::schedule::{InheritanceFlags, WorkOverrides};

    fn contract_with_ledger() -> (Contract, PartyId, PartyId) {
        let mut contract = Contract::new(
            "Acme Music",
            ContractTerms::Artist {
                royalty_rate_pct: 18.0,
                album_commitment: Some(2),
                exclusivity_months: None,
            },
        );
        contract.financials = FinancialTerms {
            advance: Some(10_000.0),
            rate_reduction: Some(2.5),
            recouped: true,
        };
        let a = contract.ledger.add_party(PartyDraft::new("A", PartyType::Writer));
        let b = contract.ledger.add_party(PartyDraft::new("B", PartyType::Publisher));
        contract.ledger.set_control(a, ControlStatus::Controlled).unwrap();
        contract.ledger.update_share(a, RightType::Mechanical, 60.0).unwrap();
        contract.ledger.update_share(b, RightType::Mechanical, 40.0).unwrap();
        (contract, a, b)
    }

    #[test]
    fn test_full_inheritance() {
        let (contract, a, _) = contract_with_ledger();
        let work = ScheduleWork::new("Song");

        let terms = resolve_effective_terms(&contract, &work);
        assert_eq!(terms.splits.share(a, RightType::Mechanical), Some(60.0));
        assert_eq!(terms.recoupment, EffectiveRecoupment::Inherited { recouped: true });
        assert_eq!(terms.controlled_parties, vec![a]);
        assert_eq!(terms.advance.value, Some(10_000.0));
        assert_eq!(terms.advance.source, TermSource::Contract);
    }

    #[test]
    fn test_splits_undefined_when_inheritance_declined() {
        let (contract, a, _) = contract_with_ledger();
        let work = ScheduleWork::new("Song").with_inheritance(InheritanceFlags::none());

        let terms = resolve_effective_terms(&contract, &work);
        assert!(terms.splits.is_undefined());
        assert_eq!(terms.splits.share(a, RightType::Mechanical), None);
        assert_eq!(terms.recoupment, EffectiveRecoupment::Unset);
        assert!(terms.controlled_parties.is_empty());

        let json = serde_json::to_value(&terms).unwrap();
        assert_eq!(json["splits"], "undefined");
    }

    #[test]
    fn test_inherited_splits_follow_ledger_edits() {
        let (mut contract, a, b) = contract_with_ledger();
        let work_id = contract.schedule.add_work(ScheduleWork::new("Song"));

        {
            let terms = resolve_work(&contract, work_id).unwrap();
            assert_eq!(terms.splits.share(a, RightType::Mechanical), Some(60.0));
        }

        contract.ledger.update_share(a, RightType::Mechanical, 75.0).unwrap();
        contract.ledger.update_share(b, RightType::Mechanical, 25.0).unwrap();

        let terms = resolve_work(&contract, work_id).unwrap();
        assert_eq!(terms.splits.share(a, RightType::Mechanical), Some(75.0));
        assert_eq!(terms.splits.share(b, RightType::Mechanical), Some(25.0));
    }

    #[test]
    fn test_zero_override_distinct_from_absent() {
        let (contract, _, _) = contract_with_ledger();

        let zeroed = ScheduleWork::new("Zeroed").with_overrides(WorkOverrides {
            advance: Some(0.0),
            rate_reduction: Some(0.0),
            recouped: None,
        });
        let terms = resolve_effective_terms(&contract, &zeroed);
        assert_eq!(terms.advance.value, Some(0.0));
        assert_eq!(terms.advance.source, TermSource::WorkOverride);
        assert_eq!(terms.rate_reduction.value, Some(0.0));

        let unset = ScheduleWork::new("Unset");
        let terms = resolve_effective_terms(&contract, &unset);
        assert_eq!(terms.advance.value, Some(10_000.0));
        assert_eq!(terms.rate_reduction.value, Some(2.5));
        assert_eq!(terms.rate_reduction.source, TermSource::Contract);
    }

    #[test]
    fn test_nonzero_override_replaces_contract_value() {
        let (contract, _, _) = contract_with_ledger();
        let work = ScheduleWork::new("Song").with_overrides(WorkOverrides {
            advance: Some(2_500.0),
            ..WorkOverrides::default()
        });
        let terms = resolve_effective_terms(&contract, &work);
        assert_eq!(terms.advance.value, Some(2_500.0));
        assert_eq!(terms.rate_reduction.source, TermSource::Contract);
    }

    #[test]
    fn test_work_defined_recoupment() {
        let (contract, _, _) = contract_with_ledger();
        let mut flags = InheritanceFlags::all();
        flags.recoupment_status = false;
        let work = ScheduleWork::new("Song")
            .with_inheritance(flags)
            .with_overrides(WorkOverrides {
                recouped: Some(false),
                ..WorkOverrides::default()
            });

        let terms = resolve_effective_terms(&contract, &work);
        assert_eq!(terms.recoupment, EffectiveRecoupment::WorkDefined { recouped: false });
        assert_eq!(terms.recoupment.recouped(), Some(false));
    }

    #[test]
    fn test_resolve_unknown_work() {
        let (contract, _, _) = contract_with_ledger();
        assert!(matches!(resolve_work(&contract, WorkId::new()), Err(Error::NotFound(_))));
    }
}
