//! Split validator
//!
//! Turns a party ledger snapshot into a diagnostic report. Validation never
//! fails: contracts are edited incrementally and pass through unbalanced
//! states, so inconsistencies are reported with a severity and callers
//! decide what to block.
//!
//! # Checks
//! 1. **Right-type balance**: per right type, the sum across all parties
//!    should be 100. Over 100 is an error, under 100 a warning.
//! 2. **Controlled share**: per controlled party, the largest share across
//!    right types; summed over controlled parties it must not exceed 100.
//! 3. **Writer share**: when a work's writer records are supplied, their
//!    shares must add up to exactly 100 before the work can be finalized.
//! 4. **Share range**: any stored percentage outside [0, 100] is an error.

use crate::error::GateViolation;
use crate::ledger::{PartyId, PartyLedger};
use crate::rights::RightType;
use crate::schedule::WorkWriter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Whole share, in percent
pub const FULL_SHARE: f64 = 100.0;

/// Default tolerance when comparing float totals against 100
pub const DEFAULT_SHARE_TOLERANCE: f64 = 1e-6;

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory; never blocks a save
    Warning,
    /// Blocks the action gated on it (finalize, activate)
    Error,
}

/// Right type whose total across parties is not 100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RightTypeImbalance {
    pub right_type: RightType,
    pub total: f64,
    /// `total - 100`; positive when over-allocated
    pub delta: f64,
    pub severity: Severity,
}

/// Stored percentage outside [0, 100]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfRangeShare {
    pub party_id: PartyId,
    pub right_type: RightType,
    pub percentage: f64,
}

/// Overall classification of a ledger snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBalance {
    Valid,
    OverAllocated,
    UnderAllocated,
}

/// Structured validation report
///
/// Consumers render severity themselves; the report carries numbers, not
/// messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub per_right_type_total: BTreeMap<RightType, f64>,
    pub imbalanced_types: Vec<RightTypeImbalance>,
    pub out_of_range: Vec<OutOfRangeShare>,
    pub controlled_total: f64,
    pub controlled_over_limit: bool,
    /// `None` when the report was produced without writer records
    pub writer_share_total: Option<f64>,
    pub writer_share_exact: bool,
}

impl ValidationReport {
    /// Any error-severity finding (including an out-of-range share)
    /// classifies the snapshot as over-allocated
    pub fn classification(&self) -> LedgerBalance {
        let over = self.controlled_over_limit
            || !self.out_of_range.is_empty()
            || self
                .imbalanced_types
                .iter()
                .any(|i| i.severity == Severity::Error);
        if over {
            LedgerBalance::OverAllocated
        } else if self.imbalanced_types.is_empty() {
            LedgerBalance::Valid
        } else {
            LedgerBalance::UnderAllocated
        }
    }

    pub fn has_errors(&self) -> bool {
        self.controlled_over_limit
            || !self.out_of_range.is_empty()
            || self
                .imbalanced_types
                .iter()
                .any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.imbalanced_types
            .iter()
            .any(|i| i.severity == Severity::Warning)
    }

    pub fn is_balanced(&self, right: RightType) -> bool {
        !self.imbalanced_types.iter().any(|i| i.right_type == right)
    }

    /// Gate for marking a contract active
    ///
    /// Only the controlled-share limit blocks activation. Right-type
    /// imbalance stays a warning.
    pub fn check_activation(&self) -> Result<(), GateViolation> {
        self.check_controlled_limit()
    }

    /// Gate for finalizing a schedule work
    ///
    /// Requires a report built with writer records.
    pub fn check_finalize_work(&self) -> Result<(), GateViolation> {
        self.check_controlled_limit()?;
        if !self.writer_share_exact {
            let total = self.writer_share_total.unwrap_or(0.0);
            return Err(GateViolation::WriterShareNotExact {
                total,
                delta: total - FULL_SHARE,
            });
        }
        Ok(())
    }

    fn check_controlled_limit(&self) -> Result<(), GateViolation> {
        if self.controlled_over_limit {
            return Err(GateViolation::ControlledShareExceeded {
                total: self.controlled_total,
                excess: self.controlled_total - FULL_SHARE,
            });
        }
        Ok(())
    }
}

/// Administrative share held by controlled parties
///
/// Per controlled party, the maximum of its percentages across right types;
/// summed over all controlled parties.
pub fn controlled_share(ledger: &PartyLedger) -> f64 {
    ledger
        .controlled_parties()
        .map(|party| party.shares.max_share())
        .sum()
}

/// Split validator with a configurable comparison tolerance
#[derive(Debug, Clone, Copy)]
pub struct SplitValidator {
    tolerance: f64,
}

impl Default for SplitValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitValidator {
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_SHARE_TOLERANCE,
        }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    /// Validate a ledger snapshot without writer records
    pub fn validate(&self, ledger: &PartyLedger) -> ValidationReport {
        self.build_report(ledger, None)
    }

    /// Validate a ledger snapshot together with one work's writer records
    pub fn validate_with_writers(
        &self,
        ledger: &PartyLedger,
        writers: &[WorkWriter],
    ) -> ValidationReport {
        self.build_report(ledger, Some(writers))
    }

    fn build_report(&self, ledger: &PartyLedger, writers: Option<&[WorkWriter]>) -> ValidationReport {
        let mut per_right_type_total = BTreeMap::new();
        let mut imbalanced_types = Vec::new();

        for right in RightType::all_variants() {
            let total: f64 = ledger.parties().iter().map(|p| p.shares.get(*right)).sum();
            per_right_type_total.insert(*right, total);

            let delta = total - FULL_SHARE;
            if delta.abs() > self.tolerance {
                let severity = if delta > 0.0 {
                    Severity::Error
                } else {
                    Severity::Warning
                };
                imbalanced_types.push(RightTypeImbalance {
                    right_type: *right,
                    total,
                    delta,
                    severity,
                });
            }
        }

        let out_of_range = ledger
            .parties()
            .iter()
            .flat_map(|party| {
                party
                    .shares
                    .iter()
                    .filter(|(_, pct)| *pct < 0.0 || *pct > FULL_SHARE)
                    .map(move |(right_type, percentage)| OutOfRangeShare {
                        party_id: party.id,
                        right_type,
                        percentage,
                    })
            })
            .collect();

        let controlled_total = controlled_share(ledger);
        let controlled_over_limit = controlled_total > FULL_SHARE + self.tolerance;

        let writer_share_total = writers.map(|w| w.iter().map(|writer| writer.share).sum::<f64>());
        let writer_share_exact = writer_share_total
            .map(|total| (total - FULL_SHARE).abs() <= self.tolerance)
            .unwrap_or(false);

        let report = ValidationReport {
            per_right_type_total,
            imbalanced_types,
            out_of_range,
            controlled_total,
            controlled_over_limit,
            writer_share_total,
            writer_share_exact,
        };

        debug!(
            parties = ledger.len(),
            imbalanced = report.imbalanced_types.len(),
            controlled_total = report.controlled_total,
            "Ledger validated"
        );

        report
    }
}

/// Revalidate a ledger snapshot with the default tolerance
///
/// Pure function; callers invoke it after every add/remove/update.
pub fn revalidate(ledger: &PartyLedger) -> ValidationReport {
    SplitValidator::new().validate(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ControlStatus, PartyDraft, PartyType};

    fn party(
        ledger: &mut PartyLedger,
        name: &str,
        control: ControlStatus,
        mechanical: f64,
        performance: f64,
    ) -> PartyId {
        let id = ledger.add_party(PartyDraft::new(name, PartyType::Writer));
        ledger.set_control(id, control).unwrap();
        ledger.update_share(id, RightType::Mechanical, mechanical).unwrap();
        ledger.update_share(id, RightType::Performance, performance).unwrap();
        id
    }

    fn fully_balanced(ledger: &mut PartyLedger) {
        for p in ledger.parties().iter().map(|p| p.id).collect::<Vec<_>>() {
            for right in [RightType::Print, RightType::Synch, RightType::GrandRights, RightType::Karaoke] {
                ledger.update_share(p, right, 50.0).unwrap();
            }
        }
    }

    #[test]
    fn test_controlled_one_of_two_parties() {
        let mut ledger = PartyLedger::new();
        party(&mut ledger, "A", ControlStatus::Controlled, 60.0, 50.0);
        party(&mut ledger, "B", ControlStatus::NonControlled, 40.0, 50.0);

        let report = revalidate(&ledger);
        assert_eq!(report.per_right_type_total[&RightType::Mechanical], 100.0);
        assert_eq!(report.per_right_type_total[&RightType::Performance], 100.0);
        assert!(report.is_balanced(RightType::Mechanical));
        assert!(report.is_balanced(RightType::Performance));
        assert_eq!(report.controlled_total, 60.0);
        assert!(!report.controlled_over_limit);
    }

    #[test]
    fn test_controlled_total_over_limit() {
        let mut ledger = PartyLedger::new();
        party(&mut ledger, "A", ControlStatus::Controlled, 70.0, 70.0);
        party(&mut ledger, "B", ControlStatus::Controlled, 40.0, 40.0);

        let report = revalidate(&ledger);
        assert!((report.controlled_total - 110.0).abs() < 1e-9);
        assert!(report.controlled_over_limit);
        assert_eq!(report.classification(), LedgerBalance::OverAllocated);

        let violation = report.check_activation().unwrap_err();
        assert!(matches!(
            violation,
            GateViolation::ControlledShareExceeded { excess, .. } if (excess - 10.0).abs() < 1e-9
        ));
    }

    #[test]
    fn test_controlled_share_is_max_not_sum() {
        let mut ledger = PartyLedger::new();
        let a = party(&mut ledger, "A", ControlStatus::Controlled, 30.0, 80.0);
        ledger.update_share(a, RightType::Print, 10.0).unwrap();

        assert_eq!(controlled_share(&ledger), 80.0);
    }

    #[test]
    fn test_balanced_ledger_has_no_imbalance() {
        let mut ledger = PartyLedger::new();
        party(&mut ledger, "A", ControlStatus::Controlled, 50.0, 50.0);
        party(&mut ledger, "B", ControlStatus::NonControlled, 50.0, 50.0);
        fully_balanced(&mut ledger);

        let report = revalidate(&ledger);
        assert!(report.imbalanced_types.is_empty());
        assert!(report.out_of_range.is_empty());
        assert_eq!(report.classification(), LedgerBalance::Valid);
        assert!(!report.has_errors());
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_under_and_over_allocation_severity() {
        let mut ledger = PartyLedger::new();
        party(&mut ledger, "A", ControlStatus::NonControlled, 80.0, 30.0);
        party(&mut ledger, "B", ControlStatus::NonControlled, 40.0, 30.0);

        let report = revalidate(&ledger);
        let mech = report
            .imbalanced_types
            .iter()
            .find(|i| i.right_type == RightType::Mechanical)
            .unwrap();
        assert_eq!(mech.severity, Severity::Error);
        assert!((mech.delta - 20.0).abs() < 1e-9);

        let perf = report
            .imbalanced_types
            .iter()
            .find(|i| i.right_type == RightType::Performance)
            .unwrap();
        assert_eq!(perf.severity, Severity::Warning);
        assert!((perf.delta + 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_thirds_balance_within_tolerance() {
        let mut ledger = PartyLedger::new();
        for name in ["A", "B", "C"] {
            let id = ledger.add_party(PartyDraft::new(name, PartyType::Writer));
            for right in RightType::all_variants() {
                ledger.update_share(id, *right, 100.0 / 3.0).unwrap();
            }
        }
        let report = revalidate(&ledger);
        assert!(report.imbalanced_types.is_empty(), "{:?}", report.imbalanced_types);
    }

    #[test]
    fn test_out_of_range_share_reported() {
        let mut ledger = PartyLedger::new();
        let a = party(&mut ledger, "A", ControlStatus::NonControlled, 120.0, 100.0);
        let b = party(&mut ledger, "B", ControlStatus::NonControlled, -20.0, 0.0);

        let report = revalidate(&ledger);
        assert_eq!(report.out_of_range.len(), 2);
        assert!(report
            .out_of_range
            .iter()
            .any(|o| o.party_id == a && o.right_type == RightType::Mechanical));
        assert!(report
            .out_of_range
            .iter()
            .any(|o| o.party_id == b && o.percentage == -20.0));
        assert!(report.is_balanced(RightType::Mechanical));
        assert!(report.has_errors());
    }

    #[test]
    fn test_out_of_range_share_classifies_over_allocated() {
        let mut ledger = PartyLedger::new();
        party(&mut ledger, "A", ControlStatus::NonControlled, 120.0, 50.0);
        party(&mut ledger, "B", ControlStatus::NonControlled, -20.0, 50.0);
        fully_balanced(&mut ledger);

        let report = revalidate(&ledger);
        assert!(report.imbalanced_types.is_empty());
        assert!(!report.controlled_over_limit);
        assert!(report.has_errors());
        assert_eq!(report.classification(), LedgerBalance::OverAllocated);
    }

    #[test]
    fn test_revalidate_is_idempotent() {
        let mut ledger = PartyLedger::new();
        party(&mut ledger, "A", ControlStatus::Controlled, 60.0, 20.0);
        party(&mut ledger, "B", ControlStatus::Controlled, 10.0, 45.0);

        assert_eq!(revalidate(&ledger), revalidate(&ledger));
    }

    #[test]
    fn test_removing_party_changes_totals() {
        let mut ledger = PartyLedger::new();
        party(&mut ledger, "A", ControlStatus::Controlled, 60.0, 50.0);
        let b = party(&mut ledger, "B", ControlStatus::NonControlled, 40.0, 50.0);
        assert!(revalidate(&ledger).is_balanced(RightType::Mechanical));

        ledger.remove_party(b).unwrap();
        let report = revalidate(&ledger);
        assert_eq!(report.per_right_type_total[&RightType::Mechanical], 60.0);
        assert!(!report.is_balanced(RightType::Mechanical));
        assert_eq!(report.classification(), LedgerBalance::UnderAllocated);
    }

    #[test]
    fn test_writer_share_gate() {
        let ledger = PartyLedger::new();
        let validator = SplitValidator::new();

        let writers = vec![WorkWriter::new("A", 60.0), WorkWriter::new("B", 30.0)];
        let report = validator.validate_with_writers(&ledger, &writers);
        assert_eq!(report.writer_share_total, Some(90.0));
        assert!(!report.writer_share_exact);
        let violation = report.check_finalize_work().unwrap_err();
        assert!(matches!(
            violation,
            GateViolation::WriterShareNotExact { delta, .. } if (delta + 10.0).abs() < 1e-9
        ));

        let writers = vec![WorkWriter::new("A", 60.0), WorkWriter::new("B", 40.0)];
        let report = validator.validate_with_writers(&ledger, &writers);
        assert!(report.writer_share_exact);
        assert!(report.check_finalize_work().is_ok());
    }

    #[test]
    fn test_report_without_writers_cannot_finalize() {
        let report = revalidate(&PartyLedger::new());
        assert_eq!(report.writer_share_total, None);
        assert!(!report.writer_share_exact);
        assert!(report.check_finalize_work().is_err());
    }

    #[test]
    fn test_imbalance_does_not_block_activation() {
        let mut ledger = PartyLedger::new();
        party(&mut ledger, "A", ControlStatus::Controlled, 50.0, 10.0);

        let report = revalidate(&ledger);
        assert!(report.has_warnings());
        assert!(report.check_activation().is_ok());
    }

    #[test]
    fn test_custom_tolerance() {
        let mut ledger = PartyLedger::new();
        let id = ledger.add_party(PartyDraft::new("A", PartyType::Writer));
        ledger.update_share(id, RightType::Mechanical, 99.995).unwrap();

        let strict = SplitValidator::new().validate(&ledger);
        assert!(!strict.is_balanced(RightType::Mechanical));

        let lenient = SplitValidator::with_tolerance(0.01).validate(&ledger);
        assert!(lenient.is_balanced(RightType::Mechanical));
    }
}
