//! Registration status tracking
//!
//! One record per (work, collecting body). Status flow:
//!
//! ```text
//! not_registered -> pending_registration -> fully_registered
//!                          ^          \
//!                          |           -> needs_amendment
//!                          +---------------------+
//! ```
//!
//! Automatic transitions (driven by acknowledgements from a collecting
//! body) may only follow the edges above. Manual transitions may move to
//! any state, which is how real-world corrections are recorded. Records
//! for different bodies never affect each other.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration status with one collecting body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    NotRegistered,
    PendingRegistration,
    FullyRegistered,
    NeedsAmendment,
}

impl RegistrationStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "not_registered" | "not-registered" | "unregistered" => {
                Some(RegistrationStatus::NotRegistered)
            }
            "pending_registration" | "pending-registration" | "pending" => {
                Some(RegistrationStatus::PendingRegistration)
            }
            "fully_registered" | "fully-registered" | "registered" => {
                Some(RegistrationStatus::FullyRegistered)
            }
            "needs_amendment" | "needs-amendment" | "amend" => {
                Some(RegistrationStatus::NeedsAmendment)
            }
            _ => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            RegistrationStatus::NotRegistered => "not_registered",
            RegistrationStatus::PendingRegistration => "pending_registration",
            RegistrationStatus::FullyRegistered => "fully_registered",
            RegistrationStatus::NeedsAmendment => "needs_amendment",
        }
    }

    /// Whether an automatic transition from `self` to `next` follows a
    /// defined edge
    pub fn can_advance_to(&self, next: RegistrationStatus) -> bool {
        use RegistrationStatus::*;
        matches!(
            (self, next),
            (NotRegistered, PendingRegistration)
                | (PendingRegistration, FullyRegistered)
                | (PendingRegistration, NeedsAmendment)
                | (NeedsAmendment, PendingRegistration)
        )
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Origin of a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionTrigger {
    /// Driven by the registration workflow; restricted to defined edges
    Automatic,
    /// Explicit caller correction; any target allowed
    Manual,
}

/// Registration of one work with one collecting body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Collecting body identifier (e.g. "ASCAP", "PRS", "GEMA")
    pub body: String,
    pub territory: String,
    /// Work number assigned by the collecting body
    pub work_number: Option<String>,
    #[serde(default)]
    pub status: RegistrationStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RegistrationRecord {
    pub fn new(body: impl Into<String>, territory: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            territory: territory.into(),
            work_number: None,
            status: RegistrationStatus::NotRegistered,
            updated_at: None,
        }
    }

    /// Move to `next`, returning the previous status
    pub fn transition(
        &mut self,
        next: RegistrationStatus,
        trigger: TransitionTrigger,
    ) -> Result<RegistrationStatus> {
        let previous = self.status;
        if trigger == TransitionTrigger::Automatic && !previous.can_advance_to(next) {
            return Err(Error::InvalidTransition(format!(
                "{} -> {} is not an automatic transition ({})",
                previous, next, self.body
            )));
        }
        self.status = next;
        self.updated_at = Some(Utc::now());
        Ok(previous)
    }
}

/// Find or create the record for `body` in a work's registration list
pub fn record_for_body<'a>(
    records: &'a mut Vec<RegistrationRecord>,
    body: &str,
    territory: &str,
) -> &'a mut RegistrationRecord {
    match records.iter().position(|r| r.body.eq_ignore_ascii_case(body)) {
        Some(index) => &mut records[index],
        None => {
            records.push(RegistrationRecord::new(body, territory));
            let last = records.len() - 1;
            &mut records[last]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegistrationStatus::*;

    #[test]
    fn test_retry_path_is_automatic() {
        let mut record = RegistrationRecord::new("PRS", "GB");
        record.status = NeedsAmendment;

        record.transition(PendingRegistration, TransitionTrigger::Automatic).unwrap();
        let previous = record
            .transition(FullyRegistered, TransitionTrigger::Automatic)
            .unwrap();
        assert_eq!(previous, PendingRegistration);
        assert_eq!(record.status, FullyRegistered);
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn test_correction_requires_manual_trigger() {
        let mut record = RegistrationRecord::new("ASCAP", "US");
        record.status = FullyRegistered;

        let result = record.transition(NotRegistered, TransitionTrigger::Automatic);
        assert!(matches!(result, Err(Error::InvalidTransition(_))));
        assert_eq!(record.status, FullyRegistered);

        record.transition(NotRegistered, TransitionTrigger::Manual).unwrap();
        assert_eq!(record.status, NotRegistered);
    }

    #[test]
    fn test_automatic_edges() {
        assert!(NotRegistered.can_advance_to(PendingRegistration));
        assert!(PendingRegistration.can_advance_to(FullyRegistered));
        assert!(PendingRegistration.can_advance_to(NeedsAmendment));
        assert!(NeedsAmendment.can_advance_to(PendingRegistration));

        assert!(!NotRegistered.can_advance_to(FullyRegistered));
        assert!(!FullyRegistered.can_advance_to(PendingRegistration));
        assert!(!NeedsAmendment.can_advance_to(FullyRegistered));
        assert!(!FullyRegistered.can_advance_to(FullyRegistered));
    }

    #[test]
    fn test_bodies_are_independent() {
        let mut records = Vec::new();
        record_for_body(&mut records, "ASCAP", "US")
            .transition(PendingRegistration, TransitionTrigger::Automatic)
            .unwrap();
        record_for_body(&mut records, "GEMA", "DE");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, PendingRegistration);
        assert_eq!(records[1].status, NotRegistered);

        // Lookup is case-insensitive and does not duplicate
        record_for_body(&mut records, "ascap", "US");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [NotRegistered, PendingRegistration, FullyRegistered, NeedsAmendment] {
            assert_eq!(RegistrationStatus::from_str(status.to_db_string()), Some(status));
        }
        assert_eq!(RegistrationStatus::from_str("registered"), Some(FullyRegistered));
        assert_eq!(RegistrationStatus::from_str("bogus"), None);
    }
}
