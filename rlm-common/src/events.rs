//! Ledger events and EventBus
//!
//! Mutations performed through [`crate::service::LedgerService`] are
//! broadcast here so display layers can refresh banners without polling.

use crate::contract::{ContractId, ContractStatus};
use crate::ledger::PartyId;
use crate::registration::{RegistrationStatus, TransitionTrigger};
use crate::rights::RightType;
use crate::schedule::WorkId;
use crate::validator::ValidationReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Ledger event types
///
/// Serialized with a `type` tag for transmission to display consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    /// Party appended to a contract ledger
    PartyAdded {
        contract_id: ContractId,
        party_id: PartyId,
        timestamp: DateTime<Utc>,
    },

    /// Party removed from a contract ledger
    PartyRemoved {
        contract_id: ContractId,
        party_id: PartyId,
        timestamp: DateTime<Utc>,
    },

    /// Raw share value stored for one right type
    ShareUpdated {
        contract_id: ContractId,
        party_id: PartyId,
        right_type: RightType,
        percentage: f64,
        timestamp: DateTime<Utc>,
    },

    /// Fresh validation report after a ledger mutation
    ///
    /// Triggers:
    /// - Display: refresh warning/error banners
    LedgerRevalidated {
        contract_id: ContractId,
        report: ValidationReport,
        timestamp: DateTime<Utc>,
    },

    /// Work added to (or replaced in) a contract schedule
    WorkScheduled {
        contract_id: ContractId,
        work_id: WorkId,
        timestamp: DateTime<Utc>,
    },

    /// Work removed from a contract schedule
    WorkRemoved {
        contract_id: ContractId,
        work_id: WorkId,
        timestamp: DateTime<Utc>,
    },

    /// Work passed the finalize gate
    WorkFinalized {
        contract_id: ContractId,
        work_id: WorkId,
        timestamp: DateTime<Utc>,
    },

    /// Contract lifecycle status changed
    ContractStatusChanged {
        contract_id: ContractId,
        old_status: ContractStatus,
        new_status: ContractStatus,
        timestamp: DateTime<Utc>,
    },

    /// Registration status with one collecting body changed
    RegistrationStatusChanged {
        contract_id: ContractId,
        work_id: WorkId,
        body: String,
        old_status: RegistrationStatus,
        new_status: RegistrationStatus,
        trigger: TransitionTrigger,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for ledger events
///
/// Publishing never waits on subscribers. A subscriber that falls more than
/// `capacity` events behind sees `RecvError::Lagged` on its next receive.
///
/// # Examples
///
/// ```
/// use rlm_common::events::EventBus;
///
/// let event_bus = EventBus::new(100);
/// let rx = event_bus.subscribe();
/// assert_eq!(event_bus.subscriber_count(), 1);
/// # drop(rx);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LedgerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LedgerEvent,
    ) -> Result<usize, broadcast::error::SendError<LedgerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LedgerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
