//! # RLM Common Library
//!
//! Royalty-rights ledger core shared by the RLM tools:
//! - Right type registry and per-right share sets
//! - Party ledger and split validation
//! - Work schedule and inheritance resolution
//! - Registration status tracking per collecting body
//! - Contract store trait with in-memory and SQLite implementations
//! - Ledger events (LedgerEvent enum, EventBus)
//! - Configuration loading

pub mod config;
pub mod contract;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod export;
pub mod ledger;
pub mod normalize;
pub mod registration;
pub mod resolver;
pub mod rights;
pub mod schedule;
pub mod service;
pub mod store;
pub mod validator;

pub use contract::{Contract, ContractId, ContractStatus, ContractTerms};
pub use error::{Error, GateViolation, Result};
pub use ledger::{ControlStatus, InterestedParty, PartyDraft, PartyId, PartyLedger, PartyType};
pub use registration::{RegistrationRecord, RegistrationStatus, TransitionTrigger};
pub use resolver::{resolve_effective_terms, EffectiveSplits, EffectiveTerms};
pub use rights::{RightType, ShareSet};
pub use schedule::{InheritanceFlags, ScheduleWork, WorkId, WorkOverrides, WorkSchedule, WorkWriter};
pub use validator::{revalidate, Severity, SplitValidator, ValidationReport};
