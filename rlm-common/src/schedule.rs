//! Work schedule
//!
//! Musical works scheduled under a contract. The inheritance flags and
//! overrides are what the resolver consumes; the rest is catalog metadata
//! carried for display and export.

use crate::ledger::PartyLedger;
use crate::registration::RegistrationRecord;
use crate::validator::{SplitValidator, ValidationReport};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Schedule work identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(pub Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which contract terms a work derives live from its contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceFlags {
    pub royalty_splits: bool,
    pub recoupment_status: bool,
    pub controlled_status: bool,
}

impl Default for InheritanceFlags {
    /// Newly scheduled works inherit everything
    fn default() -> Self {
        Self::all()
    }
}

impl InheritanceFlags {
    pub fn all() -> Self {
        Self {
            royalty_splits: true,
            recoupment_status: true,
            controlled_status: true,
        }
    }

    pub fn none() -> Self {
        Self {
            royalty_splits: false,
            recoupment_status: false,
            controlled_status: false,
        }
    }
}

/// Work-specific values that replace contract terms for this work only
///
/// `None` means absent (use the contract value); `Some(0.0)` is an explicit
/// zero and still wins.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkOverrides {
    pub advance: Option<f64>,
    pub rate_reduction: Option<f64>,
    /// Set by the recoupment feature; only read when recoupment is not inherited
    pub recouped: Option<bool>,
}

/// External identifiers for a scheduled work
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalIds {
    pub work_id: Option<String>,
    pub isrc: Option<String>,
    pub iswc: Option<String>,
}

/// Writer record with a writer-only share percentage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkWriter {
    pub name: String,
    #[serde(default)]
    pub ipi: Option<String>,
    pub share: f64,
}

impl WorkWriter {
    pub fn new(name: impl Into<String>, share: f64) -> Self {
        Self {
            name: name.into(),
            ipi: None,
            share,
        }
    }
}

/// Musical work scheduled under exactly one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleWork {
    pub id: WorkId,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Link to an external catalog record, if any
    pub catalog_ref: Option<String>,
    #[serde(default)]
    pub external_ids: ExternalIds,
    #[serde(default)]
    pub inheritance: InheritanceFlags,
    #[serde(default)]
    pub overrides: WorkOverrides,
    #[serde(default)]
    pub writers: Vec<WorkWriter>,
    #[serde(default)]
    pub registrations: Vec<RegistrationRecord>,
    #[serde(default)]
    pub finalized: bool,
}

impl ScheduleWork {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: WorkId::new(),
            title: title.into(),
            artist: None,
            album: None,
            catalog_ref: None,
            external_ids: ExternalIds::default(),
            inheritance: InheritanceFlags::default(),
            overrides: WorkOverrides::default(),
            writers: Vec::new(),
            registrations: Vec::new(),
            finalized: false,
        }
    }

    pub fn with_inheritance(mut self, inheritance: InheritanceFlags) -> Self {
        self.inheritance = inheritance;
        self
    }

    pub fn with_overrides(mut self, overrides: WorkOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_writers(mut self, writers: Vec<WorkWriter>) -> Self {
        self.writers = writers;
        self
    }
}

/// Works scheduled under one contract, in insertion order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkSchedule {
    works: Vec<ScheduleWork>,
}

impl WorkSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_works(works: Vec<ScheduleWork>) -> Self {
        Self { works }
    }

    /// Add a work; replaces an existing entry with the same id
    pub fn add_work(&mut self, work: ScheduleWork) -> WorkId {
        let id = work.id;
        match self.works.iter_mut().find(|w| w.id == id) {
            Some(existing) => *existing = work,
            None => self.works.push(work),
        }
        id
    }

    pub fn remove_work(&mut self, id: WorkId) -> Result<ScheduleWork> {
        let index = self
            .works
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| Error::NotFound(format!("schedule work {}", id)))?;
        Ok(self.works.remove(index))
    }

    pub fn work(&self, id: WorkId) -> Option<&ScheduleWork> {
        self.works.iter().find(|w| w.id == id)
    }

    pub fn work_mut(&mut self, id: WorkId) -> Result<&mut ScheduleWork> {
        self.works
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::NotFound(format!("schedule work {}", id)))
    }

    pub fn works(&self) -> &[ScheduleWork] {
        &self.works
    }

    pub fn len(&self) -> usize {
        self.works.len()
    }

    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }

    /// Mark a work complete enough to register externally
    ///
    /// Blocked when the work's writer shares are not exactly 100 or the
    /// contract's controlled share is over the limit. Returns the report the
    /// decision was based on.
    pub fn finalize_work(
        &mut self,
        id: WorkId,
        ledger: &PartyLedger,
        validator: &SplitValidator,
    ) -> Result<ValidationReport> {
        let work = self.work_mut(id)?;
        let report = validator.validate_with_writers(ledger, &work.writers);
        report.check_finalize_work()?;
        work.finalized = true;
        info!("Finalized schedule work {} ({})", work.title, id);
        Ok(report)
    }
}
