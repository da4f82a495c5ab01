//! Common error types for RLM

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for RLM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across RLM crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error for stored terms and imports
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Registration status change not permitted for the given trigger
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A finalize/activate action was blocked by a validation error
    #[error("Action blocked: {0}")]
    Gate(GateViolation),

    /// Export refused because the work's splits must be entered manually
    #[error("Manual entry required: {0}")]
    ManualEntryRequired(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Validation error that blocks a specific finalize or submit action
///
/// Each variant carries the numeric delta so the message can state by how
/// much the invariant is violated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum GateViolation {
    /// Sum of controlled parties' administrative share is above 100%
    ControlledShareExceeded { total: f64, excess: f64 },
    /// Writer shares of a work do not add up to 100%
    WriterShareNotExact { total: f64, delta: f64 },
}

impl std::fmt::Display for GateViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateViolation::ControlledShareExceeded { total, excess } => write!(
                f,
                "controlled share exceeds 100% (total {:.2}%, over by {:.2}%)",
                total, excess
            ),
            GateViolation::WriterShareNotExact { total, delta } => write!(
                f,
                "writer share must equal 100% (total {:.2}%, delta {:+.2}%)",
                total, delta
            ),
        }
    }
}

impl From<GateViolation> for Error {
    fn from(violation: GateViolation) -> Self {
        Error::Gate(violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_messages_name_invariant_and_delta() {
        let err: Error = GateViolation::ControlledShareExceeded {
            total: 110.0,
            excess: 10.0,
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("controlled share exceeds 100%"), "{}", msg);
        assert!(msg.contains("10.00"), "{}", msg);

        let msg = GateViolation::WriterShareNotExact {
            total: 90.0,
            delta: -10.0,
        }
        .to_string();
        assert!(msg.contains("writer share"), "{}", msg);
        assert!(msg.contains("-10.00"), "{}", msg);
    }
}
