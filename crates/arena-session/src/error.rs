//! Error types for arena-session.

use thiserror::Error;

use crate::controller::SessionState;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the session lifecycle.
///
/// Duplicate stop deliveries and repeated disposal are not errors; they are
/// absorbed by the controller.
#[derive(Debug, Error)]
pub enum Error {
    /// The mount target is missing or unusable. Fatal to session creation.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// An operation was attempted from a state that forbids it.
    #[error("invalid session state for {operation}: {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A remote signal could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error indicates a caller bug rather than an environment problem.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }
}
