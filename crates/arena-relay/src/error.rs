//! Error types for arena-relay.

use thiserror::Error;

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// `metadata-submit` carried something other than a JSON object
    #[error("metadata must be a JSON object, got {0}")]
    InvalidMetadata(&'static str),

    /// Frame could not be decoded
    #[error("Signal error: {0}")]
    Signal(#[from] arena_session::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
