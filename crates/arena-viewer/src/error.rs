//! Error types for arena-viewer.

use thiserror::Error;

/// Result type for viewer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Session lifecycle error
    #[error("Session error: {0}")]
    Session(#[from] arena_session::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Console line that is not a control command
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// `metadata` command with a payload that is not JSON
    #[error("metadata is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),
}
