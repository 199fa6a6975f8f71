//! Remote signals and their JSON envelope.
//!
//! Every frame exchanged with the relay is a JSON object of the form
//! `{"event": "<name>", "payload": <json>}`. A missing payload decodes as `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Broadcast by the relay when a moderator presses stop. Owned by the session controller.
pub const STOP_TRIGGERED: &str = "stop-triggered";
/// Broadcast by the relay when a moderator presses start.
pub const START_TRIGGERED: &str = "start-triggered";
/// Broadcast by the relay when a moderator presses restart.
pub const RESTART_TRIGGERED: &str = "restart-triggered";
/// Broadcast by the relay once an experiment run has been started.
pub const EXPERIMENT_STARTED: &str = "experiment-started";

pub const STOP_PRESSED: &str = "stop-pressed";
pub const START_PRESSED: &str = "start-pressed";
pub const RESTART_PRESSED: &str = "restart-pressed";
pub const START_EXPERIMENT: &str = "start-experiment";
pub const METADATA_SUBMIT: &str = "metadata-submit";

/// A named event carried over the remote channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSignal {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl RemoteSignal {
    /// A signal with an empty payload.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: Value::Null,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is(&self, event: &str) -> bool {
        self.event == event
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_payload_decodes_as_null() {
        let signal = RemoteSignal::from_json(r#"{"event":"stop-triggered"}"#).unwrap();
        assert!(signal.is(STOP_TRIGGERED));
        assert_eq!(signal.payload, Value::Null);
    }

    #[test]
    fn envelope_shape() {
        let json = RemoteSignal::new(STOP_PRESSED)
            .with_payload(serde_json::json!({"by": "panel"}))
            .to_json()
            .unwrap();
        assert!(json.contains(r#""event":"stop-pressed""#));
        assert!(json.contains(r#""by":"panel""#));
    }

    #[test]
    fn malformed_frame_is_serialization_error() {
        let err = RemoteSignal::from_json("not json").unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}
