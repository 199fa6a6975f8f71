//! Moderator console commands.
//!
//! One command per line: `start`, `stop`, `restart`, `experiment`, or
//! `metadata <json object>`.

use std::str::FromStr;

use arena_session::{ControlButton, ControlError, SceneEngine, SessionController};
use serde_json::Value;

use crate::error::Error;

/// An action a moderator view asks its control surface to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    Press(ControlButton),
    StartExperiment,
    SubmitMetadata(Value),
}

impl ViewerCommand {
    /// Forward the command to the session's control surface.
    pub fn apply<E: SceneEngine + 'static>(
        self,
        session: &SessionController<E>,
    ) -> Result<(), ControlError> {
        match self {
            Self::Press(button) => session.press(button),
            Self::StartExperiment => session.start_experiment(),
            Self::SubmitMetadata(metadata) => session.submit_metadata(metadata),
        }
    }
}

impl FromStr for ViewerCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match word.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Press(ControlButton::Start)),
            "stop" => Ok(Self::Press(ControlButton::Stop)),
            "restart" => Ok(Self::Press(ControlButton::Restart)),
            "experiment" => Ok(Self::StartExperiment),
            "metadata" => Ok(Self::SubmitMetadata(serde_json::from_str(rest.trim())?)),
            _ => Err(Error::UnknownCommand(line.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn parses_buttons_and_experiment() {
        assert_eq!(
            assert_ok!("stop".parse::<ViewerCommand>()),
            ViewerCommand::Press(ControlButton::Stop)
        );
        assert_eq!(
            assert_ok!(" Restart ".parse::<ViewerCommand>()),
            ViewerCommand::Press(ControlButton::Restart)
        );
        assert_eq!(
            assert_ok!("experiment".parse::<ViewerCommand>()),
            ViewerCommand::StartExperiment
        );
    }

    #[test]
    fn parses_metadata_payload() {
        let command = assert_ok!(r#"metadata {"fly": "cs-1", "age_days": 3}"#.parse::<ViewerCommand>());
        assert_eq!(
            command,
            ViewerCommand::SubmitMetadata(json!({"fly": "cs-1", "age_days": 3}))
        );
    }

    #[test]
    fn rejects_unknown_and_bad_json() {
        assert!(matches!(
            assert_err!("pause".parse::<ViewerCommand>()),
            Error::UnknownCommand(_)
        ));
        assert!(matches!(
            assert_err!("metadata {fly".parse::<ViewerCommand>()),
            Error::Metadata(_)
        ));
    }
}
