//! Experiment control surface.
//!
//! A moderator can press start/stop/restart, which the relay turns into
//! `*-triggered` broadcasts. Both modes track the experiment status from the
//! broadcasts they own (`start-triggered`, `restart-triggered`,
//! `experiment-started`). `stop-triggered` belongs to the session controller
//! and is never subscribed here.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::channel::{RemoteChannel, Subscription};
use crate::signal::{
    RemoteSignal, EXPERIMENT_STARTED, METADATA_SUBMIT, RESTART_PRESSED, RESTART_TRIGGERED,
    START_EXPERIMENT, START_PRESSED, START_TRIGGERED, STOP_PRESSED,
};
use crate::surface::SurfaceRef;

/// Behavioral variant of the control surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Drives the experiment for every connected view.
    Moderator,
    /// Observes only.
    #[default]
    Participant,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moderator => write!(f, "moderator"),
            Self::Participant => write!(f, "participant"),
        }
    }
}

impl FromStr for ControlMode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "moderator" => Ok(Self::Moderator),
            "participant" => Ok(Self::Participant),
            other => Err(ControlError::UnknownMode(other.to_string())),
        }
    }
}

/// Buttons on the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlButton {
    Start,
    Stop,
    Restart,
}

impl ControlButton {
    /// Event emitted when the button is pressed.
    pub fn event(&self) -> &'static str {
        match self {
            Self::Start => START_PRESSED,
            Self::Stop => STOP_PRESSED,
            Self::Restart => RESTART_PRESSED,
        }
    }
}

/// A moderator-only action, named in permission errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Press(ControlButton),
    StartExperiment,
    SubmitMetadata,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Press(button) => write!(f, "press {button:?}"),
            Self::StartExperiment => write!(f, "start the experiment"),
            Self::SubmitMetadata => write!(f, "submit metadata"),
        }
    }
}

/// Experiment status as seen through relay broadcasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExperimentStatus {
    #[default]
    Waiting,
    Running,
    Restarting,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{mode} mode cannot {action}")]
    NotPermitted {
        mode: ControlMode,
        action: ControlAction,
    },

    #[error("unknown control mode '{0}'")]
    UnknownMode(String),

    #[error("metadata must be a JSON object")]
    InvalidMetadata,

    #[error("control surface is not available for this session")]
    Unavailable,
}

/// An experiment-control unit that emits and consumes its own channel events.
pub trait ControlSurface {
    fn mode(&self) -> ControlMode;

    fn status(&self) -> ExperimentStatus;

    fn press(&mut self, button: ControlButton) -> Result<(), ControlError>;

    /// Ask the relay to start the experiment run.
    fn start_experiment(&mut self) -> Result<(), ControlError>;

    /// Replace the experiment metadata record held by the relay.
    fn submit_metadata(&mut self, metadata: Value) -> Result<(), ControlError>;
}

/// Default control surface bound to a render surface and a remote channel.
pub struct ExperimentControl {
    surface: SurfaceRef,
    channel: Rc<dyn RemoteChannel>,
    mode: ControlMode,
    status: Rc<Cell<ExperimentStatus>>,
    _subscriptions: Vec<Subscription>,
}

impl ExperimentControl {
    pub fn new(
        surface: SurfaceRef,
        channel: Rc<dyn RemoteChannel>,
        mode: ControlMode,
    ) -> Result<Self, ControlError> {
        let status = Rc::new(Cell::new(ExperimentStatus::Waiting));
        let subscriptions: Vec<Subscription> = [
            (START_TRIGGERED, ExperimentStatus::Running),
            (EXPERIMENT_STARTED, ExperimentStatus::Running),
            (RESTART_TRIGGERED, ExperimentStatus::Restarting),
        ]
        .into_iter()
        .map(|(event, next)| {
            let status = Rc::clone(&status);
            channel.subscribe(
                event,
                Box::new(move |signal: &RemoteSignal| {
                    debug!(event = %signal.event, status = ?next, "Experiment status changed");
                    status.set(next);
                }),
            )
        })
        .collect();

        debug!(surface = surface.id(), %mode, "Experiment control attached");
        Ok(Self {
            surface,
            channel,
            mode,
            status,
            _subscriptions: subscriptions,
        })
    }

    fn require_moderator(&self, action: ControlAction) -> Result<(), ControlError> {
        match self.mode {
            ControlMode::Moderator => Ok(()),
            mode => Err(ControlError::NotPermitted { mode, action }),
        }
    }
}

impl ControlSurface for ExperimentControl {
    fn mode(&self) -> ControlMode {
        self.mode
    }

    fn status(&self) -> ExperimentStatus {
        self.status.get()
    }

    fn press(&mut self, button: ControlButton) -> Result<(), ControlError> {
        self.require_moderator(ControlAction::Press(button))?;
        info!(surface = self.surface.id(), ?button, "Control pressed");
        self.channel.emit(RemoteSignal::new(button.event()));
        Ok(())
    }

    fn start_experiment(&mut self) -> Result<(), ControlError> {
        self.require_moderator(ControlAction::StartExperiment)?;
        info!(surface = self.surface.id(), "Experiment start requested");
        self.channel.emit(RemoteSignal::new(START_EXPERIMENT));
        Ok(())
    }

    fn submit_metadata(&mut self, metadata: Value) -> Result<(), ControlError> {
        self.require_moderator(ControlAction::SubmitMetadata)?;
        if !metadata.is_object() {
            return Err(ControlError::InvalidMetadata);
        }
        info!(surface = self.surface.id(), "Metadata submitted");
        self.channel
            .emit(RemoteSignal::new(METADATA_SUBMIT).with_payload(metadata));
        Ok(())
    }
}

impl fmt::Debug for ExperimentControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentControl")
            .field("surface", &self.surface.id())
            .field("mode", &self.mode)
            .field("status", &self.status.get())
            .finish()
    }
}
