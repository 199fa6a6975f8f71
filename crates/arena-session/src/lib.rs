//! Arena Session
//!
//! Lifecycle control for one continuously rendering experiment session whose
//! start and stop are driven locally and by a remote controller.
//!
//! # Architecture
//!
//! - **Surface**: the mount point every component attaches to
//! - **Channel**: event-addressed remote channel with owned subscriptions
//! - **Engine**: the continuous frame loop (`Arena`)
//! - **Presentation / Control**: fullscreen toggle and experiment control, isolated from the lifecycle
//! - **Controller**: the `Idle → Running → Stopped` state machine
//!
//! # Usage
//!
//! ```ignore
//! let channel = Rc::new(LocalChannel::new());
//! let surface = view.query(DEFAULT_MOUNT);
//! let config = SessionConfig::new(surface, channel.clone()).with_control_mode(ControlMode::Participant);
//!
//! let session = SessionController::initialize(config, &ArenaComponents::new(ArenaConfig::default(), Handle::current()))?;
//! session.start()?;
//!
//! // Later, delivered by the transport:
//! channel.deliver(&RemoteSignal::new(STOP_TRIGGERED));
//! assert_eq!(session.state(), SessionState::Stopped);
//! ```

mod channel;
mod control;
mod controller;
mod engine;
mod error;
mod presentation;
mod signal;
mod surface;

pub use channel::{Listener, LocalChannel, RemoteChannel, Subscription};
pub use control::{
    ControlAction, ControlButton, ControlError, ControlMode, ControlSurface, ExperimentControl,
    ExperimentStatus,
};
pub use controller::{SessionComponents, SessionConfig, SessionController, SessionState};
pub use engine::{Arena, ArenaComponents, ArenaConfig, FrameTick, SceneEngine, MAX_FPS};
pub use error::{Error, Result};
pub use presentation::{FullScreener, PresentationError, PresentationMode, PresentationToggle};
pub use signal::{
    RemoteSignal, EXPERIMENT_STARTED, METADATA_SUBMIT, RESTART_PRESSED, RESTART_TRIGGERED,
    START_EXPERIMENT, START_PRESSED, START_TRIGGERED, STOP_PRESSED, STOP_TRIGGERED,
};
pub use surface::{HostView, RenderSurface, SurfaceRef, DEFAULT_MOUNT};

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[tokio::test]
    async fn arena_session_stops_on_remote_signal() {
        let channel = LocalChannel::new();
        let mut view = HostView::new();
        view.mount(RenderSurface::new("scene-container", 1280, 720));

        let config = SessionConfig::new(view.query(DEFAULT_MOUNT), Rc::new(channel.clone()));
        let components = ArenaComponents::new(
            ArenaConfig::default().with_fps(200),
            tokio::runtime::Handle::current(),
        );
        let session = SessionController::initialize(config, &components).unwrap();
        let mut frames = session.with_engine(|arena| arena.frames()).unwrap();

        session.start().unwrap();
        frames.changed().await.unwrap();
        assert!(session.with_engine(|arena| arena.is_running()).unwrap());

        channel.deliver(&RemoteSignal::new(STOP_TRIGGERED));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.with_engine(|arena| arena.is_running()).is_none());
        assert_eq!(channel.listener_count(STOP_TRIGGERED), 0);
    }
}
