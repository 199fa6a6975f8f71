//! Arena Viewer
//!
//! A headless client view: resolves the mount point, connects to the relay,
//! and runs one experiment session until the relay stops it.
//!
//! Everything runs on one thread. The frame loop is a task on the runtime;
//! relay frames and moderator commands are handled between frames.

mod bridge;
mod command;
mod error;

use std::rc::Rc;
use std::time::Duration;

use arena_session::{
    ArenaComponents, ArenaConfig, ControlMode, HostView, LocalChannel, SessionConfig,
    SessionController, SessionState, DEFAULT_MOUNT,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub use bridge::RelayBridge;
pub use command::ViewerCommand;
pub use error::{Error, Result};

/// Shortest period between frame-progress log lines.
pub const MIN_STATS_INTERVAL: Duration = Duration::from_millis(10);

/// Why a viewer run ended. The session is disposed in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The relay broadcast `stop-triggered` and the session stopped.
    RemoteStop,
    /// The relay connection went away while the session was running.
    RelayClosed,
}

/// Configuration for one viewer run.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Relay websocket URL
    pub relay_url: String,
    /// Selector of the container to mount on
    pub mount: String,
    /// Frame rate of the render loop
    pub fps: u32,
    pub control_mode: ControlMode,
    stats_interval: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:17000/ws".into(),
            mount: DEFAULT_MOUNT.into(),
            fps: 50,
            control_mode: ControlMode::Participant,
            stats_interval: Duration::from_secs(5),
        }
    }
}

impl ViewerConfig {
    #[must_use]
    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    #[must_use]
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    #[must_use]
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    #[must_use]
    pub fn with_control_mode(mut self, mode: ControlMode) -> Self {
        self.control_mode = mode;
        self
    }

    /// How often frame progress is logged, no faster than [`MIN_STATS_INTERVAL`].
    #[must_use]
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval.max(MIN_STATS_INTERVAL);
        self
    }

    pub fn stats_interval(&self) -> Duration {
        self.stats_interval
    }
}

/// Run one session in `view` until it stops or the relay goes away.
///
/// The mount point is resolved before any network work, so a missing
/// container fails fast with a precondition error.
pub async fn run(view: &HostView, config: &ViewerConfig) -> Result<RunOutcome> {
    let (_commands_tx, commands) = mpsc::unbounded_channel();
    run_with_commands(view, config, commands).await
}

/// Like [`run`], also forwarding moderator commands to the control surface.
///
/// Rejected commands are logged and never end the run. Once the command
/// sender is dropped the run continues on relay signals alone.
pub async fn run_with_commands(
    view: &HostView,
    config: &ViewerConfig,
    mut commands: mpsc::UnboundedReceiver<ViewerCommand>,
) -> Result<RunOutcome> {
    let surface = view.resolve(&config.mount)?;

    let mut bridge = RelayBridge::connect(&config.relay_url).await?;
    let channel = LocalChannel::with_outbound(bridge.sink());

    let session_config = SessionConfig::new(Some(surface), Rc::new(channel.clone()))
        .with_control_mode(config.control_mode);
    let components = ArenaComponents::new(ArenaConfig::default().with_fps(config.fps), Handle::current());
    let session = SessionController::initialize(session_config, &components)?;
    let frames = session.with_engine(|arena| arena.frames());

    session.start()?;

    let mut stats = tokio::time::interval(config.stats_interval);
    stats.tick().await;

    let mut outcome = RunOutcome::RemoteStop;
    while session.state() == SessionState::Running {
        tokio::select! {
            signal = bridge.next_signal() => match signal {
                Some(signal) => {
                    channel.deliver(&signal);
                }
                None => {
                    warn!("Relay connection closed; tearing session down");
                    outcome = RunOutcome::RelayClosed;
                    break;
                }
            },
            Some(command) = commands.recv() => {
                // Rejections are logged by the session
                let _ = command.apply(&session);
            }
            _ = stats.tick() => {
                if let Some(frames) = &frames {
                    let tick = *frames.borrow();
                    info!(frame = tick.frame, elapsed = ?tick.elapsed, "Frame progress");
                }
            }
        }
    }

    session.dispose();
    info!(?outcome, state = %session.state(), "Viewer finished");
    Ok(outcome)
}
