//! Session lifecycle controller.
//!
//! [`SessionController`] is the single point that moves a session through
//! `Idle → Running → Stopped`. Every transition is gated on the current state,
//! so a remote stop that arrives early, late, or twice cannot stop the engine
//! before it started or stop it twice.
//!
//! # Ordering
//!
//! The `stop-triggered` listener is registered only after the engine's
//! `start` has returned. A stop delivered before that has no listener to
//! reach and is dropped; sessions do not buffer signals.
//!
//! # Isolation
//!
//! The presentation toggle and control surface live in their own cells. A
//! failure constructing or using either is logged and reported to the caller
//! of that widget; it never changes the session state.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channel::{RemoteChannel, Subscription};
use crate::control::{ControlButton, ControlError, ControlMode, ControlSurface, ExperimentControl, ExperimentStatus};
use crate::engine::SceneEngine;
use crate::error::{Error, Result};
use crate::presentation::{FullScreener, PresentationError, PresentationMode, PresentationToggle};
use crate::signal::{RemoteSignal, STOP_TRIGGERED};
use crate::surface::SurfaceRef;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, nothing started.
    Idle,
    /// Engine loop active, stop listener registered.
    Running,
    /// Terminal. Engine released.
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Caller-facing configuration for one session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Mount target, resolved by the caller. `None` means nothing was found.
    pub surface: Option<SurfaceRef>,
    /// Channel shared with the control surface.
    pub channel: Rc<dyn RemoteChannel>,
    pub control_mode: ControlMode,
}

impl SessionConfig {
    pub fn new(surface: Option<SurfaceRef>, channel: Rc<dyn RemoteChannel>) -> Self {
        Self {
            surface,
            channel,
            control_mode: ControlMode::default(),
        }
    }

    #[must_use]
    pub fn with_control_mode(mut self, mode: ControlMode) -> Self {
        self.control_mode = mode;
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("surface", &self.surface.as_ref().map(|s| s.id().to_string()))
            .field("control_mode", &self.control_mode)
            .finish()
    }
}

/// Builds the per-session collaborators.
///
/// Only the engine is required; presentation and control default to
/// [`FullScreener`] and [`ExperimentControl`].
pub trait SessionComponents {
    type Engine: SceneEngine + 'static;

    fn engine(&self, surface: &SurfaceRef) -> Self::Engine;

    fn presentation(
        &self,
        surface: &SurfaceRef,
    ) -> std::result::Result<Box<dyn PresentationToggle>, PresentationError> {
        Ok(Box::new(FullScreener::new(surface.clone())?))
    }

    fn control(
        &self,
        surface: &SurfaceRef,
        channel: Rc<dyn RemoteChannel>,
        mode: ControlMode,
    ) -> std::result::Result<Box<dyn ControlSurface>, ControlError> {
        Ok(Box::new(ExperimentControl::new(surface.clone(), channel, mode)?))
    }
}

struct SessionInner<E> {
    state: SessionState,
    surface: Option<SurfaceRef>,
    engine: Option<E>,
    subscription: Option<Subscription>,
}

/// Owns one session's state machine.
pub struct SessionController<E: SceneEngine + 'static> {
    inner: Rc<RefCell<SessionInner<E>>>,
    channel: Rc<dyn RemoteChannel>,
    presentation: RefCell<Option<Box<dyn PresentationToggle>>>,
    control: RefCell<Option<Box<dyn ControlSurface>>>,
}

impl<E: SceneEngine + 'static> SessionController<E> {
    /// Construct the engine, presentation toggle and control surface against
    /// the configured surface. The engine is not started.
    ///
    /// Fails with [`Error::Precondition`] if the surface is missing or invalid.
    pub fn initialize<C>(config: SessionConfig, components: &C) -> Result<Self>
    where
        C: SessionComponents<Engine = E>,
    {
        let surface = config
            .surface
            .ok_or_else(|| Error::Precondition("no render surface to mount on".into()))?;
        surface.validate()?;

        let engine = components.engine(&surface);

        let presentation = match components.presentation(&surface) {
            Ok(toggle) => Some(toggle),
            Err(e) => {
                warn!(surface = surface.id(), error = %e, "Presentation toggle unavailable");
                None
            }
        };

        let control = match components.control(&surface, Rc::clone(&config.channel), config.control_mode) {
            Ok(control) => Some(control),
            Err(e) => {
                warn!(surface = surface.id(), error = %e, "Control surface unavailable");
                None
            }
        };

        debug!(
            surface = surface.id(),
            mode = %config.control_mode,
            "Session initialized"
        );

        Ok(Self {
            inner: Rc::new(RefCell::new(SessionInner {
                state: SessionState::Idle,
                surface: Some(surface),
                engine: Some(engine),
                subscription: None,
            })),
            channel: config.channel,
            presentation: RefCell::new(presentation),
            control: RefCell::new(control),
        })
    }

    /// Start the engine and listen for the remote stop.
    ///
    /// Only valid from `Idle`; otherwise fails with [`Error::InvalidState`]
    /// and leaves the engine untouched.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.state != SessionState::Idle {
            return Err(Error::InvalidState {
                operation: "start",
                state: inner.state,
            });
        }
        let Some(engine) = inner.engine.as_mut() else {
            return Err(Error::InvalidState {
                operation: "start",
                state: inner.state,
            });
        };

        engine.start();
        inner.state = SessionState::Running;

        let session = Rc::downgrade(&self.inner);
        inner.subscription = Some(self.channel.subscribe(
            STOP_TRIGGERED,
            Box::new(move |signal: &RemoteSignal| on_stop_signal(&session, signal)),
        ));

        info!(
            surface = inner.surface.as_ref().map(|s| s.id()).unwrap_or_default(),
            "Session running"
        );
        Ok(())
    }

    /// Tear the engine down in response to a remote stop.
    ///
    /// Returns `true` if this call stopped the session. Outside `Running`
    /// (never started, already stopped, disposed) it is a silent no-op.
    pub fn handle_remote_stop(&self) -> bool {
        remote_stop(&self.inner)
    }

    /// Release the subscription, the engine and the widgets.
    ///
    /// Safe from any state and idempotent. A running engine is stopped
    /// first, so it still sees exactly one stop.
    pub fn dispose(&self) {
        let released = {
            let Ok(mut inner) = self.inner.try_borrow_mut() else {
                warn!("Dispose re-entered the session; ignoring");
                return;
            };
            if inner.state == SessionState::Running {
                if let Some(engine) = inner.engine.as_mut() {
                    engine.stop();
                }
            }
            if inner.state != SessionState::Stopped {
                info!(from = %inner.state, "Session disposed");
            }
            inner.state = SessionState::Stopped;
            (
                inner.subscription.take(),
                inner.engine.take(),
                inner.surface.take(),
            )
        };
        drop(released);

        let presentation = self.presentation.borrow_mut().take();
        let control = self.control.borrow_mut().take();
        drop(presentation);
        drop(control);
    }

    pub fn state(&self) -> SessionState {
        self.inner.borrow().state
    }

    /// Whether the stop listener is currently registered.
    pub fn is_listening(&self) -> bool {
        self.inner
            .borrow()
            .subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    pub fn surface(&self) -> Option<SurfaceRef> {
        self.inner.borrow().surface.clone()
    }

    /// Run `f` against the engine while the session still owns one.
    pub fn with_engine<R>(&self, f: impl FnOnce(&E) -> R) -> Option<R> {
        self.inner.borrow().engine.as_ref().map(f)
    }

    pub fn presentation_mode(&self) -> Option<PresentationMode> {
        self.presentation.borrow().as_ref().map(|p| p.mode())
    }

    /// Flip fullscreen presentation. Never affects the session state.
    pub fn toggle_presentation(&self) -> std::result::Result<PresentationMode, PresentationError> {
        let mut presentation = self.presentation.borrow_mut();
        let toggle = presentation.as_mut().ok_or(PresentationError::Unavailable)?;
        toggle.toggle().inspect_err(|e| {
            warn!(error = %e, "Presentation toggle failed");
        })
    }

    pub fn control_mode(&self) -> Option<ControlMode> {
        self.control.borrow().as_ref().map(|c| c.mode())
    }

    pub fn experiment_status(&self) -> Option<ExperimentStatus> {
        self.control.borrow().as_ref().map(|c| c.status())
    }

    /// Press a button on the control surface. Never affects the session state.
    pub fn press(&self, button: ControlButton) -> std::result::Result<(), ControlError> {
        let mut control = self.control.borrow_mut();
        let control = control.as_mut().ok_or(ControlError::Unavailable)?;
        control.press(button).inspect_err(|e| {
            warn!(error = %e, "Control press rejected");
        })
    }

    /// Ask the relay to start the experiment. Never affects the session state.
    pub fn start_experiment(&self) -> std::result::Result<(), ControlError> {
        let mut control = self.control.borrow_mut();
        let control = control.as_mut().ok_or(ControlError::Unavailable)?;
        control.start_experiment().inspect_err(|e| {
            warn!(error = %e, "Experiment start rejected");
        })
    }

    /// Submit experiment metadata. Never affects the session state.
    pub fn submit_metadata(&self, metadata: Value) -> std::result::Result<(), ControlError> {
        let mut control = self.control.borrow_mut();
        let control = control.as_mut().ok_or(ControlError::Unavailable)?;
        control.submit_metadata(metadata).inspect_err(|e| {
            warn!(error = %e, "Metadata submit rejected");
        })
    }
}

impl<E: SceneEngine + 'static> Drop for SessionController<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<E: SceneEngine + 'static> fmt::Debug for SessionController<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .inner
            .try_borrow()
            .map(|inner| inner.state.to_string())
            .unwrap_or_else(|_| "<busy>".into());
        f.debug_struct("SessionController")
            .field("state", &state)
            .finish()
    }
}

fn on_stop_signal<E: SceneEngine>(session: &Weak<RefCell<SessionInner<E>>>, signal: &RemoteSignal) {
    match session.upgrade() {
        Some(inner) => {
            debug!(event = %signal.event, "Remote stop received");
            remote_stop(&inner);
        }
        None => debug!(event = %signal.event, "Remote stop for a dropped session"),
    }
}

fn remote_stop<E: SceneEngine>(cell: &RefCell<SessionInner<E>>) -> bool {
    // Released after the session borrow ends so the channel can be touched freely.
    let released = {
        let Ok(mut inner) = cell.try_borrow_mut() else {
            warn!("Remote stop re-entered the session; ignoring");
            return false;
        };
        if inner.state != SessionState::Running {
            debug!(state = %inner.state, "Ignoring remote stop");
            return false;
        }
        inner.state = SessionState::Stopped;
        if let Some(engine) = inner.engine.as_mut() {
            engine.stop();
        }
        info!("Session stopped by remote signal");
        (inner.subscription.take(), inner.engine.take())
    };
    drop(released);
    true
}
