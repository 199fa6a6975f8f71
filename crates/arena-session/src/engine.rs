//! Scene engine boundary and the `Arena` frame loop.
//!
//! The engine owns a continuous loop bound to a render surface. What the loop
//! draws is not this crate's business; `Arena` publishes a [`FrameTick`] per
//! frame on a watch channel and renderers subscribe to it.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::controller::SessionComponents;
use crate::surface::SurfaceRef;

/// A continuous render/simulation loop.
///
/// `start` must return without waiting on the loop. The session controller
/// calls `stop` at most once per `start` and never before it.
pub trait SceneEngine {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Highest frame rate the loop will run at. Faster requests are capped.
pub const MAX_FPS: u32 = 1000;

/// Configuration for the `Arena` frame loop.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Target frames per second
    pub fps: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self { fps: 50 }
    }
}

impl ArenaConfig {
    #[must_use]
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Frame rate the loop actually runs at, within `1..=MAX_FPS`.
    pub fn effective_fps(&self) -> u32 {
        self.fps.clamp(1, MAX_FPS)
    }

    /// Time between frames. Never zero.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.effective_fps()
    }
}

/// Progress of the frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTick {
    pub frame: u64,
    pub elapsed: Duration,
}

/// Frame-loop engine scheduled on a tokio runtime.
pub struct Arena {
    surface: SurfaceRef,
    config: ArenaConfig,
    runtime: Handle,
    frames: Arc<watch::Sender<FrameTick>>,
    task: Option<JoinHandle<()>>,
}

impl Arena {
    /// Bind an engine to `surface`. Nothing runs until [`SceneEngine::start`].
    pub fn new(surface: SurfaceRef, config: ArenaConfig, runtime: Handle) -> Self {
        let (tx, _rx) = watch::channel(FrameTick::default());
        Self {
            surface,
            config,
            runtime,
            frames: Arc::new(tx),
            task: None,
        }
    }

    /// Subscribe to frame ticks.
    pub fn frames(&self) -> watch::Receiver<FrameTick> {
        self.frames.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn surface(&self) -> &SurfaceRef {
        &self.surface
    }
}

impl SceneEngine for Arena {
    fn start(&mut self) {
        if self.task.is_some() {
            warn!(surface = self.surface.id(), "Frame loop already running");
            return;
        }
        if self.config.fps != self.config.effective_fps() {
            warn!(
                requested = self.config.fps,
                fps = self.config.effective_fps(),
                "Frame rate out of range; clamped"
            );
        }
        let period = self.config.frame_interval();
        let frames = Arc::clone(&self.frames);
        self.task = Some(self.runtime.spawn(run_frames(frames, period)));
        info!(
            surface = self.surface.id(),
            fps = self.config.effective_fps(),
            "Frame loop started"
        );
    }

    fn stop(&mut self) {
        match self.task.take() {
            Some(task) => {
                task.abort();
                info!(
                    surface = self.surface.id(),
                    frame = self.frames.borrow().frame,
                    "Frame loop stopped"
                );
            }
            None => debug!(surface = self.surface.id(), "Stop with no frame loop"),
        }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_frames(frames: Arc<watch::Sender<FrameTick>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();
    let mut frame = 0u64;

    loop {
        interval.tick().await;
        frame += 1;
        frames.send_replace(FrameTick {
            frame,
            elapsed: started.elapsed(),
        });
        trace!(frame, "Frame");
    }
}

/// Builds `Arena` engines for sessions; presentation and control use the defaults.
#[derive(Debug, Clone)]
pub struct ArenaComponents {
    pub config: ArenaConfig,
    pub runtime: Handle,
}

impl ArenaComponents {
    pub fn new(config: ArenaConfig, runtime: Handle) -> Self {
        Self { config, runtime }
    }
}

impl SessionComponents for ArenaComponents {
    type Engine = Arena;

    fn engine(&self, surface: &SurfaceRef) -> Arena {
        Arena::new(surface.clone(), self.config.clone(), self.runtime.clone())
    }
}
