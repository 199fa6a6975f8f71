//! Arena Viewer
//!
//! Headless experiment view. Mounts a render surface, connects to the relay
//! and runs the frame loop until a moderator presses stop.
//!
//! In moderator mode, control commands are read from stdin one per line:
//! `start`, `stop`, `restart`, `experiment`, `metadata {...}`.

use arena_session::{ControlMode, HostView, RenderSurface, DEFAULT_MOUNT, MAX_FPS};
use arena_viewer::{RunOutcome, ViewerCommand, ViewerConfig};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "arena-viewer", about = "Run one experiment session driven by the relay")]
struct Args {
    /// Relay websocket URL
    #[arg(long, default_value = "ws://127.0.0.1:17000/ws")]
    relay: String,

    /// Container selector to mount the scene on
    #[arg(long, default_value = DEFAULT_MOUNT)]
    mount: String,

    /// Frame rate of the render loop
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_FPS)))]
    fps: u32,

    /// Control mode: moderator (reads commands from stdin) or participant
    #[arg(long, default_value = "participant")]
    mode: ControlMode,

    /// Surface width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Surface height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut view = HostView::new();
    let id = args.mount.strip_prefix('#').unwrap_or(&args.mount);
    view.mount(RenderSurface::new(id, args.width, args.height));

    let config = ViewerConfig::default()
        .with_relay_url(args.relay)
        .with_mount(args.mount)
        .with_fps(args.fps)
        .with_control_mode(args.mode);

    let (commands_tx, commands) = mpsc::unbounded_channel();
    if args.mode == ControlMode::Moderator {
        tokio::spawn(read_commands(commands_tx));
    } else {
        drop(commands_tx);
    }

    match arena_viewer::run_with_commands(&view, &config, commands).await? {
        RunOutcome::RemoteStop => println!("Session stopped by the relay"),
        RunOutcome::RelayClosed => println!("Relay connection closed; session torn down"),
    }

    Ok(())
}

async fn read_commands(commands: mpsc::UnboundedSender<ViewerCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ViewerCommand>() {
            Ok(command) => {
                if commands.send(command).is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "Command ignored"),
        }
    }
}
