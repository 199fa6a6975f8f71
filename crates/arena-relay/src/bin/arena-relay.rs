//! Arena Relay Server
//!
//! Relay experiment control events between control panels and views.

use arena_relay::{RelayConfig, RelayServer};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "arena-relay", about = "Relay experiment control events to connected views")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 17000)]
    port: u16,

    /// Broadcast buffer per client
    #[arg(long, default_value_t = 256)]
    capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let server = RelayServer::new(RelayConfig::default().with_capacity(args.capacity));
    server.serve(&args.host, args.port).await?;

    Ok(())
}
