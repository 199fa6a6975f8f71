//! Arena Relay
//!
//! The remote controller hub. Control panels press start/stop/restart; the
//! relay broadcasts the matching `*-triggered` event to every connected view.
//!
//! # Architecture
//!
//! - **Relay**: event table, broadcast hub, experiment metadata
//! - **WebSocket**: one JSON frame per signal, `{"event": ..., "payload": ...}`
//! - **REST API**: status and an HTTP control panel
//!
//! # Usage
//!
//! ```ignore
//! let server = RelayServer::new(RelayConfig::default());
//! server.serve("0.0.0.0", 17000).await?;
//! ```

mod error;
mod relay;
mod server;

pub use error::{Error, Result};
pub use relay::{relayed_event, ClientId, Relay, RelayConfig, RelayStatus, HTTP_CLIENT};
pub use server::RelayServer;
