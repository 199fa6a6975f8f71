//! WebSocket bridge between the relay and a local channel.
//!
//! Outbound signals are drained from an unbounded queue by a spawned writer.
//! Inbound frames are read by the caller with [`RelayBridge::next_signal`]
//! and delivered on the caller's thread, so listeners never run concurrently
//! with the session that owns them.

use arena_session::RemoteSignal;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::Result;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live connection to the relay.
pub struct RelayBridge {
    inbound: SplitStream<Socket>,
    outbound: mpsc::UnboundedSender<RemoteSignal>,
    writer: JoinHandle<()>,
}

impl RelayBridge {
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _response) = connect_async(url).await?;
        info!(url, "Connected to relay");

        let (mut sink, inbound) = socket.split();
        let (outbound, mut queue) = mpsc::unbounded_channel::<RemoteSignal>();

        let writer = tokio::spawn(async move {
            while let Some(signal) = queue.recv().await {
                let json = match signal.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode outbound signal");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json)).await {
                    warn!(error = %e, "Relay write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        Ok(Self {
            inbound,
            outbound,
            writer,
        })
    }

    /// Queue for signals to send to the relay.
    pub fn sink(&self) -> mpsc::UnboundedSender<RemoteSignal> {
        self.outbound.clone()
    }

    /// Wait for the next inbound signal. `None` once the relay closes the socket.
    ///
    /// Malformed frames are logged and skipped.
    pub async fn next_signal(&mut self) -> Option<RemoteSignal> {
        while let Some(frame) = self.inbound.next().await {
            match frame {
                Ok(Message::Text(text)) => match RemoteSignal::from_json(&text) {
                    Ok(signal) => return Some(signal),
                    Err(e) => warn!(error = %e, "Malformed frame skipped"),
                },
                Ok(Message::Close(_)) => {
                    debug!("Relay closed the connection");
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Relay read failed");
                    return None;
                }
            }
        }
        None
    }
}

impl Drop for RelayBridge {
    fn drop(&mut self) {
        self.writer.abort();
    }
}
