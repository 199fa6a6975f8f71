//! Axum web server with WebSocket relay and HTTP control panel.

use std::sync::Arc;

use arena_session::{RemoteSignal, RESTART_PRESSED, START_PRESSED, STOP_PRESSED};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::relay::{ClientId, Relay, RelayConfig, RelayStatus, HTTP_CLIENT};

/// Relay server.
pub struct RelayServer {
    relay: Arc<Relay>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            relay: Arc::new(Relay::new(config)),
        }
    }

    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Build the router for the server.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(sitemap_handler))
            // API routes
            .route("/api/status", get(status_handler))
            .route("/api/control/start", post(start_handler))
            .route("/api/control/stop", post(stop_handler))
            .route("/api/control/restart", post(restart_handler))
            // WebSocket relay
            .route("/ws", get(ws_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.relay())
    }

    /// Run the server on the given address and port.
    pub async fn serve(self, host: &str, port: u16) -> Result<()> {
        let listener = TcpListener::bind((host, port)).await?;
        info!("Relay running on http://{}", listener.local_addr()?);
        self.serve_on(listener).await
    }

    /// Run the server on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// One entry of the route listing.
#[derive(Serialize)]
struct Route {
    path: &'static str,
    method: &'static str,
    description: &'static str,
}

const ROUTES: &[Route] = &[
    Route { path: "/ws", method: "GET", description: "WebSocket relay for control events" },
    Route { path: "/api/status", method: "GET", description: "Connected clients, relayed count and experiment metadata" },
    Route { path: "/api/control/start", method: "POST", description: "Broadcast start-triggered" },
    Route { path: "/api/control/stop", method: "POST", description: "Broadcast stop-triggered" },
    Route { path: "/api/control/restart", method: "POST", description: "Broadcast restart-triggered" },
];

async fn sitemap_handler() -> Json<&'static [Route]> {
    Json(ROUTES)
}

async fn status_handler(State(relay): State<Arc<Relay>>) -> Json<RelayStatus> {
    Json(relay.status().await)
}

#[derive(Serialize)]
struct ControlResponse {
    event: &'static str,
    clients: usize,
}

type ControlResult = std::result::Result<Json<ControlResponse>, (StatusCode, String)>;

async fn press(relay: &Relay, event: &str) -> ControlResult {
    match relay.handle(HTTP_CLIENT, RemoteSignal::new(event)).await {
        Ok(Some(event)) => Ok(Json(ControlResponse {
            event,
            clients: relay.client_count(),
        })),
        Ok(None) => Err((StatusCode::BAD_REQUEST, format!("'{event}' is not relayed"))),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

async fn start_handler(
    State(relay): State<Arc<Relay>>,
) -> ControlResult {
    press(&relay, START_PRESSED).await
}

async fn stop_handler(
    State(relay): State<Arc<Relay>>,
) -> ControlResult {
    press(&relay, STOP_PRESSED).await
}

async fn restart_handler(
    State(relay): State<Arc<Relay>>,
) -> ControlResult {
    press(&relay, RESTART_PRESSED).await
}

async fn ws_handler(ws: WebSocketUpgrade, State(relay): State<Arc<Relay>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, relay))
}

async fn handle_ws(socket: WebSocket, relay: Arc<Relay>) {
    // Subscribe before counting the client so a visible client never misses a broadcast
    let mut broadcasts = relay.subscribe();
    let client = relay.connect();
    let (mut sender, mut receiver) = socket.split();

    let forward = tokio::spawn(async move {
        loop {
            let signal = match broadcasts.recv().await {
                Ok(signal) => signal,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(client, skipped, "Client lagging; broadcasts dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let json = match signal.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!(client, error = %e, "Failed to encode broadcast");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => handle_frame(&relay, client, &text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
    relay.disconnect(client);
}

/// Decode one text frame and hand it to the relay.
async fn relay_frame(relay: &Relay, client: ClientId, text: &str) -> Result<Option<&'static str>> {
    let signal = RemoteSignal::from_json(text)?;
    relay.handle(client, signal).await
}

async fn handle_frame(relay: &Relay, client: ClientId, text: &str) {
    match relay_frame(relay, client, text).await {
        Ok(Some(outbound)) => debug!(client, outbound, "Frame relayed"),
        Ok(None) => {}
        Err(Error::Signal(e)) => warn!(client, error = %e, "Malformed frame skipped"),
        Err(e) => warn!(client, error = %e, "Frame rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn server_creation() {
        let server = RelayServer::new(RelayConfig::default());
        assert_eq!(server.relay().client_count(), 0);
    }

    #[test]
    fn router_builds() {
        let server = RelayServer::new(RelayConfig::default());
        let _router = server.router();
    }

    #[tokio::test]
    async fn http_stop_is_broadcast() {
        let server = RelayServer::new(RelayConfig::default());
        let relay = server.relay();
        let mut rx = relay.subscribe();

        let Json(response) = assert_ok!(stop_handler(State(relay.clone())).await);

        assert_eq!(response.event, arena_session::STOP_TRIGGERED);
        assert!(rx.recv().await.unwrap().is(arena_session::STOP_TRIGGERED));
    }

    #[tokio::test]
    async fn malformed_frame_does_not_relay() {
        let relay = Relay::new(RelayConfig::default());
        let mut rx = relay.subscribe();

        handle_frame(&relay, 1, "{not json").await;
        handle_frame(&relay, 1, r#"{"event":"stop-pressed"}"#).await;

        assert!(rx.recv().await.unwrap().is(arena_session::STOP_TRIGGERED));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn undecodable_frame_is_a_signal_error() {
        let relay = Relay::new(RelayConfig::default());

        let err = assert_err!(relay_frame(&relay, 1, "{not json").await);
        assert!(matches!(err, Error::Signal(_)));

        let err = assert_err!(relay_frame(&relay, 1, r#"{"payload":{}}"#).await);
        assert!(matches!(err, Error::Signal(_)));
        assert_eq!(relay.status().await.relayed, 0);
    }

    #[tokio::test]
    async fn serve_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = assert_err!(RelayServer::new(RelayConfig::default()).serve("127.0.0.1", port).await);
        assert!(matches!(err, Error::Io(_)));
    }
}
