//! Relay hub: turns control presses into broadcasts for every connected view.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use arena_session::{
    RemoteSignal, EXPERIMENT_STARTED, METADATA_SUBMIT, RESTART_PRESSED, RESTART_TRIGGERED,
    START_EXPERIMENT, START_PRESSED, START_TRIGGERED, STOP_PRESSED, STOP_TRIGGERED,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Identifies a connected client. `0` is the HTTP control panel.
pub type ClientId = u64;

/// Client id used for presses arriving over the REST API.
pub const HTTP_CLIENT: ClientId = 0;

/// Broadcast name for an inbound event, if the relay forwards it.
pub fn relayed_event(inbound: &str) -> Option<&'static str> {
    match inbound {
        STOP_PRESSED => Some(STOP_TRIGGERED),
        START_PRESSED => Some(START_TRIGGERED),
        RESTART_PRESSED => Some(RESTART_TRIGGERED),
        START_EXPERIMENT => Some(EXPERIMENT_STARTED),
        _ => None,
    }
}

/// Configuration for the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Broadcast buffer per client before it starts lagging
    pub capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// Shared relay state.
pub struct Relay {
    tx: broadcast::Sender<RemoteSignal>,
    clients: AtomicUsize,
    next_client: AtomicU64,
    relayed: AtomicU64,
    metadata: RwLock<Value>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let (tx, _rx) = broadcast::channel(config.capacity.max(1));
        Self {
            tx,
            clients: AtomicUsize::new(0),
            next_client: AtomicU64::new(HTTP_CLIENT + 1),
            relayed: AtomicU64::new(0),
            metadata: RwLock::new(Value::Object(Default::default())),
        }
    }

    /// Receive every broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RemoteSignal> {
        self.tx.subscribe()
    }

    /// Register a websocket client.
    pub fn connect(&self) -> ClientId {
        let id = self.next_client.fetch_add(1, Ordering::Relaxed);
        let clients = self.clients.fetch_add(1, Ordering::AcqRel) + 1;
        info!(client = id, clients, "Client connected");
        id
    }

    pub fn disconnect(&self, client: ClientId) {
        let clients = self.clients.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        info!(client, clients, "Client disconnected");
    }

    /// Process one inbound signal.
    ///
    /// Returns the broadcast event name if the signal was relayed.
    pub async fn handle(&self, client: ClientId, signal: RemoteSignal) -> Result<Option<&'static str>> {
        if signal.is(METADATA_SUBMIT) {
            self.store_metadata(client, signal.payload).await?;
            return Ok(None);
        }

        let Some(outbound) = relayed_event(&signal.event) else {
            debug!(client, event = %signal.event, "Ignoring unknown event");
            return Ok(None);
        };

        let receivers = self
            .tx
            .send(RemoteSignal::new(outbound).with_payload(signal.payload))
            .unwrap_or(0);
        self.relayed.fetch_add(1, Ordering::Relaxed);

        info!(
            client,
            inbound = %signal.event,
            outbound,
            receivers,
            timestamp_ns = timestamp_ns(),
            "Relayed signal"
        );
        Ok(Some(outbound))
    }

    async fn store_metadata(&self, client: ClientId, payload: Value) -> Result<()> {
        if !payload.is_object() {
            return Err(Error::InvalidMetadata(json_kind(&payload)));
        }
        info!(client, metadata = %payload, "Experiment metadata updated");
        *self.metadata.write().await = payload;
        Ok(())
    }

    pub async fn metadata(&self) -> Value {
        self.metadata.read().await.clone()
    }

    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> RelayStatus {
        RelayStatus {
            status: "ok",
            clients: self.client_count(),
            relayed: self.relayed.load(Ordering::Relaxed),
            metadata: self.metadata().await,
        }
    }
}

/// Relay status for the REST API.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub status: &'static str,
    pub clients: usize,
    pub relayed: u64,
    pub metadata: Value,
}

fn timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn relay_table() {
        assert_eq!(relayed_event(STOP_PRESSED), Some(STOP_TRIGGERED));
        assert_eq!(relayed_event(START_PRESSED), Some(START_TRIGGERED));
        assert_eq!(relayed_event(RESTART_PRESSED), Some(RESTART_TRIGGERED));
        assert_eq!(relayed_event(START_EXPERIMENT), Some(EXPERIMENT_STARTED));
        assert_eq!(relayed_event(STOP_TRIGGERED), None);
        assert_eq!(relayed_event("slog"), None);
    }

    #[tokio::test]
    async fn stop_press_reaches_every_subscriber() {
        let relay = Relay::new(RelayConfig::default());
        let mut a = relay.subscribe();
        let mut b = relay.subscribe();

        let out = assert_ok!(
            relay
                .handle(1, RemoteSignal::new(STOP_PRESSED).with_payload(json!({"n": 1})))
                .await
        );

        assert_eq!(out, Some(STOP_TRIGGERED));
        for rx in [&mut a, &mut b] {
            let signal = rx.recv().await.unwrap();
            assert!(signal.is(STOP_TRIGGERED));
            assert_eq!(signal.payload, json!({"n": 1}));
        }
    }

    #[tokio::test]
    async fn broadcasts_keep_order() {
        let relay = Relay::new(RelayConfig::default());
        let mut rx = relay.subscribe();

        relay.handle(1, RemoteSignal::new(START_PRESSED)).await.unwrap();
        relay.handle(2, RemoteSignal::new(STOP_PRESSED)).await.unwrap();

        assert!(rx.recv().await.unwrap().is(START_TRIGGERED));
        assert!(rx.recv().await.unwrap().is(STOP_TRIGGERED));
    }

    #[tokio::test]
    async fn unknown_event_is_not_relayed() {
        let relay = Relay::new(RelayConfig::default());
        let mut rx = relay.subscribe();

        let out = assert_ok!(relay.handle(1, RemoteSignal::new("display")).await);

        assert_eq!(out, None);
        assert!(rx.try_recv().is_err());
        assert_eq!(relay.status().await.relayed, 0);
    }

    #[tokio::test]
    async fn metadata_replaces_record() {
        let relay = Relay::new(RelayConfig::default());

        relay
            .handle(1, RemoteSignal::new(METADATA_SUBMIT).with_payload(json!({"fly": "a"})))
            .await
            .unwrap();
        relay
            .handle(1, RemoteSignal::new(METADATA_SUBMIT).with_payload(json!({"temp": 24})))
            .await
            .unwrap();

        assert_eq!(relay.metadata().await, json!({"temp": 24}));
    }

    #[tokio::test]
    async fn non_object_metadata_is_rejected() {
        let relay = Relay::new(RelayConfig::default());

        let err = assert_err!(
            relay
                .handle(1, RemoteSignal::new(METADATA_SUBMIT).with_payload(json!("x")))
                .await
        );

        assert!(matches!(err, Error::InvalidMetadata("string")));
        assert_eq!(relay.metadata().await, json!({}));
    }

    #[test]
    fn client_ids_skip_http_panel() {
        let relay = Relay::new(RelayConfig::default());
        let a = relay.connect();
        let b = relay.connect();
        assert_ne!(a, HTTP_CLIENT);
        assert_ne!(a, b);
        assert_eq!(relay.client_count(), 2);

        relay.disconnect(a);
        assert_eq!(relay.client_count(), 1);
    }
}
