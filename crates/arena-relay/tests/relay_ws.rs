//! End-to-end relay over real websockets.

use std::time::Duration;

use arena_relay::{RelayConfig, RelayServer};
use arena_session::{RemoteSignal, STOP_PRESSED, STOP_TRIGGERED};
use futures::{SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn recv_signal<S>(ws: &mut S) -> RemoteSignal
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for broadcast")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return RemoteSignal::from_json(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn stop_press_is_broadcast_to_every_view() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RelayServer::new(RelayConfig::default());
    let relay = server.relay();
    tokio::spawn(server.serve_on(listener));

    let url = format!("ws://{addr}/ws");
    let (mut panel, _) = connect_async(url.as_str()).await.unwrap();
    let (mut view, _) = connect_async(url.as_str()).await.unwrap();

    // Both sockets must be subscribed before the press
    for _ in 0..100 {
        if relay.client_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(relay.client_count(), 2);

    panel
        .send(Message::Text(RemoteSignal::new(STOP_PRESSED).to_json().unwrap()))
        .await
        .unwrap();

    assert!(recv_signal(&mut view).await.is(STOP_TRIGGERED));
    assert!(recv_signal(&mut panel).await.is(STOP_TRIGGERED));

    let status = relay.status().await;
    assert_eq!(status.relayed, 1);
}

#[tokio::test]
async fn malformed_frame_keeps_connection_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RelayServer::new(RelayConfig::default());
    let relay = server.relay();
    tokio::spawn(server.serve_on(listener));

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    for _ in 0..100 {
        if relay.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    ws.send(Message::Text("garbage".into())).await.unwrap();
    ws.send(Message::Text(r#"{"event":"stop-pressed"}"#.into()))
        .await
        .unwrap();

    assert!(recv_signal(&mut ws).await.is(STOP_TRIGGERED));
}
