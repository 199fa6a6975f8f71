//! Viewer against a live relay.

use std::sync::Arc;
use std::time::Duration;

use arena_relay::{Relay, RelayConfig, RelayServer, HTTP_CLIENT};
use arena_session::{ControlButton, ControlMode, HostView, RemoteSignal, RenderSurface, STOP_PRESSED};
use arena_viewer::{run, run_with_commands, RunOutcome, ViewerCommand, ViewerConfig};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

async fn start_relay() -> (Arc<Relay>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RelayServer::new(RelayConfig::default());
    let relay = server.relay();
    tokio::spawn(server.serve_on(listener));
    (relay, format!("ws://{addr}/ws"))
}

fn view() -> HostView {
    let mut view = HostView::new();
    view.mount(RenderSurface::new("scene-container", 1280, 720));
    view
}

async fn wait_for_clients(relay: &Relay, clients: usize) {
    for _ in 0..200 {
        if relay.client_count() == clients {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // The viewer subscribes to stop right after connecting
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn relay_stop_ends_session() {
    let (relay, url) = start_relay().await;
    let view = view();
    let config = ViewerConfig::default().with_relay_url(url).with_fps(100);

    let moderator = async {
        wait_for_clients(&relay, 1).await;
        assert_ok!(relay.handle(HTTP_CLIENT, RemoteSignal::new(STOP_PRESSED)).await);
    };

    let (outcome, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(run(&view, &config), moderator)
    })
    .await
    .expect("viewer did not stop");

    assert_eq!(assert_ok!(outcome), RunOutcome::RemoteStop);
}

#[tokio::test]
async fn moderator_commands_reach_relay_and_stop_session() {
    let (relay, url) = start_relay().await;
    let view = view();
    let config = ViewerConfig::default()
        .with_relay_url(url)
        .with_control_mode(ControlMode::Moderator);
    let (commands_tx, commands) = mpsc::unbounded_channel();

    let moderator = async {
        wait_for_clients(&relay, 1).await;
        commands_tx
            .send(ViewerCommand::SubmitMetadata(json!({"fly": "cs-1"})))
            .unwrap();
        for _ in 0..200 {
            if relay.metadata().await == json!({"fly": "cs-1"}) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        commands_tx
            .send(ViewerCommand::Press(ControlButton::Stop))
            .unwrap();
    };

    let (outcome, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(run_with_commands(&view, &config, commands), moderator)
    })
    .await
    .expect("viewer did not stop");

    assert_eq!(assert_ok!(outcome), RunOutcome::RemoteStop);
    assert_eq!(relay.metadata().await, json!({"fly": "cs-1"}));
    assert_eq!(relay.status().await.relayed, 1);
}
