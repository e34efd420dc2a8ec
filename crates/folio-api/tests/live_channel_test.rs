//! Live channel behavior over real sockets.
//!
//! Each test binds the router on an ephemeral port and talks to it with
//! tokio-tungstenite clients.

use std::time::Duration;

use folio_api::{router, AppState, BroadcastHub, ServerConfig};
use folio_core::{ContentAction, ContentNotifier};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_live_server(ws_enabled: bool) -> (String, BroadcastHub) {
    let hub = BroadcastHub::new();
    let config = ServerConfig {
        ws_enabled,
        ..ServerConfig::default()
    };
    let app = router(AppState::new(hub.clone(), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{}/", addr), hub)
}

/// Read the next text frame, skipping control frames.
async fn next_json(ws: &mut WsStream) -> Value {
    while let Some(msg) = ws.next().await {
        let msg = msg.expect("websocket error");
        if msg.is_text() {
            return serde_json::from_str(&msg.into_text().unwrap()).unwrap();
        }
    }
    panic!("websocket closed before a text frame arrived");
}

/// Connect and consume the welcome frame. The channel is open once it arrives.
async fn connect_open(url: &str) -> WsStream {
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "connection");
    ws
}

async fn wait_for_open_channels(hub: &BroadcastHub, expected: usize) {
    for _ in 0..100 {
        if hub.open_channels() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {} open channels, found {}",
        expected,
        hub.open_channels()
    );
}

async fn assert_silent(ws: &mut WsStream) {
    let next = tokio::time::timeout(Duration::from_millis(300), next_json(ws)).await;
    assert!(next.is_err(), "unexpected frame: {:?}", next);
}

#[tokio::test]
async fn test_welcome_is_first_frame() {
    let (url, hub) = spawn_live_server(true).await;

    let (mut ws, response) = tokio_tungstenite::connect_async(&url).await.unwrap();
    assert_eq!(response.status(), 101);

    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "connection");
    assert!(welcome["message"].is_string());
    assert_eq!(hub.open_channels(), 1);
}

#[tokio::test]
async fn test_upgrade_accepted_on_any_path() {
    let (url, hub) = spawn_live_server(true).await;

    let mut ws = connect_open(&format!("{}live/updates", url)).await;
    wait_for_open_channels(&hub, 1).await;

    ws.send(Message::Text("{}".to_string())).await.unwrap();
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "acknowledgment");
}

#[tokio::test]
async fn test_json_frame_is_acknowledged() {
    let (url, _hub) = spawn_live_server(true).await;
    let mut ws = connect_open(&url).await;

    ws.send(Message::Text(r#"{"hello":"server"}"#.to_string()))
        .await
        .unwrap();

    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "acknowledgment");
    assert!(ack["message"].is_string());
}

#[tokio::test]
async fn test_malformed_frame_is_dropped_and_channel_stays_open() {
    let (url, hub) = spawn_live_server(true).await;
    let mut ws = connect_open(&url).await;

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    assert_silent(&mut ws).await;
    assert_eq!(hub.open_channels(), 1);

    ws.send(Message::Text(r#"{"retry":true}"#.to_string()))
        .await
        .unwrap();
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "acknowledgment");
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn test_binary_json_frame_is_acknowledged() {
    let (url, _hub) = spawn_live_server(true).await;
    let mut ws = connect_open(&url).await;

    ws.send(Message::Binary(br#"[1,2,3]"#.to_vec()))
        .await
        .unwrap();

    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "acknowledgment");
}

#[tokio::test]
async fn test_broadcast_reaches_open_clients_only() {
    let (url, hub) = spawn_live_server(true).await;
    let mut ws1 = connect_open(&url).await;
    let mut ws2 = connect_open(&url).await;
    let mut ws3 = connect_open(&url).await;
    wait_for_open_channels(&hub, 3).await;

    // Third client drops and is waiting to reconnect
    ws3.close(None).await.unwrap();
    drop(ws3);
    wait_for_open_channels(&hub, 2).await;

    hub.notify_content_change("project", ContentAction::Update, json!({"id": 7}));

    for ws in [&mut ws1, &mut ws2] {
        let frame = next_json(ws).await;
        assert_eq!(frame["type"], "content_update");
        assert_eq!(frame["contentType"], "project");
        assert_eq!(frame["action"], "update");
        assert_eq!(frame["data"], json!({"id": 7}));
        assert!(frame["timestamp"].is_string());
    }

    // Reconnected client gets nothing retroactively
    let mut ws3 = connect_open(&url).await;
    assert_silent(&mut ws3).await;
}

#[tokio::test]
async fn test_broadcast_order_is_preserved() {
    let (url, hub) = spawn_live_server(true).await;
    let mut ws = connect_open(&url).await;

    for id in 0..10 {
        hub.broadcast_content_update("skill", ContentAction::Create, json!({"id": id}));
    }

    for id in 0..10 {
        let frame = next_json(&mut ws).await;
        assert_eq!(frame["data"]["id"], id);
    }
}

#[tokio::test]
async fn test_ack_and_broadcast_share_one_ordered_queue() {
    let (url, hub) = spawn_live_server(true).await;
    let mut ws = connect_open(&url).await;

    ws.send(Message::Text("{}".to_string())).await.unwrap();
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "acknowledgment");

    hub.broadcast(&json!({"type": "content_update", "contentType": "hero"}));
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["contentType"], "hero");
}

#[tokio::test]
async fn test_closed_channel_leaves_registry() {
    let (url, hub) = spawn_live_server(true).await;
    let mut ws = connect_open(&url).await;
    wait_for_open_channels(&hub, 1).await;

    ws.close(None).await.unwrap();
    drop(ws);

    wait_for_open_channels(&hub, 0).await;
    for _ in 0..100 {
        if hub.registry().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("closed channel still registered");
}

#[tokio::test]
async fn test_upgrade_refused_when_disabled() {
    let (url, hub) = spawn_live_server(false).await;

    assert!(tokio_tungstenite::connect_async(&url).await.is_err());
    assert!(tokio_tungstenite::connect_async(format!("{}live", url))
        .await
        .is_err());
    assert_eq!(hub.open_channels(), 0);
}
