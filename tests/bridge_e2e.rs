//! End-to-end tests using real WebSocket clients against a bound server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use server_bridge::api::{bind, serve_on};
use server_bridge::{AppState, ChatSink, Config, ServerStore};

const TIMEOUT: Duration = Duration::from_secs(5);
const TOKEN: &str = "secret";

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// ── Recording chat sink ──

struct RecordingChat {
    succeed: bool,
    sent: Mutex<Vec<String>>,
}

impl RecordingChat {
    fn new(succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            succeed,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for RecordingChat {
    async fn send_message(&self, text: &str) -> bool {
        self.sent.lock().unwrap().push(text.to_string());
        self.succeed
    }
}

// ── Harness ──

fn test_config() -> Config {
    let mut config = Config::default();
    config.bridge.token = TOKEN.to_string();
    config.server.heartbeat_interval_secs = 1;
    config
}

/// Boot a server on an ephemeral port and return its address and state
async fn boot(config: Config, chat: Arc<RecordingChat>) -> (SocketAddr, AppState) {
    let state = AppState::new(&config, chat, ServerStore::in_memory());
    let listener = bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_state = state.clone();
    tokio::spawn(async move {
        serve_on(listener, server_state, std::future::pending()).await.unwrap();
    });

    (addr, state)
}

fn event_url(addr: SocketAddr) -> String {
    format!("ws://{}/websocket/bot", addr)
}

fn heartbeat_url(addr: SocketAddr) -> String {
    format!("ws://{}/websocket/minecraft", addr)
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text frame as JSON, `None` if the server closed the socket
async fn next_json(ws: &mut WsStream) -> Option<Value> {
    loop {
        let frame = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame");
        match frame {
            Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).unwrap()),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(other)) => panic!("unexpected frame: {:?}", other),
        }
    }
}

/// Assert nothing arrives within a short window
async fn assert_silent(ws: &mut WsStream) {
    let result = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "expected no frame, got {:?}", result);
}

async fn connect(url: &str, name: &str) -> WsStream {
    let (mut ws, _) = connect_async(url).await.unwrap();
    send_json(&mut ws, json!({"token": TOKEN, "name": name})).await;
    assert_eq!(next_json(&mut ws).await, Some(json!({"success": true})));
    ws
}

/// Heartbeat connection that has sent its liveness report and is registered
async fn connect_heartbeat(addr: SocketAddr, state: &AppState, name: &str, pid: u32) -> WsStream {
    let mut ws = connect(&heartbeat_url(addr), name).await;
    send_json(&mut ws, json!({"pid": pid})).await;
    wait_for(|| async { state.watcher.get(name).await == Some(pid) }).await;
    ws
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(TIMEOUT, async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ── Handshake ──

#[tokio::test]
async fn wrong_token_is_rejected_and_closed() {
    let (addr, state) = boot(test_config(), RecordingChat::new(true)).await;

    let (mut ws, _) = connect_async(heartbeat_url(addr)).await.unwrap();
    send_json(&mut ws, json!({"token": "wrong", "name": "S1"})).await;

    assert_eq!(next_json(&mut ws).await, Some(json!({"success": false})));
    assert_eq!(next_json(&mut ws).await, None);
    assert!(!state.registry.contains("S1").await);
}

#[tokio::test]
async fn wrong_token_without_name_is_rejected() {
    let (addr, _state) = boot(test_config(), RecordingChat::new(true)).await;

    let (mut ws, _) = connect_async(event_url(addr)).await.unwrap();
    send_json(&mut ws, json!({"token": "wrong"})).await;

    assert_eq!(next_json(&mut ws).await, Some(json!({"success": false})));
    assert_eq!(next_json(&mut ws).await, None);
}

#[tokio::test]
async fn heartbeat_handshake_registers_name() {
    let (addr, state) = boot(test_config(), RecordingChat::new(true)).await;

    let _ws = connect(&heartbeat_url(addr), "S1").await;

    wait_for(|| async { state.registry.contains("S1").await }).await;
    assert!(state.servers.contains("S1").await);
}

#[tokio::test]
async fn second_heartbeat_under_same_name_evicts_first() {
    let (addr, state) = boot(test_config(), RecordingChat::new(true)).await;

    let mut first = connect_heartbeat(addr, &state, "S1", 1).await;
    let first_id = state.registry.connection_id("S1").await.unwrap();

    let _second = connect_heartbeat(addr, &state, "S1", 2).await;
    wait_for(|| async { state.registry.connection_id("S1").await.as_deref() != Some(first_id.as_str()) })
        .await;

    assert_eq!(next_json(&mut first).await, None);

    // the evicted connection's cleanup leaves the replacement registered
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(state.registry.contains("S1").await);
    assert_eq!(state.registry.len().await, 1);
}

#[tokio::test]
async fn closed_heartbeat_is_unregistered() {
    let (addr, state) = boot(test_config(), RecordingChat::new(true)).await;

    let mut ws = connect_heartbeat(addr, &state, "S1", 10).await;
    ws.close(None).await.unwrap();

    wait_for(|| async { !state.registry.contains("S1").await }).await;
}

// ── Dispatcher ──

#[tokio::test]
async fn unknown_type_keeps_connection_open() {
    let (addr, state) = boot(test_config(), RecordingChat::new(true)).await;
    let mut ws = connect(&event_url(addr), "S1").await;

    send_json(&mut ws, json!({"type": "teleport", "data": {}})).await;
    assert_eq!(next_json(&mut ws).await, Some(json!({"success": false})));

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    assert_eq!(next_json(&mut ws).await, Some(json!({"success": false})));

    send_json(&mut ws, json!({"type": "server_pid", "data": {"pid": 321}})).await;
    assert_eq!(
        next_json(&mut ws).await,
        Some(json!({"success": true, "data": {}}))
    );
    assert_eq!(state.watcher.get("S1").await, Some(321));
}

#[tokio::test]
async fn replies_follow_request_order() {
    let chat = RecordingChat::new(true);
    let (addr, _state) = boot(test_config(), chat.clone()).await;
    let mut ws = connect(&event_url(addr), "S1").await;

    for i in 0..5 {
        send_json(&mut ws, json!({"type": "message", "data": {"message": format!("m{}", i)}})).await;
    }
    for _ in 0..5 {
        assert_eq!(
            next_json(&mut ws).await,
            Some(json!({"success": true, "data": {}}))
        );
    }
    assert_eq!(chat.sent(), vec!["m0", "m1", "m2", "m3", "m4"]);
}

// ── Scenarios ──

#[tokio::test]
async fn startup_notifies_other_servers_and_returns_flag() {
    let mut config = test_config();
    config.bridge.broadcast_server = true;
    config.bridge.sync_all_game_message = true;
    let chat = RecordingChat::new(true);
    let (addr, state) = boot(config, chat.clone()).await;

    let mut s1_heartbeat = connect_heartbeat(addr, &state, "S1", 100).await;
    let mut s2_heartbeat = connect_heartbeat(addr, &state, "S2", 200).await;
    let mut s1_events = connect(&event_url(addr), "S1").await;

    send_json(&mut s1_events, json!({"type": "server_startup", "data": {"pid": 100}})).await;

    assert_eq!(
        next_json(&mut s1_events).await,
        Some(json!({"success": true, "data": {"flag": true}}))
    );
    assert!(state.registry.contains("S1").await);
    assert_eq!(
        next_json(&mut s2_heartbeat).await,
        Some(json!({"type": "message", "data": {"server": "S1", "message": "Server opened!"}}))
    );
    assert_silent(&mut s1_heartbeat).await;
    assert_eq!(chat.sent(), vec!["Server [S1] is now online."]);
}

#[tokio::test]
async fn player_join_with_failed_chat_still_broadcasts() {
    let mut config = test_config();
    config.bridge.broadcast_player = true;
    config.bridge.sync_message_between_servers = true;
    config.bridge.bot_prefix = "BOT_".to_string();
    let (addr, state) = boot(config, RecordingChat::new(false)).await;

    let mut s2_heartbeat = connect_heartbeat(addr, &state, "S2", 2).await;
    let mut s1_events = connect(&event_url(addr), "S1").await;

    send_json(&mut s1_events, json!({"type": "player_joined", "data": {"player": "Steve"}})).await;

    assert_eq!(next_json(&mut s1_events).await, Some(json!({"success": false})));
    assert_eq!(
        next_json(&mut s2_heartbeat).await,
        Some(json!({"type": "message", "data": {"server": "S1", "message": "Player Steve joined the game."}}))
    );
}

#[tokio::test]
async fn player_chat_is_relayed_between_servers() {
    let (addr, state) = boot(test_config(), RecordingChat::new(true)).await;

    let mut s1_heartbeat = connect_heartbeat(addr, &state, "S1", 1).await;
    let mut s2_heartbeat = connect_heartbeat(addr, &state, "S2", 2).await;
    let mut s3_heartbeat = connect_heartbeat(addr, &state, "S3", 3).await;
    let mut s1_events = connect(&event_url(addr), "S1").await;

    send_json(
        &mut s1_events,
        json!({"type": "player_info", "data": {"player": "Alex", "message": "gg"}}),
    )
    .await;

    assert_eq!(
        next_json(&mut s1_events).await,
        Some(json!({"success": true, "data": {}}))
    );
    let expected = json!({"type": "message", "data": {"server": "S1", "player": "Alex", "message": "gg"}});
    assert_eq!(next_json(&mut s2_heartbeat).await, Some(expected.clone()));
    assert_eq!(next_json(&mut s3_heartbeat).await, Some(expected));
    assert_silent(&mut s1_heartbeat).await;
}

#[tokio::test]
async fn shutdown_disconnects_origin_heartbeat() {
    let chat = RecordingChat::new(true);
    let (addr, state) = boot(test_config(), chat.clone()).await;

    let mut s1_heartbeat = connect_heartbeat(addr, &state, "S1", 1).await;
    let mut s2_heartbeat = connect_heartbeat(addr, &state, "S2", 2).await;
    let mut s1_events = connect(&event_url(addr), "S1").await;

    send_json(&mut s1_events, json!({"type": "server_shutdown", "data": {"name": "S1"}})).await;

    assert_eq!(
        next_json(&mut s1_events).await,
        Some(json!({"success": true, "data": {}}))
    );
    assert_eq!(next_json(&mut s1_heartbeat).await, None);
    assert!(!state.registry.contains("S1").await);
    assert_eq!(state.watcher.get("S1").await, None);
    assert_eq!(
        next_json(&mut s2_heartbeat).await,
        Some(json!({"type": "message", "data": {"server": "S1", "message": "Server closed!"}}))
    );
    assert_eq!(chat.sent(), vec!["Server [S1] has shut down."]);
}

#[tokio::test]
async fn shutdown_for_unregistered_name_is_noop() {
    let mut config = test_config();
    config.bridge.broadcast_server = false;
    let (addr, state) = boot(config, RecordingChat::new(true)).await;

    let _s2_heartbeat = connect_heartbeat(addr, &state, "S2", 2).await;
    let mut ghost_events = connect(&event_url(addr), "ghost").await;

    send_json(&mut ghost_events, json!({"type": "server_shutdown", "data": {}})).await;

    assert_eq!(
        next_json(&mut ghost_events).await,
        Some(json!({"success": true, "data": {}}))
    );
    assert!(state.registry.contains("S2").await);
}
