//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and runs the two channel kinds:
//!
//! - **Event channel**: handshake, then a strictly sequential
//!   request/reply loop until the socket closes.
//! - **Heartbeat channel**: handshake, registration in the connection
//!   registry, one liveness report, then an idle wait that periodically
//!   checks the socket is still open. Broadcast pushes from other servers
//!   are written to this channel.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::events::handle_request;
use super::handshake;
use super::messages::{decode, decode_request, encode, liveness_from_value, Reply};
use super::registry::{ConnectionHandle, ConnectionId, Outbound};
use crate::api::AppState;

/// Sent when a reply cannot be serialized
const FAILURE_FRAME: &str = r#"{"success":false}"#;

/// Event channel upgrade handler
pub async fn event_channel_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_event_socket(socket, state))
}

/// Heartbeat channel upgrade handler
pub async fn heartbeat_channel_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_heartbeat_socket(socket, state))
}

/// Handle an established event channel connection
async fn handle_event_socket(mut socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("Event channel connection received, verifying identity");

    let Ok(name) = handshake::perform(&mut socket, &state.bridge.token).await else {
        return;
    };

    while let Some(result) = socket.recv().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                tracing::info!(server = %name, error = %e, "Event channel connection lost");
                break;
            }
        };

        let reply = match message {
            Message::Text(text) => dispatch(&state, &name, &text).await,
            Message::Binary(_) => {
                tracing::warn!(server = %name, "Binary frames are not supported");
                Reply::failure()
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        };

        let text = encode(&reply).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize reply");
            FAILURE_FRAME.to_string()
        });
        if let Err(e) = socket.send(Message::Text(text)).await {
            tracing::info!(server = %name, error = %e, "Event channel connection lost");
            break;
        }
    }

    tracing::info!(server = %name, "Event channel closed");
}

/// Decode one frame, run its handler and build the reply
///
/// Malformed frames and unknown types are answered with a failure and
/// never end the connection.
pub async fn dispatch(state: &AppState, origin: &str, text: &str) -> Reply {
    let request = match decode_request(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(server = %origin, error = %e, data = %text, "Received data that could not be parsed");
            return Reply::failure();
        }
    };

    let kind = request.kind();
    tracing::debug!(server = %origin, kind, "Received request");

    let result = handle_request(state, origin, request).await;
    if result.is_none() {
        tracing::warn!(server = %origin, kind, "Request failed");
    }
    Reply::from(result)
}

/// Handle an established heartbeat channel connection
async fn handle_heartbeat_socket(mut socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("Heartbeat channel connection received, verifying identity");

    let Ok(name) = handshake::perform(&mut socket, &state.bridge.token).await else {
        return;
    };

    state.servers.append(&name).await;

    let (tx, rx) = mpsc::unbounded_channel::<Outbound>();
    let handle = ConnectionHandle::new(tx);
    let connection_id = handle.id.clone();
    state.registry.register(&name, handle).await;

    if read_liveness_report(&mut socket, &state, &name).await {
        idle_until_closed(socket, rx, &state, &name, &connection_id).await;
    }

    state.registry.unregister(&name, &connection_id).await;
    tracing::info!(server = %name, connection_id = %connection_id, "Heartbeat connection closed");
}

/// Consume the first frame after the handshake and record the reported pid
///
/// Returns false if the socket closed instead.
async fn read_liveness_report(socket: &mut WebSocket, state: &AppState, name: &str) -> bool {
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                match decode::<serde_json::Value>(&text).map(liveness_from_value) {
                    Ok(report) => match report.pid() {
                        Some(pid) => state.watcher.append(name, pid).await,
                        None => tracing::debug!(server = %name, "Liveness report without pid"),
                    },
                    Err(e) => {
                        tracing::debug!(server = %name, error = %e, "Unparseable liveness report")
                    }
                }
                return true;
            }
            Some(Ok(Message::Binary(_))) => return true,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => return false,
            Some(Err(e)) => {
                tracing::info!(server = %name, error = %e, "Heartbeat connection lost");
                return false;
            }
        }
    }
}

/// Forward pushes to the socket and wait, checking on a fixed interval,
/// until the socket is no longer open
async fn idle_until_closed(
    socket: WebSocket,
    rx: mpsc::UnboundedReceiver<Outbound>,
    state: &AppState,
    name: &str,
    connection_id: &ConnectionId,
) {
    let (sender, receiver) = socket.split();

    let send_task = tokio::spawn(write_pushes(sender, rx, name.to_string()));
    let recv_task = tokio::spawn(watch_for_close(receiver, name.to_string()));

    let mut interval = tokio::time::interval(state.server.heartbeat_interval());
    // the first tick completes immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        if send_task.is_finished() || recv_task.is_finished() {
            break;
        }
        tracing::trace!(server = %name, connection_id = %connection_id, "Heartbeat connection alive");
    }

    send_task.abort();
    recv_task.abort();
}

/// Drain the connection's queue onto the socket until told to close
async fn write_pushes(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    name: String,
) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Push(push) => match encode(&push) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        tracing::debug!(server = %name, "WebSocket send failed, closing connection");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize push");
                }
            },
            Outbound::Close => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

/// Discard inbound frames, returning once the peer has gone away
async fn watch_for_close(mut receiver: SplitStream<WebSocket>, name: String) {
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                tracing::debug!(server = %name, "Client requested close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(server = %name, error = %e, "WebSocket receive error");
                break;
            }
        }
    }
}
