//! WebSocket Connection Registry
//!
//! Maps server names to their live push connection and fans broadcasts out
//! to every registered server except the excluded ones.
//!
//! Every mutation, and the read-then-send sequence of a broadcast, runs
//! under the registry lock so a broadcast never observes a half-applied
//! register or disconnect.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::messages::Push;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Instructions queued for a connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Frame to deliver to the game server
    Push(Push),
    /// Close the socket
    Close,
}

/// Handle for sending frames to a specific connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Identifies this socket across re-registrations of the same name
    pub id: ConnectionId,
    /// Channel sender drained by the connection's writer task
    pub sender: mpsc::UnboundedSender<Outbound>,
    /// When the handshake completed
    pub connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh connection ID
    pub fn new(sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            connected_at: Utc::now(),
        }
    }

    fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }
}

/// Summary of a registered connection
#[derive(Debug, Clone)]
pub struct RegisteredServer {
    pub name: String,
    pub connection_id: ConnectionId,
    pub connected_at: DateTime<Utc>,
}

/// Registry of authenticated game-server connections, keyed by name
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Server name → connection handle
    connections: RwLock<HashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `handle`
    ///
    /// A connection already registered under the same name is replaced and
    /// told to close. Returns the evicted connection's ID, if any.
    pub async fn register(&self, name: &str, handle: ConnectionHandle) -> Option<ConnectionId> {
        let id = handle.id.clone();
        let previous = self
            .connections
            .write()
            .await
            .insert(name.to_string(), handle);

        match previous {
            Some(old) => {
                old.close();
                tracing::warn!(
                    server = %name,
                    connection_id = %id,
                    evicted = %old.id,
                    "Server re-registered, closing previous connection"
                );
                Some(old.id)
            }
            None => {
                tracing::info!(server = %name, connection_id = %id, "Server registered");
                None
            }
        }
    }

    /// Remove `name` if it is still bound to connection `id`
    ///
    /// Used by a connection cleaning up after itself; it must not remove a
    /// newer connection that replaced it.
    pub async fn unregister(&self, name: &str, id: &str) -> bool {
        let mut connections = self.connections.write().await;
        if connections.get(name).is_some_and(|handle| handle.id == id) {
            connections.remove(name);
            tracing::info!(server = %name, connection_id = %id, "Server unregistered");
            true
        } else {
            false
        }
    }

    /// Close and remove the connection registered under `name`
    ///
    /// A no-op when nothing is registered under that name.
    pub async fn disconnect(&self, name: &str) -> bool {
        let removed = self.connections.write().await.remove(name);
        match removed {
            Some(handle) => {
                handle.close();
                tracing::info!(server = %name, connection_id = %handle.id, "Server disconnected");
                true
            }
            None => {
                tracing::debug!(server = %name, "Disconnect requested for unregistered server");
                false
            }
        }
    }

    /// Deliver `push` to every registered server except `origin`
    pub async fn broadcast(&self, origin: &str, push: &Push) {
        self.broadcast_except(push, &[origin]).await;
    }

    /// Deliver `push` to every registered server whose name is not in `except`
    ///
    /// Delivery is fire-and-forget: a recipient whose queue is gone is
    /// skipped without affecting the others.
    pub async fn broadcast_except(&self, push: &Push, except: &[&str]) {
        let connections = self.connections.read().await;

        let mut sent_count = 0;
        for (name, handle) in connections.iter() {
            if except.contains(&name.as_str()) {
                continue;
            }
            if handle.sender.send(Outbound::Push(push.clone())).is_ok() {
                sent_count += 1;
            } else {
                tracing::debug!(server = %name, "Broadcast recipient is gone, skipping");
            }
        }

        tracing::trace!(recipients = sent_count, excluded = ?except, "Broadcast push");
    }

    /// Whether `name` is currently registered
    pub async fn contains(&self, name: &str) -> bool {
        self.connections.read().await.contains_key(name)
    }

    /// Connection ID currently bound to `name`
    pub async fn connection_id(&self, name: &str) -> Option<ConnectionId> {
        self.connections
            .read()
            .await
            .get(name)
            .map(|handle| handle.id.clone())
    }

    /// Registered servers, sorted by name
    pub async fn servers(&self) -> Vec<RegisteredServer> {
        let mut servers: Vec<_> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(name, handle)| RegisteredServer {
                name: name.clone(),
                connection_id: handle.id.clone(),
                connected_at: handle.connected_at,
            })
            .collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }

    /// Get the current connection count
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no server is registered
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
