//! Application State
//!
//! Shared state accessible by every connection task and HTTP handler.
//! Created once at startup and passed explicitly; wrapped in Arc for
//! sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::api::error::ApiError;
use crate::chat::{ChatSink, NullChatSink, OneBotClient};
use crate::config::{BridgeConfig, Config, ServerConfig};
use crate::servers::{ServerStore, ServerWatcher};
use crate::websocket::ConnectionRegistry;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Live game-server connections, keyed by server name
    pub registry: Arc<ConnectionRegistry>,
    /// Where relayed messages are delivered
    pub chat: Arc<dyn ChatSink>,
    /// Known server names
    pub servers: Arc<ServerStore>,
    /// Process ids of running servers
    pub watcher: Arc<ServerWatcher>,
    /// Relay toggles and shared token
    pub bridge: Arc<BridgeConfig>,
    /// Listener settings
    pub server: Arc<ServerConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state around an explicit chat sink and server store
    pub fn new(config: &Config, chat: Arc<dyn ChatSink>, servers: ServerStore) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            chat,
            servers: Arc::new(servers),
            watcher: Arc::new(ServerWatcher::new()),
            bridge: Arc::new(config.bridge.clone()),
            server: Arc::new(config.server.clone()),
            start_time: Instant::now(),
        }
    }

    /// Build the production state: OneBot chat client and on-disk store
    pub async fn from_config(config: &Config) -> Result<Self, ApiError> {
        let chat: Arc<dyn ChatSink> = if config.chat.enabled {
            let client = OneBotClient::new(config.chat.onebot())?;
            tracing::info!(
                api_url = %client.config().api_url,
                groups = ?client.config().group_ids,
                "Chat relay enabled"
            );
            Arc::new(client)
        } else {
            tracing::info!("Chat relay disabled");
            Arc::new(NullChatSink)
        };

        let servers = ServerStore::load(config.storage.data_path()).await;

        Ok(Self::new(config, chat, servers))
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
