//! # Server Bridge
//!
//! Bidirectional bridge between independently running game servers and a
//! chat group. Every game server connects over WebSocket, authenticates
//! with a shared token, and reports chat lines, player joins/leaves and its
//! own startup/shutdown. The bridge relays those events to the chat group
//! and re-broadcasts them to every *other* connected server, so all servers
//! share one chat space.
//!
//! ## Modules
//!
//! - [`websocket`]: Wire protocol, handshake, connection registry and event handlers
//! - [`chat`]: Delivery to the chat platform
//! - [`servers`]: Known server names and process bookkeeping
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use server_bridge::{serve, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (config, _source) = Config::load_default();
//!     let state = AppState::from_config(&config).await?;
//!
//!     // Runs until Ctrl+C
//!     serve(state).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chat;
pub mod config;
pub mod servers;
pub mod websocket;

pub use api::{build_router, serve, serve_on, ApiError, AppState};

pub use chat::{ChatError, ChatSink, NullChatSink, OneBotClient, OneBotConfig};

pub use config::{
    BridgeConfig, ChatConfig, Config, ConfigError, ConfigSource, LoggingConfig, ServerConfig,
};

pub use servers::{ServerStore, ServerWatcher};

pub use websocket::{
    ConnectionHandle, ConnectionRegistry, HandshakeRequest, Outbound, Push, Reply, Request,
    ResponseData,
};
