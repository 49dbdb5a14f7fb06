//! Chat Platform Delivery
//!
//! The bridge relays text to a chat group through a [`ChatSink`]. The
//! production sink talks to a OneBot-compatible bot over HTTP; delivery is
//! attempted once and reported as a plain success flag.

mod onebot;

pub use onebot::{ChatError, OneBotClient, OneBotConfig};

use async_trait::async_trait;

/// Destination for messages relayed to the chat platform
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Deliver `text`, returning whether it reached the chat group
    async fn send_message(&self, text: &str) -> bool;
}

/// Sink used when chat delivery is disabled
///
/// Messages are dropped and reported as delivered, so relay rules that
/// depend on chat delivery behave as if the chat group accepted them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullChatSink;

#[async_trait]
impl ChatSink for NullChatSink {
    async fn send_message(&self, text: &str) -> bool {
        tracing::debug!(text = %text, "Chat delivery disabled, dropping message");
        true
    }
}
