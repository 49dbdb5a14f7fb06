//! OneBot HTTP Client
//!
//! Sends group messages through a OneBot v11 compatible bot
//! (`POST {api_url}/send_group_msg`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::ChatSink;

/// Configuration for the OneBot client
#[derive(Debug, Clone)]
pub struct OneBotConfig {
    /// Base URL of the bot's HTTP API (e.g., "http://127.0.0.1:5700")
    pub api_url: String,
    /// Bearer token expected by the bot, if any
    pub access_token: Option<String>,
    /// Groups every relayed message is sent to
    pub group_ids: Vec<i64>,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5700".to_string(),
            access_token: None,
            group_ids: Vec::new(),
            request_timeout_ms: 5000,
        }
    }
}

/// OneBot REST API client
pub struct OneBotClient {
    client: Client,
    config: OneBotConfig,
}

impl OneBotClient {
    /// Create a new client with the given configuration
    pub fn new(config: OneBotConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &OneBotConfig {
        &self.config
    }

    /// Send `text` to a single group
    pub async fn send_group_message(&self, group_id: i64, text: &str) -> Result<(), ChatError> {
        let url = format!(
            "{}/send_group_msg",
            self.config.api_url.trim_end_matches('/')
        );
        let body = SendGroupMessage {
            group_id,
            message: text,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ChatError::Timeout
            } else if e.is_connect() {
                ChatError::Unavailable
            } else {
                ChatError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        let result: ActionResponse = response.json().await?;
        if result.is_ok() {
            Ok(())
        } else {
            Err(ChatError::Rejected {
                retcode: result.retcode,
                message: result.message.or(result.wording).unwrap_or_default(),
            })
        }
    }

    /// Send `text` to every configured group
    pub async fn broadcast(&self, text: &str) -> Result<(), ChatError> {
        if self.config.group_ids.is_empty() {
            return Err(ChatError::NoGroups);
        }
        for &group_id in &self.config.group_ids {
            self.send_group_message(group_id, text).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatSink for OneBotClient {
    async fn send_message(&self, text: &str) -> bool {
        match self.broadcast(text).await {
            Ok(()) => {
                tracing::debug!(text = %text, "Relayed message to chat");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Chat delivery failed");
                false
            }
        }
    }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
struct SendGroupMessage<'a> {
    group_id: i64,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    retcode: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    wording: Option<String>,
}

impl ActionResponse {
    fn is_ok(&self) -> bool {
        match (&self.status, self.retcode) {
            (Some(status), _) => status == "ok",
            (None, Some(code)) => code == 0,
            (None, None) => false,
        }
    }
}

// ============================================
// Errors
// ============================================

/// Errors that can occur when talking to the chat bot
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat bot unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Bot rejected the message (retcode {retcode:?}): {message}")]
    Rejected {
        retcode: Option<i64>,
        message: String,
    },

    #[error("Request timeout")]
    Timeout,

    #[error("No chat groups configured")]
    NoGroups,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    async fn spawn_bot(reply: serde_json::Value) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let app = Router::new().route(
            "/send_group_msg",
            post(move |Json(body): Json<serde_json::Value>| {
                let seen = Arc::clone(&seen_clone);
                let reply = reply.clone();
                async move {
                    seen.lock().unwrap().push(body);
                    Json(reply)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), seen)
    }

    fn config(api_url: String, group_ids: Vec<i64>) -> OneBotConfig {
        OneBotConfig {
            api_url,
            group_ids,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = OneBotConfig::default();
        assert_eq!(config.api_url, "http://127.0.0.1:5700");
        assert!(config.group_ids.is_empty());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_action_response_status() {
        let ok: ActionResponse = serde_json::from_str(r#"{"status": "ok", "retcode": 0}"#).unwrap();
        assert!(ok.is_ok());

        let failed: ActionResponse =
            serde_json::from_str(r#"{"status": "failed", "retcode": 100}"#).unwrap();
        assert!(!failed.is_ok());

        let code_only: ActionResponse = serde_json::from_str(r#"{"retcode": 0}"#).unwrap();
        assert!(code_only.is_ok());

        let empty: ActionResponse = serde_json::from_str("{}").unwrap();
        assert!(!empty.is_ok());
    }

    #[tokio::test]
    async fn test_send_to_every_group() {
        let (url, seen) = spawn_bot(serde_json::json!({"status": "ok", "retcode": 0})).await;
        let client = OneBotClient::new(config(url, vec![111, 222])).unwrap();

        assert!(client.send_message("Server [S1] is now online.").await);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0]["group_id"], 111);
        assert_eq!(seen[1]["group_id"], 222);
        assert_eq!(seen[0]["message"], "Server [S1] is now online.");
    }

    #[tokio::test]
    async fn test_rejected_by_bot() {
        let (url, _seen) = spawn_bot(serde_json::json!({"status": "failed", "retcode": 100})).await;
        let client = OneBotClient::new(config(url, vec![111])).unwrap();

        let result = client.broadcast("hi").await;
        assert!(matches!(result, Err(ChatError::Rejected { .. })));
        assert!(!client.send_message("hi").await);
    }

    #[tokio::test]
    async fn test_no_groups_configured() {
        let client = OneBotClient::new(OneBotConfig::default()).unwrap();
        assert!(matches!(client.broadcast("hi").await, Err(ChatError::NoGroups)));
    }

    #[tokio::test]
    async fn test_unreachable_bot() {
        // port 9 (discard) is not expected to host a bot
        let client = OneBotClient::new(config("http://127.0.0.1:9".to_string(), vec![1])).unwrap();
        assert!(!client.send_message("hi").await);
    }
}
