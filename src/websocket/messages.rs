//! WebSocket Message Types
//!
//! Defines the wire format spoken between game servers and the bridge:
//! handshake frames, typed event requests, replies and broadcast pushes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event types the dispatcher knows how to route
pub const KNOWN_TYPES: [&str; 7] = [
    "message",
    "server_pid",
    "server_startup",
    "server_shutdown",
    "player_info",
    "player_joined",
    "player_left",
];

/// First frame sent by a game server on either channel
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HandshakeRequest {
    /// Shared secret
    #[serde(default)]
    pub token: Option<String>,
    /// Name the connection binds to
    #[serde(default)]
    pub name: Option<String>,
}

/// Answer to a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HandshakeReply {
    pub success: bool,
}

/// Event sent by a game server on the event channel
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Request {
    /// Relay a raw message to the chat group
    Message {
        #[serde(default)]
        message: String,
    },
    /// Report the game server's process id
    ServerPid {
        #[serde(default, deserialize_with = "lenient_pid")]
        pid: Option<u32>,
    },
    /// The game server finished starting
    ServerStartup {
        #[serde(default, deserialize_with = "lenient_pid")]
        pid: Option<u32>,
    },
    /// The game server is stopping
    ServerShutdown {},
    /// A player said something in game
    PlayerInfo { player: String, message: String },
    /// A player joined the game server
    PlayerJoined { player: String },
    /// A player left the game server
    PlayerLeft { player: String },
}

impl Request {
    /// Wire name of this request's type
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Message { .. } => "message",
            Request::ServerPid { .. } => "server_pid",
            Request::ServerStartup { .. } => "server_startup",
            Request::ServerShutdown {} => "server_shutdown",
            Request::PlayerInfo { .. } => "player_info",
            Request::PlayerJoined { .. } => "player_joined",
            Request::PlayerLeft { .. } => "player_left",
        }
    }
}

/// Accept any JSON for a pid, keeping it only when it fits a `u32`
fn lenient_pid<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().and_then(|pid| u32::try_from(pid).ok()))
}

/// Untyped envelope used to tell malformed frames from unknown types
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Decode an inbound event envelope
pub fn decode_request(text: &str) -> Result<Request, CodecError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    if !KNOWN_TYPES.contains(&raw.kind.as_str()) {
        return Err(CodecError::UnknownType(raw.kind));
    }
    Ok(serde_json::from_str(text)?)
}

/// Data returned by a handler that succeeded
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Startup acknowledgement carrying the "sync all game messages" flag
    Startup { flag: bool },
    /// Plain acknowledgement, `{}` on the wire
    Empty {},
}

impl ResponseData {
    /// Shorthand for `{}`
    pub fn empty() -> Self {
        ResponseData::Empty {}
    }
}

/// Reply sent for every request on the event channel
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Reply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl Reply {
    /// Successful reply with handler data
    pub fn ok(data: ResponseData) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }

    /// Failed reply, no data
    pub fn failure() -> Self {
        Self {
            success: false,
            data: None,
        }
    }
}

impl From<Option<ResponseData>> for Reply {
    fn from(result: Option<ResponseData>) -> Self {
        match result {
            Some(data) => Reply::ok(data),
            None => Reply::failure(),
        }
    }
}

/// Frames pushed to registered game servers
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Push {
    /// Text to show in game, originating from another server
    Message {
        /// Server the text came from
        server: String,
        /// Player who said it, absent for server notices
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<String>,
        message: String,
    },
}

impl Push {
    /// A notice without a player attached
    pub fn notice(server: &str, message: impl Into<String>) -> Self {
        Push::Message {
            server: server.to_string(),
            player: None,
            message: message.into(),
        }
    }

    /// A chat line spoken by a player
    pub fn chat(server: &str, player: &str, message: impl Into<String>) -> Self {
        Push::Message {
            server: server.to_string(),
            player: Some(player.to_string()),
            message: message.into(),
        }
    }
}

/// First frame on the heartbeat channel after the handshake
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LivenessReport {
    /// `{"type": ..., "data": {"pid": n}}`
    Wrapped { data: PidPayload },
    /// `{"pid": n}`
    Bare(PidPayload),
}

/// Process id carried by a liveness report
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PidPayload {
    #[serde(default)]
    pub pid: Option<u32>,
}

impl LivenessReport {
    /// Process id carried by the report, if any
    pub fn pid(&self) -> Option<u32> {
        match self {
            LivenessReport::Wrapped { data } | LivenessReport::Bare(data) => data.pid,
        }
    }
}

/// Encode any outbound frame
pub fn encode<T: Serialize>(frame: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Errors produced while decoding or encoding frames
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Unsupported frame kind")]
    NotText,
}

/// Parse a frame body as `T`
pub fn decode<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Lift a JSON value into a liveness report, tolerating anything
pub fn liveness_from_value(value: Value) -> LivenessReport {
    serde_json::from_value(value).unwrap_or(LivenessReport::Bare(PidPayload::default()))
}
