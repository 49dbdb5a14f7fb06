//! Data Transfer Objects
//!
//! Response types for the HTTP status endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    /// Crate version
    pub version: String,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Servers currently holding a heartbeat connection
    pub connected_servers: Vec<ConnectedServer>,
    /// Every server name ever seen
    pub known_servers: Vec<String>,
}

/// A server with a live connection
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectedServer {
    pub name: String,
    pub connected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}
