//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chat::OneBotConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Route of the event channel
    #[serde(default = "default_event_path")]
    pub event_path: String,

    /// Route of the heartbeat channel
    #[serde(default = "default_heartbeat_path")]
    pub heartbeat_path: String,

    /// How often an idle heartbeat connection checks that its socket is open
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_event_path() -> String {
    "/websocket/bot".to_string()
}

fn default_heartbeat_path() -> String {
    "/websocket/minecraft".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            event_path: default_event_path(),
            heartbeat_path: default_heartbeat_path(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

/// Relay behaviour shared by every connection
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Shared secret every game server must present
    #[serde(default)]
    pub token: String,

    /// Announce server startup/shutdown to chat and other servers
    #[serde(default = "default_true")]
    pub broadcast_server: bool,

    /// Announce player join/leave
    #[serde(default = "default_true")]
    pub broadcast_player: bool,

    /// Relay every in-game chat line to the chat group
    #[serde(default)]
    pub sync_all_game_message: bool,

    /// Relay in-game chat between servers
    #[serde(default = "default_true")]
    pub sync_message_between_servers: bool,

    /// Player names starting with this prefix are treated as bots
    #[serde(default)]
    pub bot_prefix: String,
}

fn default_true() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            broadcast_server: true,
            broadcast_player: true,
            sync_all_game_message: false,
            sync_message_between_servers: true,
            bot_prefix: String::new(),
        }
    }
}

impl BridgeConfig {
    /// Whether `player` looks like a bot, compared case-insensitively
    pub fn is_bot(&self, player: &str) -> bool {
        !self.bot_prefix.is_empty()
            && player
                .to_uppercase()
                .starts_with(&self.bot_prefix.to_uppercase())
    }
}

/// Chat bot connection
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_chat_api_url")]
    pub api_url: String,

    pub access_token: Option<String>,

    #[serde(default)]
    pub group_ids: Vec<i64>,

    #[serde(default = "default_chat_timeout")]
    pub request_timeout_ms: u64,
}

fn default_chat_api_url() -> String {
    "http://127.0.0.1:5700".to_string()
}

fn default_chat_timeout() -> u64 {
    5000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_chat_api_url(),
            access_token: None,
            group_ids: Vec::new(),
            request_timeout_ms: default_chat_timeout(),
        }
    }
}

impl ChatConfig {
    pub fn onebot(&self) -> OneBotConfig {
        OneBotConfig {
            api_url: self.api_url.clone(),
            access_token: self.access_token.clone().filter(|t| !t.is_empty()),
            group_ids: self.group_ids.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

/// Where the bridge keeps its files
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("server-bridge").to_string_lossy().to_string())
        .unwrap_or_else(|| "./server_bridge_data".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// Data directory with a leading `~` expanded to the home directory
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Returns where the configuration came from, for logging once tracing
    /// is initialised.
    pub fn load_default() -> (Self, ConfigSource) {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("server-bridge").join("config.toml")),
            Some(PathBuf::from("/etc/server-bridge/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first existing file among `paths` that parses
    pub fn load_first(paths: &[PathBuf]) -> (Self, ConfigSource) {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    let source = ConfigSource::File {
                        path: path.clone(),
                        skipped,
                    };
                    return (config, source);
                }
                Err(e) => skipped.push(e),
            }
        }

        (Self::from_env(), ConfigSource::Defaults { skipped })
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("BRIDGE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("BRIDGE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Some(token) = lookup("BRIDGE_TOKEN") {
            self.bridge.token = token;
        }

        if let Some(url) = lookup("BRIDGE_CHAT_API_URL") {
            self.chat.api_url = url;
        }
        if let Some(token) = lookup("BRIDGE_CHAT_ACCESS_TOKEN") {
            self.chat.access_token = Some(token);
        }

        if let Some(data_dir) = lookup("BRIDGE_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Some(level) = lookup("BRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("BRIDGE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Where [`Config::load_default`] found its configuration
#[derive(Debug)]
pub enum ConfigSource {
    /// Loaded from `path`; earlier candidates in `skipped` failed to load
    File { path: PathBuf, skipped: Vec<ConfigError> },
    /// No usable file, defaults with environment overrides
    Defaults { skipped: Vec<ConfigError> },
}

impl ConfigSource {
    /// Report the outcome through tracing
    pub fn log(&self) {
        let skipped = match self {
            ConfigSource::File { skipped, .. } | ConfigSource::Defaults { skipped } => skipped,
        };
        for e in skipped {
            tracing::warn!("Failed to load config: {}", e);
        }
        match self {
            ConfigSource::File { path, .. } => tracing::info!("Loaded config from {:?}", path),
            ConfigSource::Defaults { .. } => {
                tracing::info!("Using default config with environment overrides")
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Server Bridge Configuration
#
# Environment variables override these settings:
# - BRIDGE_HOST
# - BRIDGE_PORT
# - BRIDGE_TOKEN
# - BRIDGE_CHAT_API_URL
# - BRIDGE_CHAT_ACCESS_TOKEN
# - BRIDGE_DATA_DIR
# - BRIDGE_LOG_LEVEL
# - BRIDGE_LOG_FORMAT

[server]
host = "0.0.0.0"
port = 8080

# Full event channel (handshake + typed messages)
event_path = "/websocket/bot"

# Liveness channel, also receives messages relayed from other servers
heartbeat_path = "/websocket/minecraft"

# How often idle heartbeat connections check their socket (seconds)
heartbeat_interval_secs = 30

[bridge]
# Shared secret game servers must present when connecting
token = ""

# Announce server startup/shutdown
broadcast_server = true

# Announce player join/leave
broadcast_player = true

# Relay every in-game chat line to the chat group
sync_all_game_message = false

# Relay in-game chat between servers
sync_message_between_servers = true

# Players whose name starts with this prefix are reported as bots
bot_prefix = ""

[chat]
# Disable to keep all traffic between game servers
enabled = true

# OneBot HTTP API of the chat bot
api_url = "http://127.0.0.1:5700"

# access_token = ""

# Groups relayed messages are delivered to
group_ids = []

# Request timeout in milliseconds
request_timeout_ms = 5000

[storage]
# Directory for the known-servers file, defaults to the platform data
# directory. A leading ~ expands to the home directory.
# data_dir = "~/.local/share/server-bridge"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
