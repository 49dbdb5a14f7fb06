//! Known Server Names
//!
//! Keeps the set of server names that have ever connected, persisted as a
//! JSON array so it survives restarts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// File name used inside the data directory
pub const STORE_FILE: &str = "servers.json";

/// Persistent set of known server names
#[derive(Debug)]
pub struct ServerStore {
    path: Option<PathBuf>,
    names: RwLock<BTreeSet<String>>,
}

impl ServerStore {
    /// Store that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            names: RwLock::new(BTreeSet::new()),
        }
    }

    /// Load the store from `data_dir`, starting empty if nothing was saved
    ///
    /// An unreadable or corrupt file is logged and ignored.
    pub async fn load(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(STORE_FILE);

        let names = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<BTreeSet<String>>(&content) {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Corrupt server store, starting empty");
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to read server store");
                BTreeSet::new()
            }
        };

        tracing::debug!(path = ?path, servers = names.len(), "Loaded server store");

        Self {
            path: Some(path),
            names: RwLock::new(names),
        }
    }

    /// Record `name` as a known server; repeated names are ignored
    ///
    /// The write lock is held until the file is replaced, so concurrent
    /// appends reach the disk one at a time and in order.
    pub async fn append(&self, name: &str) {
        let mut names = self.names.write().await;
        if !names.insert(name.to_string()) {
            return;
        }

        tracing::info!(server = %name, "New server recorded");
        self.persist(&names).await;
    }

    /// All known server names, sorted
    pub async fn names(&self) -> Vec<String> {
        self.names.read().await.iter().cloned().collect()
    }

    /// Whether `name` has been recorded
    pub async fn contains(&self, name: &str) -> bool {
        self.names.read().await.contains(name)
    }

    async fn persist(&self, names: &BTreeSet<String>) {
        let Some(path) = &self.path else {
            return;
        };

        let content = match serde_json::to_string_pretty(names) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize server store");
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(path = ?parent, error = %e, "Failed to create data directory");
                return;
            }
        }

        // write beside the store and swap it in
        let staging = path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&staging, content).await {
            tracing::warn!(path = ?staging, error = %e, "Failed to write server store");
            return;
        }
        if let Err(e) = tokio::fs::rename(&staging, path).await {
            tracing::warn!(path = ?path, error = %e, "Failed to replace server store");
            let _ = tokio::fs::remove_file(&staging).await;
        }
    }
}
