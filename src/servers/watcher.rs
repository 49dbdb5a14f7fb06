//! Process bookkeeping for running game servers.

use std::collections::HashMap;
use tokio::sync::RwLock;

/// Tracks the process id reported by each running server
#[derive(Debug, Default)]
pub struct ServerWatcher {
    pids: RwLock<HashMap<String, u32>>,
}

impl ServerWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or update the process id of `name`
    pub async fn append(&self, name: &str, pid: u32) {
        let previous = self.pids.write().await.insert(name.to_string(), pid);
        if previous != Some(pid) {
            tracing::debug!(server = %name, pid, "Watching server process");
        }
    }

    /// Stop watching `name`
    pub async fn remove(&self, name: &str) {
        if self.pids.write().await.remove(name).is_some() {
            tracing::debug!(server = %name, "Stopped watching server process");
        }
    }

    pub async fn get(&self, name: &str) -> Option<u32> {
        self.pids.read().await.get(name).copied()
    }

    /// Copy of the current `name → pid` map
    pub async fn snapshot(&self) -> HashMap<String, u32> {
        self.pids.read().await.clone()
    }
}
