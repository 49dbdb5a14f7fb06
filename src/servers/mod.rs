//! Server Bookkeeping
//!
//! - **ServerStore**: every server name the bridge has ever seen, persisted
//! - **ServerWatcher**: process ids of currently running servers

mod store;
mod watcher;

pub use store::ServerStore;
pub use watcher::ServerWatcher;
