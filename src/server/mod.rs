//! TCP connection server
//!
//! One [`Listener`] per device protocol. Each accepted connection gets its
//! own named thread running the read loop in [`connection`]. Both listeners
//! share one [`ServerState`].

mod connection;
mod listener;

pub use listener::Listener;

use crate::core::registry::SessionRegistry;
use crate::core::stats::ServerStats;
use crate::storage::Storage;
use std::sync::Arc;

/// State shared by every listener and connection thread
pub struct ServerState {
    pub registry: Arc<SessionRegistry>,
    pub stats: Arc<ServerStats>,
    /// Shared secret expected in admin frames
    pub admin_key: Vec<u8>,
    pub storage: Arc<dyn Storage>,
}

impl ServerState {
    pub fn new(admin_key: &str, storage: Arc<dyn Storage>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            stats: Arc::new(ServerStats::new()),
            admin_key: admin_key.as_bytes().to_vec(),
            storage,
        }
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("sessions", &self.registry.len())
            .field("stats", &self.stats)
            .field("storage", &self.storage.describe())
            .finish()
    }
}
