//! Registry of live sessions
//!
//! Maps the per-connection UUID to the session. Registration and removal take
//! the write lock; lookups share the read lock, so a lookup never sees a
//! half-inserted session. Lookup by device identifier is a linear scan that
//! returns the first match in map order: two connections claiming the same
//! identifier are allowed.

use crate::core::session::Session;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Concurrent session map shared by every listener
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session; returns the registry size after insertion
    pub fn register(&self, session: Arc<Session>) -> usize {
        let mut sessions = self.sessions.write();
        sessions.insert(session.id().to_string(), session);
        sessions.len()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// First session that reported `device_id`
    pub fn get_by_device_id(&self, device_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .values()
            .find(|s| s.has_device_id(device_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of the live sessions
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Device identifiers of all live sessions (empty string if not yet known)
    pub fn device_ids(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|s| s.device_id().unwrap_or_default())
            .collect()
    }
}

/// Removes a session from the registry when dropped
///
/// Held by the connection thread for the lifetime of the connection so that
/// every exit path, including a panic unwinding through the read loop,
/// deregisters the session.
pub struct RegistrationGuard {
    registry: Arc<SessionRegistry>,
    id: String,
}

impl RegistrationGuard {
    /// Register `session` and return the guard plus the registry size
    pub fn register(registry: &Arc<SessionRegistry>, session: Arc<Session>) -> (Self, usize) {
        let id = session.id().to_string();
        let count = registry.register(session);
        (
            Self {
                registry: Arc::clone(registry),
                id,
            },
            count,
        )
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if self.registry.remove(&self.id).is_none() {
            log::warn!("Session {} already removed from registry", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::testing::session;
    use crate::core::stats::ServerStats;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_register_returns_size() {
        let stats = Arc::new(ServerStats::new());
        let registry = SessionRegistry::new();
        let (a, _) = session("a", &stats);
        let (b, _) = session("b", &stats);
        assert_eq!(registry.register(a), 1);
        assert_eq!(registry.register(b), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.remove("a").is_some());
        assert!(registry.get("a").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_by_device_id() {
        let stats = Arc::new(ServerStats::new());
        let registry = SessionRegistry::new();
        let (a, _) = session("a", &stats);
        let (b, _) = session("b", &stats);
        b.set_device_id("123");
        registry.register(a);
        registry.register(b);

        let found = registry.get_by_device_id("123").unwrap();
        assert_eq!(found.id(), "b");
        assert!(registry.get_by_device_id("999").is_none());

        let mut ids = registry.device_ids();
        ids.sort();
        assert_eq!(ids, vec!["".to_string(), "123".to_string()]);
    }

    #[test]
    fn test_duplicate_device_ids_return_one_of_them() {
        // Identifiers are not unique; either claimant may be returned
        let stats = Arc::new(ServerStats::new());
        let registry = SessionRegistry::new();
        let (a, _) = session("a", &stats);
        let (b, _) = session("b", &stats);
        a.set_device_id("777");
        b.set_device_id("777");
        registry.register(a);
        registry.register(b);

        let found = registry.get_by_device_id("777").unwrap();
        assert!(found.id() == "a" || found.id() == "b");

        registry.remove(found.id());
        let other = registry.get_by_device_id("777").unwrap();
        assert_ne!(other.id(), found.id());
    }

    #[test]
    fn test_guard_removes_on_drop() {
        let stats = Arc::new(ServerStats::new());
        let registry = Arc::new(SessionRegistry::new());
        let (a, _) = session("a", &stats);
        {
            let (_guard, count) = RegistrationGuard::register(&registry, a);
            assert_eq!(count, 1);
            assert!(registry.get("a").is_some());
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_and_remove() {
        const N: usize = 100;
        let stats = Arc::new(ServerStats::new());
        let registry = Arc::new(SessionRegistry::new());

        let sessions: Vec<_> = (0..N)
            .map(|i| session(&format!("s{}", i), &stats).0)
            .collect();

        // Register everything concurrently; all threads wait before removing
        // so the true peak is N.
        let barrier = Arc::new(Barrier::new(N));
        let handles: Vec<_> = sessions
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let registry = Arc::clone(&registry);
                let stats = Arc::clone(&stats);
                let barrier = Arc::clone(&barrier);
                let s = Arc::clone(s);
                // Remove a different session than the one registered
                let victim = format!("s{}", (i * 37 + 11) % N);
                thread::spawn(move || {
                    let count = registry.register(s);
                    stats.observe_sessions(count);
                    barrier.wait();
                    assert!(registry.remove(&victim).is_some());
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert!(registry.is_empty());
        for i in 0..N {
            assert!(registry.get(&format!("s{}", i)).is_none());
        }
        assert_eq!(stats.max_sessions(), N);
    }
}
