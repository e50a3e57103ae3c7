//! Process-wide aggregate counters
//!
//! All fields use atomic types so connection threads update them without a
//! lock and admin queries read them concurrently. Counters only grow; they
//! reset when the process restarts.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Aggregate server statistics shared by every listener
#[derive(Debug)]
pub struct ServerStats {
    started_at: Instant,
    max_sessions: AtomicUsize,
    downloaded_bytes: AtomicU64,
    uploaded_bytes: AtomicU64,
    handshakes: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            max_sessions: AtomicUsize::new(0),
            downloaded_bytes: AtomicU64::new(0),
            uploaded_bytes: AtomicU64::new(0),
            handshakes: AtomicU64::new(0),
        }
    }

    /// Record the registry size seen right after a registration
    #[inline]
    pub fn observe_sessions(&self, count: usize) {
        self.max_sessions.fetch_max(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_downloaded(&self, bytes: u64) {
        self.downloaded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_uploaded(&self, bytes: u64) {
        self.uploaded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_handshake(&self) {
        self.handshakes.fetch_add(1, Ordering::Relaxed);
    }

    /// Whole seconds since the process started
    pub fn run_time_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions.load(Ordering::Relaxed)
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded_bytes.load(Ordering::Relaxed)
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes.load(Ordering::Relaxed)
    }

    pub fn handshakes(&self) -> u64 {
        self.handshakes.load(Ordering::Relaxed)
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}
