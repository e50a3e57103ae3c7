//! Per-connection device session
//!
//! A `Session` is created when a connection is accepted and dropped when its
//! handler thread returns. Counters are atomics written by the owning
//! connection thread and read by admin queries from any other thread. Writes
//! go through a per-session mutex because admin commands received on one
//! connection may be delivered to another.

use crate::core::protocol::DeviceProtocol;
use crate::core::stats::ServerStats;
use crate::error::Result;
use parking_lot::{Mutex, RwLock};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Write half of a connection
pub type SessionWriter = Box<dyn Write + Send>;

/// One accepted, still-open connection
pub struct Session {
    id: String,
    peer: String,
    protocol: Arc<dyn DeviceProtocol>,
    stats: Arc<ServerStats>,
    /// Empty until the device identifies itself
    device_id: RwLock<Option<String>>,
    started_at: Instant,
    last_activity: Mutex<Instant>,
    downloaded_bytes: AtomicU64,
    uploaded_bytes: AtomicU64,
    handshakes: AtomicU64,
    writer: Mutex<SessionWriter>,
}

impl Session {
    pub fn new(
        id: String,
        peer: String,
        protocol: Arc<dyn DeviceProtocol>,
        stats: Arc<ServerStats>,
        writer: SessionWriter,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer,
            protocol,
            stats,
            device_id: RwLock::new(None),
            started_at: now,
            last_activity: Mutex::new(now),
            downloaded_bytes: AtomicU64::new(0),
            uploaded_bytes: AtomicU64::new(0),
            handshakes: AtomicU64::new(0),
            writer: Mutex::new(writer),
        }
    }

    /// Registry key (UUID)
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn protocol(&self) -> &dyn DeviceProtocol {
        self.protocol.as_ref()
    }

    pub fn device_id(&self) -> Option<String> {
        self.device_id.read().clone()
    }

    /// Cheap identifier comparison without cloning
    pub fn has_device_id(&self, device_id: &str) -> bool {
        self.device_id.read().as_deref() == Some(device_id)
    }

    pub fn set_device_id(&self, device_id: &str) {
        let mut current = self.device_id.write();
        if current.as_deref() != Some(device_id) {
            *current = Some(device_id.to_string());
        }
    }

    /// Device identifier if known, otherwise the peer address
    pub fn describe(&self) -> String {
        self.device_id().unwrap_or_else(|| self.peer.clone())
    }

    /// Count bytes received and mark the session active
    pub fn record_download(&self, bytes: usize) {
        *self.last_activity.lock() = Instant::now();
        self.downloaded_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.stats.add_downloaded(bytes as u64);
    }

    pub fn record_handshake(&self) {
        self.handshakes.fetch_add(1, Ordering::Relaxed);
        self.stats.add_handshake();
    }

    /// Write raw bytes to the connection
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        {
            let mut writer = self.writer.lock();
            writer.write_all(bytes)?;
            writer.flush()?;
        }
        self.uploaded_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.stats.add_uploaded(bytes.len() as u64);
        Ok(())
    }

    /// Deliver an admin command framed for this session's protocol
    pub fn write_command(&self, command: &[u8]) -> Result<()> {
        log::debug!(
            "ID:{}, server command:{}",
            self.describe(),
            hex::encode(command)
        );
        let frame = self.protocol.frame_command(command);
        self.write(&frame)
    }

    pub fn run_time_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
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

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("protocol", &self.protocol.name())
            .field("device_id", &self.device_id())
            .finish()
    }
}

/// Shared in-memory writer for exercising sessions without sockets
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::types::Decoded;

    #[derive(Clone, Default)]
    pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn contents(&self) -> Vec<u8> {
            self.0.lock().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Protocol that decodes nothing and frames commands verbatim
    pub struct RawProtocol;

    impl DeviceProtocol for RawProtocol {
        fn name(&self) -> &'static str {
            "raw"
        }

        fn read_buffer_len(&self) -> usize {
            256
        }

        fn decode(&self, _device_id: Option<&str>, _buf: &[u8]) -> Decoded {
            Decoded::default()
        }

        fn frame_command(&self, command: &[u8]) -> Vec<u8> {
            command.to_vec()
        }
    }

    pub fn session(id: &str, stats: &Arc<ServerStats>) -> (Arc<Session>, SharedBuf) {
        let buf = SharedBuf::default();
        let session = Session::new(
            id.to_string(),
            "127.0.0.1:1".to_string(),
            Arc::new(RawProtocol),
            Arc::clone(stats),
            Box::new(buf.clone()),
        );
        (Arc::new(session), buf)
    }
}
