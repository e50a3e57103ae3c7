//! Per-connection read loop
//!
//! # Lifecycle
//!
//! ```text
//! 1. Session created with a fresh UUID and registered
//! 2. Read loop: every buffer goes to the admin check, then the decoder
//! 3. Idle timeout, end of stream or a read error ends the loop
//! 4. Registration guard drops and removes the session
//! ```

use super::ServerState;
use crate::admin;
use crate::core::protocol::DeviceProtocol;
use crate::core::registry::RegistrationGuard;
use crate::core::session::Session;
use crate::error::Result;
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Serve one accepted connection until it closes
pub(super) fn handle(
    listener: &str,
    mut stream: TcpStream,
    peer: SocketAddr,
    idle_timeout: Duration,
    protocol: Arc<dyn DeviceProtocol>,
    state: &ServerState,
    running: &AtomicBool,
) {
    let writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(e) => {
            log::warn!("{}: failed to clone stream for {}: {}", listener, peer, e);
            return;
        }
    };

    let session = Arc::new(Session::new(
        Uuid::new_v4().to_string(),
        peer.to_string(),
        Arc::clone(&protocol),
        Arc::clone(&state.stats),
        Box::new(writer),
    ));
    let (_registration, count) = RegistrationGuard::register(&state.registry, Arc::clone(&session));
    state.stats.observe_sessions(count);
    log::info!(
        "{}: session {} opened from {} ({} live)",
        listener,
        session.id(),
        peer,
        count
    );

    // The read timeout is re-armed by every read call
    if let Err(e) = stream.set_read_timeout(Some(idle_timeout)) {
        log::warn!("{}: failed to set read timeout: {}", session.describe(), e);
    }

    let mut buf = vec![0u8; protocol.read_buffer_len()];
    while running.load(Ordering::Relaxed) {
        match stream.read(&mut buf) {
            Ok(0) => {
                log::info!("{}: closed by peer", session.describe());
                break;
            }
            Ok(n) => {
                session.record_download(n);
                log::debug!("ID:{}, package {} bytes", session.describe(), n);
                if let Err(e) = process(&buf[..n], &session, state) {
                    log::warn!("{}: {}", session.describe(), e);
                    break;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                log::warn!(
                    "{}: closed on idle timeout ({}s silent)",
                    session.describe(),
                    session.idle_for().as_secs()
                );
                break;
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("{}: read error: {}", session.describe(), e);
                break;
            }
        }
    }

    let _ = stream.shutdown(Shutdown::Both);
    log::info!(
        "{}: session {} ({} from {}) closed after {}s",
        listener,
        session.id(),
        session.describe(),
        session.peer(),
        session.run_time_secs()
    );
}

/// Handle one received buffer
///
/// Returns an error only when the session must end.
fn process(buf: &[u8], session: &Arc<Session>, state: &ServerState) -> Result<()> {
    if admin::try_handle(buf, session, state) {
        return Ok(());
    }

    let known = session.device_id();
    let decoded = session.protocol().decode(known.as_deref(), buf);

    if let Some(device_id) = &decoded.device_id {
        session.set_device_id(device_id);
    }
    for record in decoded.records {
        state.storage.write(record);
    }
    for reply in &decoded.replies {
        if let Err(e) = session.write(&reply.bytes) {
            if reply.critical {
                return Err(e);
            }
            log::warn!("{}: failed to write ack: {}", session.describe(), e);
        }
    }
    if decoded.handshake {
        session.record_handshake();
    }
    Ok(())
}
