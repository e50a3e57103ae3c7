//! Accept loop for one device protocol

use super::ServerState;
use super::connection;
use crate::core::protocol::DeviceProtocol;
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Sleep between polls of the non-blocking accept
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// A bound listening socket serving one device protocol
pub struct Listener {
    name: String,
    listener: TcpListener,
    idle_timeout: Duration,
    protocol: Arc<dyn DeviceProtocol>,
    state: Arc<ServerState>,
    running: Arc<AtomicBool>,
}

impl Listener {
    /// Bind `address`; failure here is fatal for the daemon
    pub fn bind(
        name: &str,
        address: &str,
        idle_timeout: Duration,
        protocol: Arc<dyn DeviceProtocol>,
        state: Arc<ServerState>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(address).map_err(|source| Error::Bind {
            address: address.to_string(),
            source,
        })?;
        // Non-blocking so the loop can observe the running flag
        if let Err(e) = listener.set_nonblocking(true) {
            log::warn!("{}: failed to set nonblocking mode: {}", name, e);
        }

        Ok(Self {
            name: name.to_string(),
            listener,
            idle_timeout,
            protocol,
            state,
            running,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the running flag is cleared
    pub fn run(&self) {
        log::info!(
            "{} TCP server started: {} (idle timeout {}s)",
            self.name,
            self.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".to_string()),
            self.idle_timeout.as_secs()
        );

        while self.running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        log::error!("{}: failed to set {} to blocking mode: {}", self.name, peer, e);
                        continue;
                    }

                    let name = self.name.clone();
                    let protocol = Arc::clone(&self.protocol);
                    let state = Arc::clone(&self.state);
                    let running = Arc::clone(&self.running);
                    let idle_timeout = self.idle_timeout;
                    let spawned = thread::Builder::new()
                        .name(format!("{}-conn", self.name))
                        .spawn(move || {
                            connection::handle(
                                &name,
                                stream,
                                peer,
                                idle_timeout,
                                protocol,
                                &state,
                                &running,
                            )
                        });
                    if let Err(e) = spawned {
                        log::error!("{}: failed to spawn handler for {}: {}", self.name, peer, e);
                    }
                }
                Err(e) => {
                    if e.kind() != ErrorKind::WouldBlock {
                        log::error!("{}: accept error: {}", self.name, e);
                    }
                    thread::sleep(accept_retry_delay(e.kind()));
                }
            }
        }

        log::info!("{} TCP server stopped", self.name);
    }

    /// Run the accept loop on its own named thread
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("{}-listener", self.name))
            .spawn(move || self.run())
            .map_err(|e| Error::Other(format!("Failed to spawn listener thread: {}", e)))
    }
}

/// How long to wait before the next accept attempt
fn accept_retry_delay(kind: ErrorKind) -> Duration {
    if kind == ErrorKind::WouldBlock {
        ACCEPT_POLL_INTERVAL
    } else {
        ACCEPT_ERROR_BACKOFF
    }
}
