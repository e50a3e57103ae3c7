//! trackport - fleet-tracker ingestion daemon
//!
//! ## Ports
//!
//! - **TCP `arnavi.bind_address`**: Arnavi trackers + admin frames
//! - **TCP `reportsys.bind_address`**: Report Systems trackers + admin frames
//!
//! Decoded records go to the storage backend named in `[storage]`.

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use trackport::config::{AppConfig, ListenerConfig};
use trackport::devices::create_protocol;
use trackport::error::{Error, Result};
use trackport::server::{Listener, ServerState};
use trackport::storage::create_storage;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `trackport <path>` (positional)
/// - `trackport --config <path>` (flag-based)
/// - `trackport -c <path>` (short flag)
///
/// Defaults to `/etc/trackport.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/trackport.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = AppConfig::from_file(&config_path)?;

    // RUST_LOG still overrides the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("trackport v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);

    let storage = create_storage(&config.storage)?;
    log::info!("Storage: {}", storage.describe());

    let state = Arc::new(ServerState::new(&config.admin.command_key, Arc::clone(&storage)));

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let listeners = [("arnavi", &config.arnavi), ("reportsys", &config.reportsys)];
    let mut handles = Vec::with_capacity(listeners.len());
    for (name, listener_config) in listeners {
        handles.push(start_listener(name, listener_config, &config, &state, &running)?);
    }

    log::info!("trackport running. Press Ctrl-C to stop.");
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutting down...");
    for handle in handles {
        if handle.join().is_err() {
            log::error!("Listener thread panicked");
        }
    }
    storage.shutdown();

    log::info!(
        "trackport stopped. sessions_max={}, downloaded={}B, uploaded={}B, handshakes={}",
        state.stats.max_sessions(),
        state.stats.downloaded_bytes(),
        state.stats.uploaded_bytes(),
        state.stats.handshakes()
    );
    Ok(())
}

fn start_listener(
    name: &str,
    listener_config: &ListenerConfig,
    config: &AppConfig,
    state: &Arc<ServerState>,
    running: &Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>> {
    let protocol = create_protocol(name, config)?;
    let listener = Listener::bind(
        name,
        &listener_config.bind_address,
        listener_config.idle_timeout(),
        protocol,
        Arc::clone(state),
        Arc::clone(running),
    )?;
    listener.spawn()
}
