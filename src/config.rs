//! Configuration for the trackport daemon
//!
//! Loads configuration from a TOML file: one listener section per device
//! protocol, the shared admin key, storage parameters, decoder corrections
//! and logging.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub arnavi: ListenerConfig,
    pub reportsys: ListenerConfig,
    pub admin: AdminConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    pub logging: LoggingConfig,
}

/// One TCP listener (one device protocol)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// TCP bind address
    ///
    /// Examples:
    /// - `0.0.0.0:20501` - Bind to all interfaces
    /// - `127.0.0.1:20501` - Localhost only
    pub bind_address: String,

    /// Seconds a connection may stay silent before it is closed
    pub idle_timeout_secs: u64,
}

impl ListenerConfig {
    /// Idle timeout as a `Duration` (zero is raised to one second)
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.max(1))
    }
}

/// Administrative sub-protocol configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    /// Shared secret that must follow the 3-byte admin prefix
    pub command_key: String,
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Backend kind: `jsonl` or `log`
    pub kind: String,
    /// Backend-specific connection descriptor (file path for `jsonl`)
    #[serde(default)]
    pub connection: String,
    /// Number of storage worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Records buffered before connection threads block
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_workers() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    1024
}

/// Decoder corrections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecoderConfig {
    /// Offset added to Report Systems device timestamps.
    ///
    /// Field devices report one hour behind; the offset is kept configurable
    /// until the cause is known.
    #[serde(default = "default_reportsys_offset")]
    pub reportsys_time_offset_secs: i64,
}

fn default_reportsys_offset() -> i64 {
    3600
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            reportsys_time_offset_secs: default_reportsys_offset(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use trackport::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("trackport.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            arnavi: ListenerConfig {
                bind_address: "0.0.0.0:20501".to_string(),
                idle_timeout_secs: 300,
            },
            reportsys: ListenerConfig {
                bind_address: "0.0.0.0:20502".to_string(),
                idle_timeout_secs: 300,
            },
            admin: AdminConfig {
                command_key: "change-me".to_string(),
            },
            storage: StorageConfig {
                kind: "log".to_string(),
                connection: String::new(),
                workers: default_workers(),
                queue_capacity: default_queue_capacity(),
            },
            decoder: DecoderConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
