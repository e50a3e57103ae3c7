//! Record storage backends
//!
//! Connection threads hand every decoded [`TelemetryRecord`] to a
//! [`Storage`] synchronously. Backends own their failure handling: `write`
//! reports nothing back to the caller.

mod jsonl;
mod log_sink;
mod memory;

pub use jsonl::JsonLinesStorage;
pub use log_sink::LogStorage;
pub use memory::MemoryStorage;

use crate::config::StorageConfig;
use crate::core::types::TelemetryRecord;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Destination for decoded records
pub trait Storage: Send + Sync {
    /// Prepare the backend before any record is written
    ///
    /// `connection` is backend specific; `workers` is the number of threads
    /// the backend may use (zero is treated as one).
    fn init(&mut self, connection: &str, workers: usize) -> Result<()>;

    /// Accept one record; may block when the backend is saturated
    fn write(&self, record: TelemetryRecord);

    /// Human readable backend description for the startup log
    fn describe(&self) -> String;

    /// Flush queued records and stop background threads
    fn shutdown(&self) {}
}

/// Create and initialize the backend named by `config.kind`
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    let mut storage: Box<dyn Storage> = match config.kind.as_str() {
        "jsonl" => Box::new(JsonLinesStorage::new(config.queue_capacity)),
        "log" => Box::new(LogStorage::new()),
        "memory" => Box::new(MemoryStorage::new()),
        other => {
            return Err(Error::Storage(format!("unknown storage kind: {}", other)));
        }
    };
    storage.init(&config.connection, config.workers)?;
    Ok(Arc::from(storage))
}
