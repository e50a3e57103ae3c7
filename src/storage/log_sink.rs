//! Storage that only logs records

use super::Storage;
use crate::core::types::TelemetryRecord;
use crate::error::Result;

/// Writes each record to the log at info level as one JSON object
#[derive(Debug, Default)]
pub struct LogStorage;

impl LogStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LogStorage {
    fn init(&mut self, _connection: &str, _workers: usize) -> Result<()> {
        log::info!("{} initialized", self.describe());
        Ok(())
    }

    fn write(&self, record: TelemetryRecord) {
        match serde_json::to_string(&record) {
            Ok(line) => log::info!("record {}", line),
            Err(e) => log::error!("ID={}: failed to serialize record: {}", record.device_id, e),
        }
    }

    fn describe(&self) -> String {
        "log storage".to_string()
    }
}
