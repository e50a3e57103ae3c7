//! In-process storage for tests and embedding

use super::Storage;
use crate::core::types::TelemetryRecord;
use crate::error::Result;
use parking_lot::Mutex;

/// Keeps every record in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn init(&mut self, _connection: &str, _workers: usize) -> Result<()> {
        Ok(())
    }

    fn write(&self, record: TelemetryRecord) {
        self.records.lock().push(record);
    }

    fn describe(&self) -> String {
        format!("memory storage ({} records)", self.len())
    }
}
