//! JSON-lines file storage
//!
//! Records go through a bounded channel to a pool of worker threads that
//! append one JSON object per line. When the channel is full, `write` blocks
//! the calling connection thread until a worker catches up.

use super::Storage;
use crate::core::types::TelemetryRecord;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Appends records to a file, one JSON document per line
pub struct JsonLinesStorage {
    queue_capacity: usize,
    path: Option<PathBuf>,
    /// Dropped on shutdown so workers drain the queue and exit
    sender: Mutex<Option<Sender<TelemetryRecord>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JsonLinesStorage {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity: queue_capacity.max(1),
            path: None,
            sender: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        }
    }
}

impl Storage for JsonLinesStorage {
    fn init(&mut self, connection: &str, workers: usize) -> Result<()> {
        if connection.is_empty() {
            return Err(Error::Storage(
                "jsonl storage needs a file path in storage.connection".to_string(),
            ));
        }
        let path = PathBuf::from(connection);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Storage(format!("open {}: {}", path.display(), e)))?;
        let file = Arc::new(Mutex::new(file));

        let (tx, rx) = bounded(self.queue_capacity);
        let count = workers.max(1);
        let mut handles = Vec::with_capacity(count);
        for worker_id in 0..count {
            let rx = rx.clone();
            let file = Arc::clone(&file);
            let handle = thread::Builder::new()
                .name(format!("storage-{}", worker_id))
                .spawn(move || run_worker(worker_id, rx, file))
                .map_err(|e| Error::Storage(format!("spawn storage worker: {}", e)))?;
            handles.push(handle);
        }

        *self.sender.lock() = Some(tx);
        *self.workers.lock() = handles;
        self.path = Some(path);
        log::info!(
            "{} initialized. workers={}, queue_capacity={}",
            self.describe(),
            count,
            self.queue_capacity
        );
        Ok(())
    }

    fn write(&self, record: TelemetryRecord) {
        // Clone the sender so a blocked send does not hold the lock
        let sender = self.sender.lock().clone();
        match sender {
            Some(tx) => {
                if let Err(e) = tx.send(record) {
                    log::error!("ID={}: storage queue closed", e.0.device_id);
                }
            }
            None => log::error!("ID={}: storage not initialized", record.device_id),
        }
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("JSON lines storage ({})", path.display()),
            None => "JSON lines storage".to_string(),
        }
    }

    fn shutdown(&self) {
        self.sender.lock().take();
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                log::error!("Storage worker panicked");
            }
        }
    }
}

impl Drop for JsonLinesStorage {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One newline-terminated JSON object
fn encode_line(record: &TelemetryRecord) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}

fn run_worker(worker_id: usize, rx: Receiver<TelemetryRecord>, file: Arc<Mutex<File>>) {
    log::debug!("Storage worker {} started", worker_id);
    for record in rx {
        let line = match encode_line(&record) {
            Ok(line) => line,
            Err(e) => {
                log::error!("ID={}: {}", record.device_id, e);
                continue;
            }
        };

        let mut file = file.lock();
        if let Err(e) = file.write_all(&line).and_then(|_| file.flush()) {
            log::error!("ID={}: failed to append record: {}", record.device_id, e);
        }
    }
    log::debug!("Storage worker {} stopped", worker_id);
}
