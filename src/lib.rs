//! trackport - TCP ingestion server for fleet-tracking hardware
//!
//! Devices connect over raw TCP and stream position reports in one of two
//! vendor protocols, one listening port each:
//!
//! - **Arnavi**: handshake, then framed batches of tagged sub-records
//! - **Report Systems**: batches of fixed 59-byte records
//!
//! Both ports also accept an in-band admin protocol used by `trackctl` to
//! query server counters and push commands to connected devices.

pub mod admin;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use core::types::TelemetryRecord;
pub use error::{Error, Result};
pub use server::{Listener, ServerState};
