//! Core abstractions shared by every listener.
//!
//! - [`protocol::DeviceProtocol`]: Trait to implement for a new device protocol
//! - [`session::Session`] and [`registry::SessionRegistry`]: live connections
//! - [`stats::ServerStats`]: process-wide counters
//! - [`types`]: decoded records and decoder output

pub mod geo;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod stats;
pub mod types;
