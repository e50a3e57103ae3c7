//! Core data types shared by the decoders, the connection server and storage.
//!
//! - [`TelemetryRecord`]: one decoded observation, moved into storage
//! - [`Decoded`]: everything a decoder produced for one received buffer
//! - [`Outbound`]: a frame the connection must write back to the device

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decoded position/health observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub device_id: String,
    /// Device clock; `None` when the device sent an impossible date
    pub gps_time: Option<DateTime<Utc>>,
    /// Server clock at decode time
    pub received_at: DateTime<Utc>,
    pub latitude: f32,
    pub longitude: f32,
    /// `DDMM.ffff` form as reported or derived, unsigned (hemisphere is the
    /// sign of `latitude`)
    pub latitude_dm: String,
    /// `DDDMM.ffff` form as reported or derived, unsigned (hemisphere is the
    /// sign of `longitude`)
    pub longitude_dm: String,
    /// km/h
    pub speed: u16,
    /// Degrees, 0-359
    pub heading: u16,
    pub satellites: u8,
    /// Meters
    pub altitude: i32,
    /// Millivolts
    pub external_voltage: i32,
    /// Millivolts
    pub internal_voltage: i32,
    pub signal_level: u8,
    pub odometer: u32,
    /// Replayed from the device's offline buffer
    pub from_memory: bool,
    pub gps_valid: bool,
}

impl TelemetryRecord {
    /// Empty record for `device_id`, stamped with the current server time
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            gps_time: None,
            received_at: Utc::now(),
            latitude: 0.0,
            longitude: 0.0,
            latitude_dm: String::new(),
            longitude_dm: String::new(),
            speed: 0,
            heading: 0,
            satellites: 0,
            altitude: 0,
            external_voltage: 0,
            internal_voltage: 0,
            signal_level: 0,
            odometer: 0,
            from_memory: false,
            gps_valid: false,
        }
    }
}

/// Frame to write back on the receiving connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub bytes: Vec<u8>,
    /// A failed write ends the session
    pub critical: bool,
}

impl Outbound {
    pub fn ack(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            critical: false,
        }
    }

    pub fn critical(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            critical: true,
        }
    }
}

/// Result of decoding one received buffer
#[derive(Debug, Default)]
pub struct Decoded {
    /// Device identifier learned from this buffer
    pub device_id: Option<String>,
    /// Buffer was a handshake (counted once replies are written)
    pub handshake: bool,
    pub records: Vec<TelemetryRecord>,
    /// Written in order after records are handed to storage
    pub replies: Vec<Outbound>,
}

impl Decoded {
    pub fn is_empty(&self) -> bool {
        self.device_id.is_none() && self.records.is_empty() && self.replies.is_empty()
    }
}
