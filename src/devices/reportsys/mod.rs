//! Report Systems tracker protocol
//!
//! Stateless batches of fixed 59-byte records. The device identifier is
//! repeated in every record; the only reply is a short confirmation for
//! back-report records. Admin commands are written to the device verbatim.

pub mod constants;
pub mod decoder;

use crate::core::protocol::DeviceProtocol;
use crate::core::types::Decoded;
use crate::error::{Error, Result};
use chrono::Duration;

/// [`DeviceProtocol`] implementation for Report Systems trackers
#[derive(Debug, Clone, Copy)]
pub struct ReportSysProtocol {
    /// Added to every device timestamp
    time_offset: Duration,
}

impl ReportSysProtocol {
    /// Fails when the offset is outside the range chrono can represent
    pub fn new(time_offset_secs: i64) -> Result<Self> {
        let time_offset = Duration::try_seconds(time_offset_secs).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "reportsys time offset out of range: {}s",
                time_offset_secs
            ))
        })?;
        Ok(Self { time_offset })
    }
}

impl Default for ReportSysProtocol {
    fn default() -> Self {
        Self {
            time_offset: Duration::hours(1),
        }
    }
}

impl DeviceProtocol for ReportSysProtocol {
    fn name(&self) -> &'static str {
        "reportsys"
    }

    fn read_buffer_len(&self) -> usize {
        constants::READ_BUFFER_LEN
    }

    fn decode(&self, device_id: Option<&str>, buf: &[u8]) -> Decoded {
        decoder::decode(device_id, buf, self.time_offset)
    }

    fn frame_command(&self, command: &[u8]) -> Vec<u8> {
        command.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_offset_is_one_hour() {
        assert_eq!(ReportSysProtocol::default().time_offset, Duration::seconds(3600));
        assert_eq!(ReportSysProtocol::new(-7200).unwrap().time_offset, Duration::hours(-2));
    }

    #[test]
    fn test_out_of_range_offset_rejected() {
        assert!(matches!(
            ReportSysProtocol::new(i64::MAX),
            Err(Error::InvalidConfig(_))
        ));
    }
}
