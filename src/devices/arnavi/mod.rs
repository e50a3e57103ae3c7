//! Arnavi tracker protocol
//!
//! Devices open the connection with a handshake carrying their 64-bit
//! identifier, then stream data frames of TAGS sub-records. Every handshake
//! and data frame is acknowledged with a `7B .. 7D` server frame.

pub mod constants;
pub mod decoder;
pub mod packet;

use crate::core::protocol::DeviceProtocol;
use crate::core::types::Decoded;

/// [`DeviceProtocol`] implementation for Arnavi trackers
#[derive(Debug, Default, Clone, Copy)]
pub struct ArnaviProtocol;

impl ArnaviProtocol {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceProtocol for ArnaviProtocol {
    fn name(&self) -> &'static str {
        "arnavi"
    }

    fn read_buffer_len(&self) -> usize {
        constants::READ_BUFFER_LEN
    }

    fn decode(&self, device_id: Option<&str>, buf: &[u8]) -> Decoded {
        decoder::decode(device_id, buf)
    }

    fn frame_command(&self, command: &[u8]) -> Vec<u8> {
        packet::command_frame(command)
    }
}
