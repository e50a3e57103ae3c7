//! Server-to-device frames for the Arnavi protocol
//!
//! Frame format:
//!
//! ```text
//! [0x7B] [LEN] [PARCEL] [CHECKSUM] [PAYLOAD ...] [0x7D]
//! ```
//!
//! `CHECKSUM` is present only when `LEN > 0`. An empty acknowledgment is
//! therefore 4 bytes: `7B 00 <parcel> 7D`.

use super::constants::*;

/// 8-bit additive checksum shared by the RX and TX paths
///
/// Used over `TIME + PAYLOAD` of TAGS sub-records and over the payload of
/// server responses.
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Build a server response frame carrying `payload` under `parcel`
///
/// Payloads longer than 255 bytes are truncated to fit the length byte.
pub fn server_frame(payload: &[u8], parcel: u8) -> Vec<u8> {
    let payload = &payload[..payload.len().min(u8::MAX as usize)];
    let mut frame = Vec::with_capacity(payload.len() + 5);
    frame.push(RESP_PREFIX);
    frame.push(payload.len() as u8);
    frame.push(parcel);
    if !payload.is_empty() {
        frame.push(checksum(payload));
        frame.extend_from_slice(payload);
    }
    frame.push(RESP_POSTFIX);
    frame
}

/// Empty acknowledgment for `parcel`
#[inline]
pub fn ack_frame(parcel: u8) -> Vec<u8> {
    server_frame(&[], parcel)
}

/// Handshake reply carrying the server's Unix time
pub fn time_sync_frame(unix_time: u32) -> Vec<u8> {
    server_frame(&unix_time.to_le_bytes(), HANDSHAKE_PARCEL)
}

/// Admin command delivered to a device
pub fn command_frame(command: &[u8]) -> Vec<u8> {
    server_frame(command, SERVER_COMMAND_PARCEL)
}
