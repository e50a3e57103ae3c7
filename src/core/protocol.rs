//! DeviceProtocol trait definition

use crate::core::types::Decoded;

/// Wire protocol spoken by the devices on one listening port
///
/// Implementations are stateless: everything a session has learned so far is
/// passed in, everything learned from the buffer comes back in [`Decoded`].
pub trait DeviceProtocol: Send + Sync {
    /// Short name used in logs and thread names
    fn name(&self) -> &'static str;

    /// Size of the per-connection read buffer
    fn read_buffer_len(&self) -> usize;

    /// Decode one received buffer
    ///
    /// `device_id` is the identifier the session has established, if any.
    fn decode(&self, device_id: Option<&str>, buf: &[u8]) -> Decoded;

    /// Wrap a raw admin command for delivery to a device of this protocol
    fn frame_command(&self, command: &[u8]) -> Vec<u8>;
}
