//! In-band administrative sub-protocol
//!
//! Any buffer received on either device port is checked for an admin frame
//! before it reaches the device decoder:
//!
//! ```text
//! targeted:  FF FF FF <key> <imeiLen:1><imei> <cmdLen:1><cmd> <direct:1>
//! broadcast: FE FE FE <key> <cmdLen:1><cmd>
//! ```
//!
//! A frame is recognized when it is long enough, the prefix matches and the
//! key matches. Recognized frames are always answered on the requesting
//! connection, one line per frame, and never passed to the decoder.

pub mod commands;

use crate::core::session::Session;
use crate::error::{Error, Result};
use crate::server::ServerState;
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const TARGETED_PREFIX: [u8; 3] = [0xFF, 0xFF, 0xFF];
pub const BROADCAST_PREFIX: [u8; 3] = [0xFE, 0xFE, 0xFE];
const PREFIX_LEN: usize = 3;

/// Reply to a delivered direct command
pub const DIRECT_OK: &[u8] = b"OK\n";

/// A decoded admin frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRequest {
    /// Command for one device, looked up by identifier
    Targeted {
        device_id: String,
        command: Vec<u8>,
        /// Deliver `command` to the device instead of running it locally
        direct: bool,
    },
    /// Server-wide query
    Broadcast { command: Vec<u8> },
}

impl AdminRequest {
    /// Serialize to the wire form for `key`
    ///
    /// Identifier and command are truncated to 255 bytes.
    pub fn encode(&self, key: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        match self {
            AdminRequest::Targeted {
                device_id,
                command,
                direct,
            } => {
                frame.extend_from_slice(&TARGETED_PREFIX);
                frame.extend_from_slice(key);
                push_field(&mut frame, device_id.as_bytes());
                push_field(&mut frame, command);
                frame.push(u8::from(*direct));
            }
            AdminRequest::Broadcast { command } => {
                frame.extend_from_slice(&BROADCAST_PREFIX);
                frame.extend_from_slice(key);
                push_field(&mut frame, command);
            }
        }
        frame
    }

    /// Parse `buf` as an admin frame
    ///
    /// Returns `None` when `buf` is not an admin frame for `key`, and
    /// `Some(Err(_))` when it is one but its fields do not fit.
    pub fn parse(buf: &[u8], key: &[u8]) -> Option<Result<Self>> {
        if buf.len() < PREFIX_LEN + key.len() + 1 {
            return None;
        }
        let prefix = &buf[..PREFIX_LEN];
        let targeted = prefix == TARGETED_PREFIX;
        if !targeted && prefix != BROADCAST_PREFIX {
            return None;
        }
        if !bool::from(buf[PREFIX_LEN..PREFIX_LEN + key.len()].ct_eq(key)) {
            return None;
        }

        let mut fields = FieldReader::new(&buf[PREFIX_LEN + key.len()..]);
        Some(if targeted {
            Self::parse_targeted(&mut fields)
        } else {
            Self::parse_broadcast(&mut fields)
        })
    }

    fn parse_targeted(fields: &mut FieldReader<'_>) -> Result<Self> {
        let device_id = String::from_utf8_lossy(fields.field("imei")?).into_owned();
        let command = fields.field("command")?.to_vec();
        let direct = fields.byte("direct flag")? == 1;
        if command.is_empty() {
            return Err(malformed("empty command"));
        }
        Ok(AdminRequest::Targeted {
            device_id,
            command,
            direct,
        })
    }

    fn parse_broadcast(fields: &mut FieldReader<'_>) -> Result<Self> {
        let command = fields.field("command")?.to_vec();
        if command.is_empty() {
            return Err(malformed("empty command"));
        }
        Ok(AdminRequest::Broadcast { command })
    }
}

fn push_field(frame: &mut Vec<u8>, bytes: &[u8]) {
    let bytes = &bytes[..bytes.len().min(u8::MAX as usize)];
    frame.push(bytes.len() as u8);
    frame.extend_from_slice(bytes);
}

fn malformed(detail: &str) -> Error {
    Error::InvalidPacket(format!("malformed admin frame: {}", detail))
}

/// Cursor over length-prefixed admin frame fields
struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn byte(&mut self, name: &str) -> Result<u8> {
        let (&b, rest) = self
            .buf
            .split_first()
            .ok_or_else(|| malformed(&format!("missing {}", name)))?;
        self.buf = rest;
        Ok(b)
    }

    fn field(&mut self, name: &str) -> Result<&'a [u8]> {
        let len = self.byte(name)? as usize;
        if len > self.buf.len() {
            return Err(malformed(&format!(
                "{} length {} exceeds remaining {} bytes",
                name,
                len,
                self.buf.len()
            )));
        }
        let (value, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(value)
    }
}

/// Handle `buf` if it is an admin frame; returns whether it was one
pub fn try_handle(buf: &[u8], requester: &Arc<Session>, state: &ServerState) -> bool {
    let request = match AdminRequest::parse(buf, &state.admin_key) {
        None => return false,
        Some(Ok(request)) => request,
        Some(Err(e)) => {
            log::warn!("{}: {}", requester.describe(), e);
            let detail = match e {
                Error::InvalidPacket(message) => message,
                other => other.to_string(),
            };
            reply_line(requester, &commands::failure(&detail));
            return true;
        }
    };

    match request {
        AdminRequest::Targeted {
            device_id,
            command,
            direct,
        } => handle_targeted(&device_id, &command, direct, requester, state),
        AdminRequest::Broadcast { command } => {
            let response = commands::run_command(command[0], None, state);
            reply_line(requester, &response);
        }
    }
    true
}

fn handle_targeted(
    device_id: &str,
    command: &[u8],
    direct: bool,
    requester: &Arc<Session>,
    state: &ServerState,
) {
    let Some(target) = state.registry.get_by_device_id(device_id) else {
        let message = format!(
            "IMEI {} not connected, command={}",
            device_id,
            hex::encode(command)
        );
        log::error!("{}", message);
        reply_line(requester, &commands::failure(&message));
        return;
    };

    if direct {
        if let Err(e) = target.write_command(command) {
            log::error!("{}: failed to deliver command: {}", target.describe(), e);
        }
        reply(requester, DIRECT_OK);
    } else {
        let response = commands::run_command(command[0], Some(target.as_ref()), state);
        reply_line(requester, &response);
    }
}

fn reply_line(requester: &Session, response: &str) {
    let mut line = Vec::with_capacity(response.len() + 1);
    line.extend_from_slice(response.as_bytes());
    line.push(b'\n');
    reply(requester, &line);
}

fn reply(requester: &Session, bytes: &[u8]) {
    if let Err(e) = requester.write(bytes) {
        log::warn!("{}: failed to write admin reply: {}", requester.describe(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::testing::{SharedBuf, session};
    use crate::storage::MemoryStorage;

    const KEY: &str = "s3cret";

    fn state() -> ServerState {
        ServerState::new(KEY, Arc::new(MemoryStorage::new()))
    }

    fn connect(state: &ServerState, id: &str, device_id: Option<&str>) -> (Arc<Session>, SharedBuf) {
        let (s, buf) = session(id, &state.stats);
        if let Some(device_id) = device_id {
            s.set_device_id(device_id);
        }
        state.registry.register(Arc::clone(&s));
        (s, buf)
    }

    fn text(buf: &SharedBuf) -> String {
        String::from_utf8(buf.contents()).unwrap()
    }

    #[test]
    fn test_encode_targeted() {
        let frame = AdminRequest::Targeted {
            device_id: "12".to_string(),
            command: vec![0x01, 0x07],
            direct: true,
        }
        .encode(b"k");
        assert_eq!(
            frame,
            vec![0xFF, 0xFF, 0xFF, b'k', 2, b'1', b'2', 2, 0x01, 0x07, 1]
        );
    }

    #[test]
    fn test_encode_broadcast() {
        let frame = AdminRequest::Broadcast { command: vec![0x06] }.encode(b"key");
        assert_eq!(frame, vec![0xFE, 0xFE, 0xFE, b'k', b'e', b'y', 1, 0x06]);
    }

    #[test]
    fn test_parse_round_trip() {
        let request = AdminRequest::Targeted {
            device_id: "860906040000001".to_string(),
            command: vec![0x82],
            direct: false,
        };
        let parsed = AdminRequest::parse(&request.encode(KEY.as_bytes()), KEY.as_bytes());
        assert_eq!(parsed.unwrap().unwrap(), request);
    }

    #[test]
    fn test_not_admin_frames() {
        let key = KEY.as_bytes();
        // Too short
        assert!(AdminRequest::parse(&[0xFF, 0xFF, 0xFF], key).is_none());
        // Wrong key
        let frame = AdminRequest::Broadcast { command: vec![1] }.encode(b"other!");
        assert!(AdminRequest::parse(&frame, key).is_none());
        // Device traffic
        assert!(AdminRequest::parse(&[0x5B, 0x01, 0x00, 0x5D, 0, 0, 0, 0, 0, 0], key).is_none());
    }

    #[test]
    fn test_truncated_frame_is_malformed() {
        let mut frame = AdminRequest::Targeted {
            device_id: "860906040000001".to_string(),
            command: vec![0x01],
            direct: false,
        }
        .encode(KEY.as_bytes());
        frame.truncate(frame.len() - 4);
        assert!(matches!(
            AdminRequest::parse(&frame, KEY.as_bytes()),
            Some(Err(Error::InvalidPacket(_)))
        ));
    }

    #[test]
    fn test_broadcast_client_count() {
        let state = state();
        for i in 0..3 {
            connect(&state, &format!("dev{}", i), Some(format!("10{}", i).as_str()));
        }
        let (requester, out) = connect(&state, "admin", None);

        let frame = AdminRequest::Broadcast { command: vec![0x01] }.encode(KEY.as_bytes());
        assert!(try_handle(&frame, &requester, &state));
        assert_eq!(text(&out), "{\"err\":\"\",\"clientCount\":3}\n");
    }

    #[test]
    fn test_direct_command_reaches_target() {
        let state = state();
        let (_target, target_out) = connect(&state, "dev", Some("860906040000001"));
        let (requester, out) = connect(&state, "admin", None);

        let frame = AdminRequest::Targeted {
            device_id: "860906040000001".to_string(),
            command: vec![0x01, 0x07],
            direct: true,
        }
        .encode(KEY.as_bytes());
        assert!(try_handle(&frame, &requester, &state));

        assert_eq!(target_out.contents(), vec![0x01, 0x07]);
        assert_eq!(text(&out), "OK\n");
    }

    #[test]
    fn test_unknown_target_reports_id_and_command() {
        let state = state();
        let (requester, out) = connect(&state, "admin", None);

        let frame = AdminRequest::Targeted {
            device_id: "999".to_string(),
            command: vec![0x01, 0x07],
            direct: true,
        }
        .encode(KEY.as_bytes());
        assert!(try_handle(&frame, &requester, &state));
        assert_eq!(
            text(&out),
            "{\"err\":\"IMEI 999 not connected, command=0107\"}\n"
        );
    }

    #[test]
    fn test_indirect_command_scoped_to_target() {
        let state = state();
        let (target, _) = connect(&state, "dev", Some("555"));
        target.record_download(77);
        let (requester, out) = connect(&state, "admin", None);
        requester.record_download(1);

        let frame = AdminRequest::Targeted {
            device_id: "555".to_string(),
            command: vec![0x84],
            direct: false,
        }
        .encode(KEY.as_bytes());
        assert!(try_handle(&frame, &requester, &state));
        assert_eq!(
            text(&out),
            "{\"err\":\"\",\"imei\":\"555\",\"downloadedBytes\":77}\n"
        );
    }

    #[test]
    fn test_malformed_frame_answered() {
        let state = state();
        let (requester, out) = connect(&state, "admin", None);

        let mut frame = BROADCAST_PREFIX.to_vec();
        frame.extend_from_slice(KEY.as_bytes());
        frame.push(5); // declares 5 command bytes, none follow
        assert!(try_handle(&frame, &requester, &state));
        assert!(text(&out).starts_with("{\"err\":\"malformed admin frame: command length 5"));
    }

    #[test]
    fn test_device_traffic_not_handled() {
        let state = state();
        let (requester, out) = connect(&state, "dev", None);
        assert!(!try_handle(&[0xFF, 0x22, 1, 2, 3, 4, 5, 6, 7, 8], &requester, &state));
        assert!(out.contents().is_empty());
    }
}
