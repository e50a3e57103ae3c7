//! Local command handler
//!
//! Every reply is one JSON object whose first field is `"err"`: empty on
//! success, the failure message otherwise. Field order is fixed and relied
//! on by existing clients.

use crate::core::session::Session;
use crate::server::ServerState;
use serde_json::{Map, Value, json};

// Server-wide queries
pub const CMD_CLIENT_COUNT: u8 = 0x01;
pub const CMD_RUN_TIME: u8 = 0x02;
pub const CMD_CLIENT_MAX_COUNT: u8 = 0x03;
pub const CMD_DOWNLOADED_BYTES: u8 = 0x04;
pub const CMD_UPLOADED_BYTES: u8 = 0x05;
pub const CMD_LIST: u8 = 0x06;
pub const CMD_HANDSHAKES: u8 = 0x07;
pub const CMD_STATUS: u8 = 0xFF;

// Per-device queries (need a target session)
pub const CMD_DEV_RUN_TIME: u8 = 0x82;
pub const CMD_DEV_DOWNLOADED_BYTES: u8 = 0x84;
pub const CMD_DEV_UPLOADED_BYTES: u8 = 0x85;
pub const CMD_DEV_HANDSHAKES: u8 = 0x87;
pub const CMD_DEV_STATUS: u8 = 0xFE;

/// Run command `code`, scoped to `target` for per-device codes
pub fn run_command(code: u8, target: Option<&Session>, state: &ServerState) -> String {
    match code {
        CMD_CLIENT_COUNT => success(json!({ "clientCount": client_count(state) })),
        CMD_RUN_TIME => success(json!({ "runTime": state.stats.run_time_secs() })),
        CMD_CLIENT_MAX_COUNT => success(json!({ "maxClientCount": state.stats.max_sessions() })),
        CMD_DOWNLOADED_BYTES => {
            success(json!({ "downloadedBytes": state.stats.downloaded_bytes() }))
        }
        CMD_UPLOADED_BYTES => success(json!({ "uploadedBytes": state.stats.uploaded_bytes() })),
        CMD_LIST => success(json!({ "list": state.registry.device_ids() })),
        CMD_HANDSHAKES => success(json!({ "handshakes": state.stats.handshakes() })),
        CMD_STATUS => success(json!({
            "status": {
                "clientCount": client_count(state),
                "runTime": state.stats.run_time_secs(),
                "maxClientCount": state.stats.max_sessions(),
                "downloadedBytes": state.stats.downloaded_bytes(),
                "uploadedBytes": state.stats.uploaded_bytes(),
                "handshakes": state.stats.handshakes(),
            }
        })),
        CMD_DEV_RUN_TIME
        | CMD_DEV_DOWNLOADED_BYTES
        | CMD_DEV_UPLOADED_BYTES
        | CMD_DEV_HANDSHAKES
        | CMD_DEV_STATUS => match target {
            Some(session) => device_command(code, session),
            None => {
                let message = format!("Server command {} needs a target device", code);
                log::error!("{}", message);
                failure(&message)
            }
        },
        _ => {
            let message = format!("Server command not found {}", code);
            log::error!("{}", message);
            failure(&message)
        }
    }
}

fn device_command(code: u8, session: &Session) -> String {
    let imei = session.device_id().unwrap_or_default();
    match code {
        CMD_DEV_RUN_TIME => success(json!({ "imei": imei, "runTime": session.run_time_secs() })),
        CMD_DEV_DOWNLOADED_BYTES => success(json!({
            "imei": imei,
            "downloadedBytes": session.downloaded_bytes(),
        })),
        CMD_DEV_UPLOADED_BYTES => success(json!({
            "imei": imei,
            "uploadedBytes": session.uploaded_bytes(),
        })),
        CMD_DEV_HANDSHAKES => success(json!({ "imei": imei, "handshakes": session.handshakes() })),
        _ => success(json!({
            "imei": imei,
            "status": {
                "runTime": session.run_time_secs(),
                "downloadedBytes": session.downloaded_bytes(),
                "uploadedBytes": session.uploaded_bytes(),
                "handshakes": session.handshakes(),
            }
        })),
    }
}

/// Live sessions minus the one asking
fn client_count(state: &ServerState) -> usize {
    state.registry.len().saturating_sub(1)
}

/// `{"err":"", <payload fields...>}`
fn success(payload: Value) -> String {
    let mut reply = Map::new();
    reply.insert("err".to_string(), Value::String(String::new()));
    if let Value::Object(fields) = payload {
        reply.extend(fields);
    }
    Value::Object(reply).to_string()
}

/// `{"err":"<message>"}`
pub fn failure(message: &str) -> String {
    json!({ "err": message }).to_string()
}
