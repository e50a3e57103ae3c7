//! Arnavi frame decoder
//!
//! Frames are matched in order, first match wins:
//!
//! 1. Handshake `FF 22|23 <id:u64 LE> ...` (at most 18 bytes)
//! 2. Command answer `5B FD <status>` (device already identified)
//! 3. Data frame `5B <parcel ≤ FB> <sub-records ...> 5D` (device already identified)
//! 4. Anything else from an identified device is logged and dropped
//!
//! A data frame carries sub-records back to back:
//!
//! ```text
//! ┌──────┬─────────┬──────────┬─────────────┬──────────┐
//! │ TYPE │ LEN u16 │ TIME u32 │ PAYLOAD     │ CHECKSUM │
//! │ 1    │ 2 (LE)  │ 4 (LE)   │ LEN bytes   │ 1        │
//! └──────┴─────────┴──────────┴─────────────┴──────────┘
//! ```
//!
//! Every data frame is acknowledged once with parcel 1, whether or not its
//! sub-records decoded cleanly.

use super::constants::*;
use super::packet::{ack_frame, checksum, time_sync_frame};
use crate::core::geo::DegreesMinutes;
use crate::core::types::{Decoded, Outbound, TelemetryRecord};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

/// Decode one buffer received from an Arnavi tracker
pub fn decode(device_id: Option<&str>, buf: &[u8]) -> Decoded {
    let mut out = Decoded::default();
    if buf.is_empty() {
        return out;
    }

    if is_handshake(buf) {
        decode_handshake(buf, &mut out);
        return out;
    }

    let Some(device_id) = device_id else {
        log::debug!(
            "Dropping {} bytes before handshake: {}",
            buf.len(),
            hex::encode(&buf[..buf.len().min(16)])
        );
        return out;
    };

    if buf.len() >= 3 && buf[0] == DATA_PREFIX && buf[1] == DATA_TYPE_ANSWER {
        log::debug!("ID:{}, answer to command, code={}", device_id, buf[2]);
    } else if buf.len() >= DATA_HEADER_LEN && buf[0] == DATA_PREFIX && buf[1] <= DATA_MAX_PARCEL {
        decode_data(device_id, &buf[DATA_HEADER_LEN..], &mut out);
    } else {
        log::debug!(
            "ID:{}, unrecognized frame: first={:#04x}, second={:#04x}, last={:#04x}",
            device_id,
            buf[0],
            buf.get(1).copied().unwrap_or(0),
            buf[buf.len() - 1]
        );
    }

    out
}

fn is_handshake(buf: &[u8]) -> bool {
    (HANDSHAKE_MIN_LEN..=HANDSHAKE_MAX_LEN).contains(&buf.len())
        && buf[0] == HANDSHAKE_PREFIX
        && (buf[1] == HANDSHAKE_PLAIN || buf[1] == HANDSHAKE_TIME_SYNC)
}

fn decode_handshake(buf: &[u8], out: &mut Decoded) {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[HANDSHAKE_ID_OFFSET..HANDSHAKE_ID_OFFSET + 8]);
    let device_id = u64::from_le_bytes(raw).to_string();
    log::debug!("ID:{}, handshake variant {:#04x}", device_id, buf[1]);

    let reply = if buf[1] == HANDSHAKE_PLAIN {
        ack_frame(HANDSHAKE_PARCEL)
    } else {
        time_sync_frame(Utc::now().timestamp() as u32)
    };

    out.device_id = Some(device_id);
    out.handshake = true;
    out.replies.push(Outbound::critical(reply));
}

/// Walk the sub-records of a data frame; `packets` starts after the header
fn decode_data(device_id: &str, mut packets: &[u8], out: &mut Decoded) {
    let mut acked = false;

    while let Some(&kind) = packets.first() {
        if kind == DATA_POSTFIX {
            break;
        }

        match kind {
            SUB_PING => {
                out.replies.push(Outbound::ack(ack_frame(DATA_ACK_PARCEL)));
                acked = true;
                break;
            }
            SUB_TAGS => match parse_tags(device_id, packets) {
                Ok((record, consumed)) => {
                    log::debug!("ID={}, packet decoded {:?}", device_id, record);
                    out.records.push(record);
                    if consumed < packets.len() {
                        packets = &packets[consumed..];
                    } else {
                        log::error!(
                            "ID={}: next sub-record offset {} past frame end {}",
                            device_id,
                            consumed,
                            packets.len()
                        );
                        break;
                    }
                }
                Err(e) => {
                    log::error!("ID={}: TAGS sub-record rejected: {}", device_id, e);
                    break;
                }
            },
            SUB_BINARY => match SubHeader::parse(packets) {
                Ok(header) => {
                    log::debug!(
                        "ID={}: BINARY sub-record, data_len={}, packet_time={:?}",
                        device_id,
                        header.len,
                        header.time()
                    );
                    let next = header.total_len();
                    if next < packets.len() {
                        packets = &packets[next..];
                    } else {
                        log::error!(
                            "ID={}: BINARY sub-record overruns frame ({} >= {})",
                            device_id,
                            next,
                            packets.len()
                        );
                        break;
                    }
                }
                Err(e) => {
                    log::error!("ID={}: {}", device_id, e);
                    break;
                }
            },
            SUB_TEXT | SUB_FILE | SUB_CONFIRM => {
                match SubHeader::parse(packets) {
                    Ok(header) => log::debug!(
                        "ID={}: {} sub-record, data_len={}, packet_time={:?}",
                        device_id,
                        sub_record_name(kind),
                        header.len,
                        header.time()
                    ),
                    Err(e) => log::error!("ID={}: {}", device_id, e),
                }
                break;
            }
            SUB_CONFIRM_BY_TOKEN => {
                log::debug!("ID={}: CONFIRM_BY_TOKEN sub-record", device_id);
                break;
            }
            _ => {
                log::debug!(
                    "ID={}: unknown sub-record {:#04x}, data={}",
                    device_id,
                    kind,
                    hex::encode(packets)
                );
                break;
            }
        }
    }

    if !acked {
        out.replies.push(Outbound::ack(ack_frame(DATA_ACK_PARCEL)));
    }
}

fn sub_record_name(kind: u8) -> &'static str {
    match kind {
        SUB_TEXT => "TEXT",
        SUB_FILE => "FILE",
        SUB_CONFIRM => "CONFIRM",
        _ => "UNKNOWN",
    }
}

/// `TYPE LEN TIME` prefix common to every sub-record except ping
#[derive(Debug, Clone, Copy)]
struct SubHeader {
    len: usize,
    unix_time: u32,
}

impl SubHeader {
    fn parse(packets: &[u8]) -> Result<Self> {
        if packets.len() < SUB_HEADER_LEN {
            return Err(Error::InvalidPacket(format!(
                "sub-record header needs {} bytes, have {}",
                SUB_HEADER_LEN,
                packets.len()
            )));
        }
        Ok(Self {
            len: u16::from_le_bytes([packets[1], packets[2]]) as usize,
            unix_time: u32::from_le_bytes([packets[3], packets[4], packets[5], packets[6]]),
        })
    }

    fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.unix_time), 0)
    }

    /// Header + payload + checksum
    fn total_len(&self) -> usize {
        SUB_HEADER_LEN + self.len + 1
    }
}

/// Parse a TAGS sub-record at the start of `packets`
///
/// Returns the record and the number of bytes the sub-record occupies.
fn parse_tags(device_id: &str, packets: &[u8]) -> Result<(TelemetryRecord, usize)> {
    if packets.len() <= 3 {
        return Err(Error::InvalidPacket(format!(
            "TAGS sub-record truncated at {} bytes",
            packets.len()
        )));
    }
    let data_len = u16::from_le_bytes([packets[1], packets[2]]) as usize;
    if data_len + SUB_HEADER_LEN >= packets.len() {
        return Err(Error::InvalidPacket(format!(
            "data_len+7 >= len(packets) {}<>{}",
            data_len,
            packets.len()
        )));
    }

    let header = SubHeader::parse(packets)?;
    let end = SUB_HEADER_LEN + data_len;
    let expected = packets[end];
    let actual = checksum(&packets[3..end]);
    if actual != expected {
        return Err(Error::ChecksumError { expected, actual });
    }

    let record = decode_tags(device_id, header.time(), &packets[SUB_HEADER_LEN..end]);
    Ok((record, header.total_len()))
}

/// Decode 5-byte tag entries; unknown tags are skipped
fn decode_tags(device_id: &str, gps_time: Option<DateTime<Utc>>, payload: &[u8]) -> TelemetryRecord {
    let mut record = TelemetryRecord::new(device_id);
    record.gps_time = gps_time;
    record.gps_valid = true;

    for entry in payload.chunks_exact(TAG_ENTRY_LEN) {
        let value = [entry[1], entry[2], entry[3], entry[4]];
        match entry[0] {
            TAG_VOLTAGE => {
                record.external_voltage = i32::from(i16::from_le_bytes([value[0], value[1]]));
                record.internal_voltage = i32::from(i16::from_le_bytes([value[2], value[3]]));
            }
            TAG_LATITUDE => record.latitude = f32::from_le_bytes(value),
            TAG_LONGITUDE => record.longitude = f32::from_le_bytes(value),
            TAG_ATTRIBUTES => {
                record.heading = (u16::from(value[0]) * 2) % 360;
                record.altitude = i32::from(value[1]) * 10;
                record.satellites = value[2];
                record.speed = (f32::from(value[3]) * KNOTS_TO_KMH) as u16;
            }
            TAG_SIM1_QUALITY => record.signal_level = value[0],
            TAG_ID | TAG_PIN | TAG_SIM1_CELL | TAG_DEVICE_STATUS => {}
            _ => {}
        }
    }

    record.latitude_dm =
        DegreesMinutes::from_decimal(record.latitude, COORD_FRACTION_DIGITS).format_latitude();
    record.longitude_dm =
        DegreesMinutes::from_decimal(record.longitude, COORD_FRACTION_DIGITS).format_longitude();
    record
}

/// Data frame builder for tests and tooling: wraps sub-records in `5B <parcel> ... 5D`
pub fn data_frame(parcel: u8, sub_records: &[&[u8]]) -> Vec<u8> {
    let mut frame = vec![DATA_PREFIX, parcel];
    for sub in sub_records {
        frame.extend_from_slice(sub);
    }
    frame.push(DATA_POSTFIX);
    frame
}

/// TAGS sub-record builder: `01 <len> <time> <payload> <checksum>`
pub fn tags_sub_record(unix_time: u32, payload: &[u8]) -> Vec<u8> {
    let mut sub = vec![SUB_TAGS];
    sub.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    let body_start = sub.len();
    sub.extend_from_slice(&unix_time.to_le_bytes());
    sub.extend_from_slice(payload);
    let sum = checksum(&sub[body_start..]);
    sub.push(sum);
    sub
}

/// Handshake builder: `FF <variant> <id:u64 LE>`
pub fn handshake_frame(variant: u8, device_id: u64) -> Vec<u8> {
    let mut frame = vec![HANDSHAKE_PREFIX, variant];
    frame.extend_from_slice(&device_id.to_le_bytes());
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ID: &str = "860906040000001";

    fn tag(kind: u8, value: [u8; 4]) -> [u8; 5] {
        [kind, value[0], value[1], value[2], value[3]]
    }

    fn position_payload(lat: f32, lon: f32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&tag(TAG_VOLTAGE, [0x10, 0x2F, 0xA0, 0x0F])); // 12048 mV, 4000 mV
        payload.extend_from_slice(&tag(TAG_LATITUDE, lat.to_le_bytes()));
        payload.extend_from_slice(&tag(TAG_LONGITUDE, lon.to_le_bytes()));
        payload.extend_from_slice(&tag(TAG_ATTRIBUTES, [45, 12, 9, 30]));
        payload.extend_from_slice(&tag(TAG_SIM1_QUALITY, [27, 0, 0, 0]));
        payload.extend_from_slice(&tag(TAG_DEVICE_STATUS, [1, 2, 3, 4]));
        payload
    }

    #[test]
    fn test_handshake_plain() {
        let out = decode(None, &handshake_frame(HANDSHAKE_PLAIN, 860906040000001));
        assert_eq!(out.device_id.as_deref(), Some(ID));
        assert!(out.handshake);
        assert_eq!(out.replies, vec![Outbound::critical(vec![0x7B, 0x00, 0x00, 0x7D])]);
    }

    #[test]
    fn test_handshake_time_sync() {
        let before = Utc::now().timestamp() as u32;
        let out = decode(None, &handshake_frame(HANDSHAKE_TIME_SYNC, 42));
        let after = Utc::now().timestamp() as u32;

        assert_eq!(out.device_id.as_deref(), Some("42"));
        let reply = &out.replies[0].bytes;
        assert_eq!(reply.len(), 9);
        assert_eq!(&reply[..3], &[0x7B, 0x04, HANDSHAKE_PARCEL]);
        let ts = u32::from_le_bytes([reply[4], reply[5], reply[6], reply[7]]);
        assert!(ts >= before && ts <= after);
        assert_eq!(reply[3], checksum(&reply[4..8]));
    }

    #[test]
    fn test_oversized_handshake_is_not_a_handshake() {
        let mut frame = handshake_frame(HANDSHAKE_PLAIN, 1);
        frame.resize(HANDSHAKE_MAX_LEN + 1, 0);
        let out = decode(None, &frame);
        assert!(out.is_empty());
    }

    #[test]
    fn test_data_before_handshake_is_ignored() {
        let frame = data_frame(1, &[&tags_sub_record(1_700_000_000, &position_payload(55.0, 37.0))[..]]);
        let out = decode(None, &frame);
        assert!(out.is_empty());
    }

    #[test]
    fn test_tags_record_decoded() {
        let sub = tags_sub_record(1_700_000_000, &position_payload(55.752, 37.617));
        let out = decode(Some(ID), &data_frame(5, &[&sub[..]]));

        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.device_id, ID);
        assert_eq!(r.gps_time.unwrap().timestamp(), 1_700_000_000);
        assert!(r.gps_valid);
        assert_relative_eq!(r.latitude, 55.752);
        assert_relative_eq!(r.longitude, 37.617);
        assert_eq!(r.external_voltage, 0x2F10);
        assert_eq!(r.internal_voltage, 0x0FA0);
        assert_eq!(r.heading, 90);
        assert_eq!(r.altitude, 120);
        assert_eq!(r.satellites, 9);
        assert_eq!(r.speed, 55); // 30 knots
        assert_eq!(r.signal_level, 27);
        assert!(r.latitude_dm.starts_with("5545.1"));
        assert!(r.longitude_dm.starts_with("03737.0"));

        assert_eq!(out.replies, vec![Outbound::ack(vec![0x7B, 0x00, 0x01, 0x7D])]);
    }

    #[test]
    fn test_southern_hemisphere_keeps_sign_in_decimal_only() {
        let sub = tags_sub_record(100, &position_payload(-33.8688, -70.6693));
        let r = &decode(Some(ID), &data_frame(1, &[&sub[..]])).records[0];

        assert!(r.latitude < 0.0 && r.longitude < 0.0);
        assert!(r.latitude_dm.starts_with("3352.1"));
        assert!(r.longitude_dm.starts_with("07040.1"));
    }

    #[test]
    fn test_multiple_tags_records_in_one_frame() {
        let a = tags_sub_record(100, &position_payload(10.0, 20.0));
        let b = tags_sub_record(200, &position_payload(11.0, 21.0));
        let out = decode(Some(ID), &data_frame(1, &[&a[..], &b[..]]));

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].gps_time.unwrap().timestamp(), 100);
        assert_eq!(out.records[1].gps_time.unwrap().timestamp(), 200);
        assert_eq!(out.replies.len(), 1);
    }

    #[test]
    fn test_checksum_round_trip_from_decoded_values() {
        let time = 1_650_000_000u32;
        let mut payload = Vec::new();
        payload.extend_from_slice(&tag(TAG_VOLTAGE, [0x34, 0x12, 0x78, 0x06]));
        payload.extend_from_slice(&tag(TAG_LATITUDE, (-33.8688f32).to_le_bytes()));
        payload.extend_from_slice(&tag(TAG_LONGITUDE, 151.2093f32.to_le_bytes()));
        let sub = tags_sub_record(time, &payload);
        let original_checksum = *sub.last().unwrap();

        let out = decode(Some(ID), &data_frame(1, &[&sub[..]]));
        let r = &out.records[0];

        // Re-encode the decoded values into the same tag layout
        let ext = (r.external_voltage as i16).to_le_bytes();
        let int = (r.internal_voltage as i16).to_le_bytes();
        let mut body = (r.gps_time.unwrap().timestamp() as u32).to_le_bytes().to_vec();
        body.extend_from_slice(&tag(TAG_VOLTAGE, [ext[0], ext[1], int[0], int[1]]));
        body.extend_from_slice(&tag(TAG_LATITUDE, r.latitude.to_le_bytes()));
        body.extend_from_slice(&tag(TAG_LONGITUDE, r.longitude.to_le_bytes()));

        assert_eq!(checksum(&body), original_checksum);
    }

    #[test]
    fn test_declared_length_overrun_rejected() {
        let mut sub = tags_sub_record(100, &position_payload(1.0, 2.0));
        // Declare 6 more bytes than present
        let declared = (sub.len() - SUB_HEADER_LEN) as u16 + 5;
        sub[1..3].copy_from_slice(&declared.to_le_bytes());

        let out = decode(Some(ID), &data_frame(1, &[&sub[..]]));
        assert!(out.records.is_empty());
        // Frame is still acknowledged
        assert_eq!(out.replies.len(), 1);
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let mut sub = tags_sub_record(100, &position_payload(1.0, 2.0));
        let last = sub.len() - 1;
        sub[last] = sub[last].wrapping_add(1);

        let out = decode(Some(ID), &data_frame(1, &[&sub[..]]));
        assert!(out.records.is_empty());
        assert_eq!(out.replies.len(), 1);
    }

    #[test]
    fn test_ping_acks_once_and_stops() {
        let sub = tags_sub_record(100, &position_payload(1.0, 2.0));
        let out = decode(Some(ID), &data_frame(1, &[&[SUB_PING][..], &sub[..]]));
        assert!(out.records.is_empty());
        assert_eq!(out.replies, vec![Outbound::ack(ack_frame(DATA_ACK_PARCEL))]);
    }

    #[test]
    fn test_binary_sub_record_is_skipped() {
        let mut binary = vec![SUB_BINARY, 3, 0, 0, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0x00];
        binary[3..7].copy_from_slice(&50u32.to_le_bytes());
        let tags = tags_sub_record(60, &position_payload(1.0, 2.0));

        let out = decode(Some(ID), &data_frame(1, &[&binary[..], &tags[..]]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].gps_time.unwrap().timestamp(), 60);
    }

    #[test]
    fn test_text_sub_record_stops_processing() {
        let text = [SUB_TEXT, 2, 0, 1, 0, 0, 0, b'h', b'i', 0x00];
        let tags = tags_sub_record(60, &position_payload(1.0, 2.0));

        let out = decode(Some(ID), &data_frame(1, &[&text[..], &tags[..]]));
        assert!(out.records.is_empty());
        assert_eq!(out.replies.len(), 1);
    }

    #[test]
    fn test_file_and_confirm_sub_records_stop_processing() {
        let tags = tags_sub_record(60, &position_payload(1.0, 2.0));
        let cases: [(&str, Vec<u8>); 3] = [
            ("file", vec![SUB_FILE, 1, 0, 1, 0, 0, 0, 0xAA, 0x00]),
            ("confirm", vec![SUB_CONFIRM, 1, 0, 1, 0, 0, 0, 0x01, 0x00]),
            ("confirm by token", vec![SUB_CONFIRM_BY_TOKEN, 0x10, 0x20, 0x30]),
        ];
        let mut frames: Vec<(&str, Vec<u8>)> = cases
            .iter()
            .map(|(name, leading)| (*name, data_frame(1, &[&leading[..], &tags[..]])))
            .collect();
        // Header cut short by the end of the frame
        frames.push(("file, short header", data_frame(1, &[&[SUB_FILE, 1, 0][..]])));

        for (name, frame) in frames {
            let out = decode(Some(ID), &frame);
            assert!(out.records.is_empty(), "{}: records decoded", name);
            assert_eq!(
                out.replies,
                vec![Outbound::ack(ack_frame(DATA_ACK_PARCEL))],
                "{}: expected one parcel-1 ack",
                name
            );
        }
    }

    #[test]
    fn test_unknown_sub_record_still_acked() {
        let out = decode(Some(ID), &data_frame(1, &[&[0x42, 0x00][..]]));
        assert!(out.records.is_empty());
        assert_eq!(out.replies.len(), 1);
    }

    #[test]
    fn test_command_answer_logged_only() {
        let out = decode(Some(ID), &[DATA_PREFIX, DATA_TYPE_ANSWER, 0x00, DATA_POSTFIX]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_unmatched_frame_from_known_device() {
        let out = decode(Some(ID), &[0x11, 0x22, 0x33]);
        assert!(out.is_empty());
    }
}
