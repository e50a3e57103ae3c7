//! Report Systems record decoder
//!
//! A received buffer is a batch of fixed-size records:
//!
//! ```text
//! ┌───────┬─────────┬──────────┬──────────┬─────────┬─────┬─────────┬───────┐
//! │ AF 84 │ CADENCE │ MEMORY   │ hh mm ss │ DD MM YY│ ... │ ODO x4  │ 0D 0A │
//! │ 0-1   │ 2       │ 3        │ 4-6      │ 7-9     │     │ 49-52   │ 57-58 │
//! └───────┴─────────┴──────────┴──────────┴─────────┴─────┴─────────┴───────┘
//! ```
//!
//! Records whose header or trailer does not match are skipped; the rest of
//! the batch is still decoded. Trailing bytes that do not fill a record are
//! ignored.

use super::constants::*;
use crate::core::geo::DegreesMinutes;
use crate::core::types::{Decoded, Outbound, TelemetryRecord};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Decode every complete record in `buf`
///
/// `device_id` is only used for log context; the identifier in each record is
/// authoritative and the last valid one is returned in [`Decoded::device_id`].
pub fn decode(device_id: Option<&str>, buf: &[u8], time_offset: Duration) -> Decoded {
    let mut out = Decoded::default();
    let descr = device_id.unwrap_or("unknown");

    for (index, raw) in buf.chunks_exact(RECORD_LEN).enumerate() {
        if raw[..2] != RECORD_HEADER || raw[RECORD_LEN - 2..] != RECORD_TRAILER {
            log::debug!(
                "ID:{}, record {} has wrong structure: [0]={:#04x} [1]={:#04x} [57]={:#04x} [58]={:#04x}",
                descr,
                index,
                raw[0],
                raw[1],
                raw[RECORD_LEN - 2],
                raw[RECORD_LEN - 1]
            );
            continue;
        }

        let record = decode_record(raw, time_offset);
        log::debug!("ID={}, packet decoded {:?}", record.device_id, record);

        if unarmor(raw[OFF_CADENCE]) == CADENCE_BACK_REPORT {
            out.replies.push(Outbound::ack(BACK_REPORT_ACK.to_vec()));
        }
        out.device_id = Some(record.device_id.clone());
        out.records.push(record);
    }

    let trailing = buf.len() % RECORD_LEN;
    if trailing != 0 {
        log::debug!("ID:{}, ignoring {} trailing bytes", descr, trailing);
    }

    out
}

#[inline]
fn unarmor(byte: u8) -> u8 {
    byte.wrapping_sub(ARMOR)
}

/// `hi * 100 + lo` from two armored bytes
#[inline]
fn pair(raw: &[u8], offset: usize) -> u32 {
    u32::from(unarmor(raw[offset])) * 100 + u32::from(unarmor(raw[offset + 1]))
}

fn decode_record(raw: &[u8], time_offset: Duration) -> TelemetryRecord {
    let device_id: u64 = ID_WEIGHTS
        .iter()
        .enumerate()
        .map(|(i, w)| u64::from(unarmor(raw[OFF_ID + i])) * w)
        .sum();
    let mut record = TelemetryRecord::new(&device_id.to_string());

    // Overflowing the calendar range is treated like an impossible date
    record.gps_time = device_time(raw).and_then(|t| t.checked_add_signed(time_offset));

    // The fraction pair always holds four minute digits, so a raw 42 is
    // 0.0042' and the string is padded to keep the fixed width
    let lat = DegreesMinutes::new(
        u32::from(unarmor(raw[OFF_LAT_DEG])),
        u32::from(unarmor(raw[OFF_LAT_MIN])),
        pair(raw, OFF_LAT_FRAC),
        COORD_FRACTION_DIGITS,
    );
    let lon = DegreesMinutes::new(
        pair(raw, OFF_LON_DEG),
        u32::from(unarmor(raw[OFF_LON_MIN])),
        pair(raw, OFF_LON_FRAC),
        COORD_FRACTION_DIGITS,
    );
    record.latitude_dm = lat.format_latitude();
    record.longitude_dm = lon.format_longitude();
    record.latitude = lat.to_decimal();
    record.longitude = lon.to_decimal();
    record.gps_valid = record.latitude_dm.len() == VALID_LAT_LEN
        && record.longitude_dm.len() == VALID_LON_LEN
        && record.latitude > 0.0
        && record.longitude > 0.0;

    record.speed = (pair(raw, OFF_SPEED) / 10) as u16;
    record.heading = (pair(raw, OFF_HEADING) % 360) as u16;
    record.external_voltage = i32::from(unarmor(raw[OFF_VOLTAGE])) * 1000
        + i32::from(unarmor(raw[OFF_VOLTAGE + 1])) * 10;
    record.odometer = ODOMETER_WEIGHTS
        .iter()
        .enumerate()
        .map(|(i, w)| u32::from(unarmor(raw[OFF_ODOMETER + i])) * w)
        .sum();
    record.from_memory = unarmor(raw[OFF_FROM_MEMORY]) > 0;

    record
}

/// Device clock as reported, `None` for an impossible calendar value
fn device_time(raw: &[u8]) -> Option<DateTime<Utc>> {
    let field = |offset| u32::from(unarmor(raw[offset]));
    NaiveDate::from_ymd_opt(YEAR_BASE + field(OFF_YEAR) as i32, field(OFF_MONTH), field(OFF_DAY))?
        .and_hms_opt(field(OFF_HOUR), field(OFF_MINUTE), field(OFF_SECOND))
        .map(|naive| naive.and_utc())
}

/// Builder for well-formed records, used by tests and device simulators
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    bytes: [u8; RECORD_LEN],
}

impl RecordBuilder {
    /// Record with every armored field at zero
    pub fn new(device_id: u64) -> Self {
        let mut bytes = [ARMOR; RECORD_LEN];
        bytes[..2].copy_from_slice(&RECORD_HEADER);
        bytes[RECORD_LEN - 2..].copy_from_slice(&RECORD_TRAILER);
        let mut builder = Self { bytes };
        let mut rest = device_id;
        for (i, w) in ID_WEIGHTS.iter().enumerate() {
            builder.set(OFF_ID + i, (rest / w) as u8);
            rest %= w;
        }
        builder
    }

    fn set(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value.wrapping_add(ARMOR);
    }

    fn set_pair(&mut self, offset: usize, value: u32) {
        self.set(offset, (value / 100) as u8);
        self.set(offset + 1, (value % 100) as u8);
    }

    pub fn cadence(mut self, cadence: u8) -> Self {
        self.set(OFF_CADENCE, cadence);
        self
    }

    pub fn from_memory(mut self, from_memory: bool) -> Self {
        self.set(OFF_FROM_MEMORY, u8::from(from_memory));
        self
    }

    /// Calendar fields; `year` is the full year
    pub fn time(mut self, year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        self.set(OFF_YEAR, (year - YEAR_BASE) as u8);
        self.set(OFF_MONTH, month);
        self.set(OFF_DAY, day);
        self.set(OFF_HOUR, hour);
        self.set(OFF_MINUTE, minute);
        self.set(OFF_SECOND, second);
        self
    }

    pub fn latitude(mut self, degrees: u8, minutes: u8, fraction: u32) -> Self {
        self.set(OFF_LAT_DEG, degrees);
        self.set(OFF_LAT_MIN, minutes);
        self.set_pair(OFF_LAT_FRAC, fraction);
        self
    }

    pub fn longitude(mut self, degrees: u32, minutes: u8, fraction: u32) -> Self {
        self.set_pair(OFF_LON_DEG, degrees);
        self.set(OFF_LON_MIN, minutes);
        self.set_pair(OFF_LON_FRAC, fraction);
        self
    }

    /// Speed in tenths of km/h
    pub fn speed_tenths(mut self, speed: u32) -> Self {
        self.set_pair(OFF_SPEED, speed);
        self
    }

    pub fn heading(mut self, heading: u32) -> Self {
        self.set_pair(OFF_HEADING, heading);
        self
    }

    /// Volts and hundredths of a volt
    pub fn voltage(mut self, volts: u8, hundredths: u8) -> Self {
        self.set(OFF_VOLTAGE, volts);
        self.set(OFF_VOLTAGE + 1, hundredths);
        self
    }

    pub fn odometer(mut self, odometer: u32) -> Self {
        let mut rest = odometer;
        for (i, w) in ODOMETER_WEIGHTS.iter().enumerate() {
            self.set(OFF_ODOMETER + i, (rest / w) as u8);
            rest %= w;
        }
        self
    }

    pub fn build(self) -> [u8; RECORD_LEN] {
        self.bytes
    }
}
