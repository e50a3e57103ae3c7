//! Constants for Report Systems trackers

pub const RECORD_LEN: usize = 59;
pub const READ_BUFFER_LEN: usize = 1180; // 20 records
pub const RECORD_HEADER: [u8; 2] = [0xAF, 0x84];
pub const RECORD_TRAILER: [u8; 2] = [0x0D, 0x0A];

/// Every numeric byte is sent as `value + ARMOR`
pub const ARMOR: u8 = 0x20;
pub const YEAR_BASE: i32 = 2000;

// Field offsets inside one record
pub const OFF_CADENCE: usize = 2;
pub const OFF_FROM_MEMORY: usize = 3;
pub const OFF_HOUR: usize = 4;
pub const OFF_MINUTE: usize = 5;
pub const OFF_SECOND: usize = 6;
pub const OFF_DAY: usize = 7;
pub const OFF_MONTH: usize = 8;
pub const OFF_YEAR: usize = 9;
pub const OFF_LAT_DEG: usize = 11;
pub const OFF_LAT_MIN: usize = 12;
pub const OFF_LAT_FRAC: usize = 13; // 2 bytes, hi*100 + lo
pub const OFF_LON_DEG: usize = 15; // 2 bytes, hi*100 + lo
pub const OFF_LON_MIN: usize = 17;
pub const OFF_LON_FRAC: usize = 18; // 2 bytes
pub const OFF_SPEED: usize = 20; // 2 bytes, km/h * 10
pub const OFF_HEADING: usize = 22; // 2 bytes
pub const OFF_ID: usize = 24; // 5 digit groups
pub const OFF_VOLTAGE: usize = 47; // volts, hundredths
pub const OFF_ODOMETER: usize = 49; // 4 digit groups

pub const ID_WEIGHTS: [u64; 5] = [100_000_000, 1_000_000, 10_000, 100, 1];
pub const ODOMETER_WEIGHTS: [u32; 4] = [1_000_000, 10_000, 100, 1];

/// Cadence value of a report the device expects to be confirmed
pub const CADENCE_BACK_REPORT: u8 = 6;
pub const BACK_REPORT_ACK: [u8; 5] = [0x54, 0x53, 0x41, 0x0D, 0x0A]; // "TSA\r\n"

pub const COORD_FRACTION_DIGITS: u32 = 4;
pub const VALID_LAT_LEN: usize = 9; // DDMM.ffff
pub const VALID_LON_LEN: usize = 10; // DDDMM.ffff
