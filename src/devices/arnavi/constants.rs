//! Constants for Arnavi trackers

// Handshake (first frame on a connection)
pub const HANDSHAKE_MAX_LEN: usize = 18;
pub const HANDSHAKE_MIN_LEN: usize = 10; // PREF(1) + VARIANT(1) + ID(8)
pub const HANDSHAKE_PREFIX: u8 = 0xFF;
pub const HANDSHAKE_PLAIN: u8 = 0x22; // Reply carries no payload
pub const HANDSHAKE_TIME_SYNC: u8 = 0x23; // Reply carries server Unix time
pub const HANDSHAKE_ID_OFFSET: usize = 2;

// Data frames (device -> server)
pub const READ_BUFFER_LEN: usize = 512;
pub const DATA_PREFIX: u8 = 0x5B;
pub const DATA_POSTFIX: u8 = 0x5D;
pub const DATA_TYPE_ANSWER: u8 = 0xFD; // Answer to a server command
pub const DATA_MAX_PARCEL: u8 = 0xFB;
pub const DATA_HEADER_LEN: usize = 2; // PREF(1) + PARCEL(1)

// Sub-record types
pub const SUB_PING: u8 = 0x00;
pub const SUB_TAGS: u8 = 0x01;
pub const SUB_TEXT: u8 = 0x03;
pub const SUB_FILE: u8 = 0x04;
pub const SUB_BINARY: u8 = 0x06;
pub const SUB_CONFIRM: u8 = 0x08;
pub const SUB_CONFIRM_BY_TOKEN: u8 = 0x09;

// Sub-record layout: TYPE(1) LEN(2) TIME(4) PAYLOAD(LEN) CHECKSUM(1)
pub const SUB_HEADER_LEN: usize = 7;

// Tag entries inside a TAGS sub-record: TAG(1) VALUE(4)
pub const TAG_ENTRY_LEN: usize = 5;
pub const TAG_VOLTAGE: u8 = 1; // External (low u16), internal (high u16), mV
pub const TAG_ID: u8 = 2;
pub const TAG_LATITUDE: u8 = 3; // f32
pub const TAG_LONGITUDE: u8 = 4; // f32
pub const TAG_ATTRIBUTES: u8 = 5; // heading/2, altitude/10, satellites, speed (knots)
pub const TAG_PIN: u8 = 6;
pub const TAG_SIM1_CELL: u8 = 7; // Local area code(2), cell ID(2)
pub const TAG_SIM1_QUALITY: u8 = 8; // Signal level in first byte
pub const TAG_DEVICE_STATUS: u8 = 9;

pub const KNOTS_TO_KMH: f32 = 1.852;
pub const COORD_FRACTION_DIGITS: u32 = 5;

// Server responses (server -> device)
pub const RESP_PREFIX: u8 = 0x7B;
pub const RESP_POSTFIX: u8 = 0x7D;
pub const HANDSHAKE_PARCEL: u8 = 0x00;
pub const DATA_ACK_PARCEL: u8 = 0x01;
pub const SERVER_COMMAND_PARCEL: u8 = 0xFF;
