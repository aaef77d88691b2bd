//! Protocol constants

use std::time::Duration;

/// First byte of every frame
pub const SYNC_BYTE: u8 = 0x55;

/// Only protocol version understood
pub const PROTOCOL_VERSION: u8 = 0x04;

/// Default pairing PIN
pub const DEFAULT_PAIRING_PIN: &str = "love";

/// Time allowed from start request until the stream is live
pub const START_TIMEOUT: Duration = Duration::from_secs(60);

/// Time allowed for the camera to acknowledge a stop request
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// BLE GATT identifiers
pub mod gatt {
    /// Characteristic the camera notifies responses on
    pub const NOTIFY_CHARACTERISTIC: u16 = 0xFFF4;

    /// Characteristic requests are written to
    pub const WRITE_CHARACTERISTIC: u16 = 0xFFF5;

    /// Manufacturer id bytes leading the advertising data
    pub const MANUFACTURER_ID: [u8; 2] = [0xAA, 0x08];
}

/// Model identifiers at bytes 2..4 of the manufacturer data
pub mod models {
    pub const OSMO_ACTION_3: [u8; 2] = [0x12, 0x00];
    pub const OSMO_ACTION_4: [u8; 2] = [0x14, 0x00];
    pub const OSMO_POCKET_3: [u8; 2] = [0x20, 0x00];
}

/// Per-request routing: target, transaction id, command type
pub mod requests {
    pub const PAIR_TARGET: u16 = 0x0702;
    pub const PAIR_TRANSACTION_ID: u16 = 0x8092;
    pub const PAIR_TYPE: u32 = 0x45_0740;

    pub const STOP_STREAMING_TARGET: u16 = 0x0802;
    pub const STOP_STREAMING_TRANSACTION_ID: u16 = 0xEAC8;
    pub const STOP_STREAMING_TYPE: u32 = 0x8E_0240;

    pub const PREPARE_TO_STREAM_TARGET: u16 = 0x0802;
    pub const PREPARE_TO_STREAM_TRANSACTION_ID: u16 = 0x8C12;
    pub const PREPARE_TO_STREAM_TYPE: u32 = 0xE1_0240;

    pub const SETUP_WIFI_TARGET: u16 = 0x0702;
    pub const SETUP_WIFI_TRANSACTION_ID: u16 = 0x8C19;
    pub const SETUP_WIFI_TYPE: u32 = 0x47_0740;

    pub const CONFIGURE_TARGET: u16 = 0x0102;
    pub const CONFIGURE_TRANSACTION_ID: u16 = 0x8C2D;
    pub const CONFIGURE_TYPE: u32 = 0x8E_0240;

    pub const START_STREAMING_TARGET: u16 = 0x0802;
    pub const START_STREAMING_TRANSACTION_ID: u16 = 0x8C2C;
    pub const START_STREAMING_TYPE: u32 = 0x78_0840;
}

/// Fixed byte groups inside request payloads
pub mod payloads {
    /// Authentication token leading every pair request
    pub const PAIR_TOKEN: [u8; 33] = [
        0x20, 0x32, 0x38, 0x34, 0x61, 0x65, 0x35, 0x62, 0x38, 0x64, 0x37, 0x36,
        0x62, 0x33, 0x33, 0x37, 0x35, 0x61, 0x30, 0x34, 0x61, 0x36, 0x34, 0x31,
        0x37, 0x61, 0x64, 0x37, 0x31, 0x62, 0x65, 0x61, 0x33,
    ];

    pub const STOP_STREAMING: [u8; 6] = [0x01, 0x01, 0x1A, 0x00, 0x01, 0x02];

    pub const PREPARE_TO_STREAM: [u8; 1] = [0x1A];

    pub const CONFIGURE_PREFIX: [u8; 2] = [0x01, 0x01];
    pub const CONFIGURE_INFIX: [u8; 2] = [0x00, 0x01];

    pub const START_STREAMING_PREFIX: [u8; 1] = [0x00];
    pub const START_STREAMING_INFIX: [u8; 1] = [0x00];
    pub const START_STREAMING_PRE_FPS: [u8; 2] = [0x02, 0x00];
    pub const START_STREAMING_PRE_URL: [u8; 3] = [0x00, 0x00, 0x00];

    /// Pair response payload meaning the camera already trusts this client
    pub const ALREADY_PAIRED: [u8; 2] = [0x00, 0x01];
}

/// Variant selector bytes
pub mod variant {
    pub const CONFIGURE_STANDARD: u8 = 0x08;
    pub const CONFIGURE_EXTENDED: u8 = 0x1A;
    pub const START_STREAMING_STANDARD: u8 = 0x2E;
    pub const START_STREAMING_EXTENDED: u8 = 0x2A;
}

/// Unsolicited status frames
pub mod telemetry {
    /// Command type of the periodic status frame carrying battery level
    pub const BATTERY_TYPE: u32 = 0x02_0D00;

    /// Payload index of the battery percentage byte
    pub const BATTERY_OFFSET: usize = 20;
}
