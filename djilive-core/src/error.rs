//! Error types for djilive-core

/// Result type alias for djilive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Buffer is too short to hold a frame
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    PacketTooShort {
        expected: usize,
        actual: usize,
    },

    /// First byte is not the sync byte
    #[error("Bad sync byte: 0x{0:02X}")]
    BadSyncByte(u8),

    /// Declared length does not match the received byte count
    #[error("Length mismatch: header declares {declared} bytes, received {actual} bytes")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },

    /// Unsupported protocol version byte
    #[error("Bad version byte: 0x{0:02X}")]
    BadVersion(u8),

    /// Header CRC-8 verification failed
    #[error("Header checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    HeaderChecksumMismatch {
        expected: u8,
        received: u8,
    },

    /// Frame CRC-16 verification failed
    #[error("Frame checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    FrameChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Payload does not fit in a single frame
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// String does not fit behind a one-byte length prefix
    #[error("String too long: {size} bytes (max: {max} bytes)")]
    StringTooLong {
        size: usize,
        max: usize,
    },

    /// Command type does not fit in 24 bits
    #[error("Command type out of range: 0x{0:X}")]
    CommandTypeOutOfRange(u32),
}

impl Error {
    /// Check if the error was raised while decoding a received frame
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::PacketTooShort { .. }
                | Self::BadSyncByte(_)
                | Self::LengthMismatch { .. }
                | Self::BadVersion(_)
                | Self::HeaderChecksumMismatch { .. }
                | Self::FrameChecksumMismatch { .. }
        )
    }

    /// Check if the error was raised while encoding an outgoing frame
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            Self::PayloadTooLarge { .. }
                | Self::StringTooLong { .. }
                | Self::CommandTypeOutOfRange(_)
        )
    }
}
