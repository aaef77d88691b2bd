//! Wire frame structure and encoding/decoding

use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::trace;

use crate::{
    checksum,
    constants::{PROTOCOL_VERSION, SYNC_BYTE},
    error::{Error, Result},
};

/// One protocol message
///
/// # Frame Structure
///
/// ```text
/// ┌──────┬────────┬─────────┬───────┬────────┬─────────┬──────────┬─────────┬────────┐
/// │ Sync │ Length │ Version │ CRC-8 │ Target │ TransID │ CmdType  │ Payload │ CRC-16 │
/// │ 0x55 │ 1 byte │  0x04   │ 1 byte│ LE u16 │ LE u16  │ LE u24   │ N bytes │ LE u16 │
/// └──────┴────────┴─────────┴───────┴────────┴─────────┴──────────┴─────────┴────────┘
/// ```
///
/// `Length` is the size of the whole frame (13 + N). CRC-8 covers the first
/// three bytes, CRC-16 covers everything before itself.
///
/// # Examples
///
/// ```
/// use djilive_core::Frame;
///
/// let frame = Frame::new(0x0802, 0x8C12, 0xE10240, vec![0x1A]);
/// let encoded = frame.encode().unwrap();
/// assert_eq!(encoded.len(), 14);
///
/// let decoded = Frame::decode(&encoded).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Logical endpoint on the camera
    pub target: u16,

    /// Correlates a request with its response
    pub transaction_id: u16,

    /// Protocol operation code (24 bits on the wire)
    pub command_type: u32,

    /// Command-specific data
    pub payload: Bytes,
}

impl Frame {
    /// Bytes ahead of the payload
    pub const HEADER_SIZE: usize = 11;

    /// Trailing checksum bytes
    pub const TRAILER_SIZE: usize = 2;

    /// Frame size with an empty payload
    pub const OVERHEAD: usize = Self::HEADER_SIZE + Self::TRAILER_SIZE;

    /// Largest frame representable by the one-byte length field
    pub const MAX_SIZE: usize = u8::MAX as usize;

    /// Maximum payload size
    pub const MAX_PAYLOAD_SIZE: usize = Self::MAX_SIZE - Self::OVERHEAD;

    /// Largest command type that fits in 24 bits
    pub const MAX_COMMAND_TYPE: u32 = 0x00FF_FFFF;

    /// Create a frame
    pub fn new(
        target: u16,
        transaction_id: u16,
        command_type: u32,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            target,
            transaction_id,
            command_type,
            payload: payload.into(),
        }
    }

    /// Encode frame to bytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The payload is larger than [`Frame::MAX_PAYLOAD_SIZE`]
    /// - The command type does not fit in 24 bits
    pub fn encode(&self) -> Result<BytesMut> {
        if self.payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max: Self::MAX_PAYLOAD_SIZE,
            });
        }
        if self.command_type > Self::MAX_COMMAND_TYPE {
            return Err(Error::CommandTypeOutOfRange(self.command_type));
        }

        let total_size = self.size();
        let mut buf = BytesMut::with_capacity(total_size);

        // Header
        buf.put_u8(SYNC_BYTE);
        buf.put_u8(total_size as u8);
        buf.put_u8(PROTOCOL_VERSION);
        let header_crc = checksum::crc8(&buf[..3]);
        buf.put_u8(header_crc);

        // Routing (little-endian)
        buf.put_u16_le(self.target);
        buf.put_u16_le(self.transaction_id);
        let mut command_type = [0u8; 3];
        LittleEndian::write_u24(&mut command_type, self.command_type);
        buf.put_slice(&command_type);

        buf.put_slice(&self.payload);

        let frame_crc = checksum::crc16(&buf);
        buf.put_u16_le(frame_crc);

        trace!(
            target_id = format!("0x{:04X}", self.target),
            transaction_id = format!("0x{:04X}", self.transaction_id),
            command_type = format!("0x{:06X}", self.command_type),
            len = total_size,
            "Encoded frame"
        );

        Ok(buf)
    }

    /// Decode frame from bytes
    ///
    /// Checks run in wire order, so a corrupted header is reported before
    /// the frame checksum is evaluated.
    ///
    /// # Errors
    ///
    /// Returns a distinct error if:
    /// - The first byte is not `0x55`
    /// - The declared length differs from the buffer length
    /// - The buffer is shorter than an empty frame
    /// - The version byte is not `0x04`
    /// - The header checksum does not match
    /// - The frame checksum does not match
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let sync = *buf.first().ok_or(Error::PacketTooShort {
            expected: Self::OVERHEAD,
            actual: 0,
        })?;
        if sync != SYNC_BYTE {
            return Err(Error::BadSyncByte(sync));
        }

        let declared = *buf.get(1).ok_or(Error::PacketTooShort {
            expected: Self::OVERHEAD,
            actual: buf.len(),
        })? as usize;
        if declared != buf.len() {
            return Err(Error::LengthMismatch {
                declared,
                actual: buf.len(),
            });
        }

        if buf.len() < Self::OVERHEAD {
            return Err(Error::PacketTooShort {
                expected: Self::OVERHEAD,
                actual: buf.len(),
            });
        }

        let version = buf[2];
        if version != PROTOCOL_VERSION {
            return Err(Error::BadVersion(version));
        }

        let header_crc = buf[3];
        if !checksum::verify_crc8(&buf[..3], header_crc) {
            return Err(Error::HeaderChecksumMismatch {
                expected: checksum::crc8(&buf[..3]),
                received: header_crc,
            });
        }

        let (body, trailer) = buf.split_at(buf.len() - Self::TRAILER_SIZE);
        let frame_crc = LittleEndian::read_u16(trailer);
        if !checksum::verify_crc16(body, frame_crc) {
            return Err(Error::FrameChecksumMismatch {
                expected: checksum::crc16(body),
                received: frame_crc,
            });
        }

        let mut reader = &body[4..];
        let target = reader.get_u16_le();
        let transaction_id = reader.get_u16_le();
        let command_type = LittleEndian::read_u24(reader);
        reader.advance(3);

        let frame = Self {
            target,
            transaction_id,
            command_type,
            payload: Bytes::copy_from_slice(reader),
        };

        trace!(frame = %frame, "Decoded frame");

        Ok(frame)
    }

    /// Get total encoded size
    pub fn size(&self) -> usize {
        Self::OVERHEAD + self.payload.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("target", &format!("0x{:04X}", self.target))
            .field("transaction_id", &format!("0x{:04X}", self.transaction_id))
            .field("command_type", &format!("0x{:06X}", self.command_type))
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame(target=0x{:04X}, id=0x{:04X}, type=0x{:06X}, len={})",
            self.target,
            self.transaction_id,
            self.command_type,
            self.payload.len()
        )
    }
}
