//! Frame checksums
//!
//! Two bitwise (table-free) CRCs guard every frame:
//! 1. CRC-8 over the first three header bytes (sync, length, version)
//! 2. CRC-16 over the whole frame except its trailing two checksum bytes
//!
//! Both take input and produce output least-significant-bit first
//! (reflected) and apply no output XOR. The shift register therefore runs
//! in the reflected domain: polynomial and initial value are bit-reversed
//! once, and each byte is XORed into the low end of the register.

use tracing::trace;

/// CRC-8 polynomial (normal form)
pub const CRC8_POLY: u8 = 0x31;

/// CRC-8 initial value (normal form)
pub const CRC8_INIT: u8 = 0xEE;

/// CRC-16 polynomial (normal form)
pub const CRC16_POLY: u16 = 0x1021;

/// CRC-16 initial value (normal form)
pub const CRC16_INIT: u16 = 0x496C;

/// Calculate the header checksum
///
/// # Examples
///
/// ```
/// use djilive_core::checksum;
///
/// assert_eq!(checksum::crc8(&[0x55, 0x0E, 0x04]), 0x66);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    let poly = CRC8_POLY.reverse_bits();
    let mut crc = CRC8_INIT.reverse_bits();

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ poly } else { crc >> 1 };
        }
    }

    crc
}

/// Calculate the frame checksum
///
/// # Examples
///
/// ```
/// use djilive_core::checksum;
///
/// assert_eq!(checksum::crc16(b"123456789"), 0x7109);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let poly = CRC16_POLY.reverse_bits();
    let mut crc = CRC16_INIT.reverse_bits();

    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ poly } else { crc >> 1 };
        }
    }

    trace!(
        len = data.len(),
        checksum = format!("0x{:04X}", crc),
        "Calculated frame checksum"
    );

    crc
}

/// Verify header checksum
pub fn verify_crc8(data: &[u8], expected: u8) -> bool {
    crc8(data) == expected
}

/// Verify frame checksum
pub fn verify_crc16(data: &[u8], expected: u16) -> bool {
    crc16(data) == expected
}
