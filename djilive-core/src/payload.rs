//! Request payload encoders
//!
//! Every encoder is a pure function of its inputs. Strings are packed as a
//! one-byte length followed by UTF-8 bytes; the stream URL uses a two-byte
//! length field whose high byte is always zero, so it is limited to 255
//! bytes like every other string.

use bytes::{BufMut, Bytes, BytesMut};

use djilive_types::{DeviceVariant, ImageStabilization, Resolution};

use crate::{
    constants::{payloads, variant},
    error::{Error, Result},
};

/// Longest string a one-byte length prefix can describe
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

/// Wire code for a stream resolution
pub fn resolution_code(resolution: Resolution) -> u8 {
    match resolution {
        Resolution::R480p => 0x47,
        Resolution::R720p => 0x04,
        Resolution::R1080p => 0x0A,
    }
}

/// Wire code for a frame rate; rates without a dedicated code map to 0
pub fn fps_code(fps: u32) -> u8 {
    match fps {
        25 => 2,
        30 => 3,
        _ => 0,
    }
}

/// Wire code for an image stabilization mode
pub fn stabilization_code(stabilization: ImageStabilization) -> u8 {
    match stabilization {
        ImageStabilization::Off => 0,
        ImageStabilization::RockSteady => 1,
        ImageStabilization::HorizonSteady => 2,
        ImageStabilization::RockSteadyPlus => 3,
        ImageStabilization::HorizonBalancing => 4,
    }
}

/// Variant selector byte inside the configure payload
pub fn configure_selector(device_variant: DeviceVariant) -> u8 {
    match device_variant {
        DeviceVariant::Standard => variant::CONFIGURE_STANDARD,
        DeviceVariant::Extended => variant::CONFIGURE_EXTENDED,
    }
}

/// Variant selector byte inside the start-streaming payload
pub fn start_streaming_selector(device_variant: DeviceVariant) -> u8 {
    match device_variant {
        DeviceVariant::Standard => variant::START_STREAMING_STANDARD,
        DeviceVariant::Extended => variant::START_STREAMING_EXTENDED,
    }
}

fn string_len(value: &str) -> Result<u8> {
    u8::try_from(value.len()).map_err(|_| Error::StringTooLong {
        size: value.len(),
        max: MAX_STRING_LEN,
    })
}

fn put_string(buf: &mut BytesMut, value: &str) -> Result<()> {
    buf.put_u8(string_len(value)?);
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn put_url(buf: &mut BytesMut, url: &str) -> Result<()> {
    buf.put_u8(string_len(url)?);
    buf.put_u8(0);
    buf.put_slice(url.as_bytes());
    Ok(())
}

/// Pair request: authentication token followed by the PIN
pub fn pair(pin: &str) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(payloads::PAIR_TOKEN.len() + 1 + pin.len());
    buf.put_slice(&payloads::PAIR_TOKEN);
    put_string(&mut buf, pin)?;
    Ok(buf.freeze())
}

/// Stop-streaming request
pub fn stop_streaming() -> Bytes {
    Bytes::from_static(&payloads::STOP_STREAMING)
}

/// Prepare-to-stream request
pub fn prepare_to_stream() -> Bytes {
    Bytes::from_static(&payloads::PREPARE_TO_STREAM)
}

/// Wi-Fi setup request: SSID then password
pub fn setup_wifi(ssid: &str, password: &str) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(2 + ssid.len() + password.len());
    put_string(&mut buf, ssid)?;
    put_string(&mut buf, password)?;
    Ok(buf.freeze())
}

/// Image stabilization configuration request
pub fn configure(stabilization: ImageStabilization, device_variant: DeviceVariant) -> Bytes {
    let mut buf = BytesMut::with_capacity(6);
    buf.put_slice(&payloads::CONFIGURE_PREFIX);
    buf.put_u8(configure_selector(device_variant));
    buf.put_slice(&payloads::CONFIGURE_INFIX);
    buf.put_u8(stabilization_code(stabilization));
    buf.freeze()
}

/// Start-streaming request
pub fn start_streaming(
    url: &str,
    resolution: Resolution,
    fps: u32,
    bitrate_kbps: u16,
    device_variant: DeviceVariant,
) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(14 + url.len());
    buf.put_slice(&payloads::START_STREAMING_PREFIX);
    buf.put_u8(start_streaming_selector(device_variant));
    buf.put_slice(&payloads::START_STREAMING_INFIX);
    buf.put_u8(resolution_code(resolution));
    buf.put_u16_le(bitrate_kbps);
    buf.put_slice(&payloads::START_STREAMING_PRE_FPS);
    buf.put_u8(fps_code(fps));
    buf.put_slice(&payloads::START_STREAMING_PRE_URL);
    put_url(&mut buf, url)?;
    Ok(buf.freeze())
}
