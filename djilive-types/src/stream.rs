//! Live stream parameters

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Longest string representable behind a one-byte length prefix
pub const MAX_STRING_LEN: usize = 255;

/// Largest payload a single frame can carry
pub const MAX_FRAME_PAYLOAD: usize = 242;

/// Fixed bytes in a start-streaming payload ahead of the URL bytes
pub const START_STREAMING_FIXED_LEN: usize = 14;

/// Longest URL that still fits in one start-streaming frame
pub const MAX_URL_LEN: usize = MAX_FRAME_PAYLOAD - START_STREAMING_FIXED_LEN;

/// Stream resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    R480p,
    R720p,
    #[default]
    R1080p,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Self::R480p, Self::R720p, Self::R1080p];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::R480p => "480p",
            Self::R720p => "720p",
            Self::R1080p => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Parse(format!("unknown resolution '{}'", s)))
    }
}

/// Image stabilization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageStabilization {
    Off,
    RockSteady,
    #[default]
    RockSteadyPlus,
    HorizonBalancing,
    HorizonSteady,
}

impl ImageStabilization {
    pub const ALL: [ImageStabilization; 5] = [
        Self::Off,
        Self::RockSteady,
        Self::RockSteadyPlus,
        Self::HorizonBalancing,
        Self::HorizonSteady,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::RockSteady => "RockSteady",
            Self::RockSteadyPlus => "RockSteady+",
            Self::HorizonBalancing => "HorizonBalancing",
            Self::HorizonSteady => "HorizonSteady",
        }
    }
}

impl fmt::Display for ImageStabilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStabilization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Parse(format!("unknown image stabilization '{}'", s)))
    }
}

/// Everything the camera needs to join Wi-Fi and push a live stream
#[derive(Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub wifi_ssid: String,
    pub wifi_password: String,
    /// Destination RTMP URL
    pub url: String,
    pub resolution: Resolution,
    pub fps: u32,
    /// Bits per second
    pub bitrate: u32,
    pub stabilization: ImageStabilization,
}

impl StreamParams {
    pub fn new(
        wifi_ssid: impl Into<String>,
        wifi_password: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            wifi_ssid: wifi_ssid.into(),
            wifi_password: wifi_password.into(),
            url: url.into(),
            resolution: Resolution::default(),
            fps: 30,
            bitrate: 6_000_000,
            stabilization: ImageStabilization::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set bitrate in bits per second
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_stabilization(mut self, stabilization: ImageStabilization) -> Self {
        self.stabilization = stabilization;
        self
    }

    /// Bitrate in kilobits per second, saturated to the 16-bit wire field
    pub fn bitrate_kbps(&self) -> u16 {
        u16::try_from(self.bitrate / 1000).unwrap_or(u16::MAX)
    }

    /// Check that every field can be encoded into a single frame.
    pub fn validate(&self) -> Result<()> {
        if self.wifi_ssid.is_empty() {
            return Err(Error::Validation("Wi-Fi SSID is empty".into()));
        }
        if self.wifi_password.is_empty() {
            return Err(Error::Validation("Wi-Fi password is empty".into()));
        }
        if self.url.is_empty() {
            return Err(Error::Validation("stream URL is empty".into()));
        }

        let ssid_len = self.wifi_ssid.len();
        let password_len = self.wifi_password.len();
        if ssid_len > MAX_STRING_LEN || password_len > MAX_STRING_LEN {
            return Err(Error::Validation(format!(
                "Wi-Fi credentials too long (ssid {} bytes, password {} bytes, max {})",
                ssid_len, password_len, MAX_STRING_LEN
            )));
        }
        if ssid_len + password_len + 2 > MAX_FRAME_PAYLOAD {
            return Err(Error::Validation(format!(
                "Wi-Fi credentials do not fit in one frame ({} bytes, max {})",
                ssid_len + password_len + 2,
                MAX_FRAME_PAYLOAD
            )));
        }

        if self.url.len() > MAX_URL_LEN {
            return Err(Error::Validation(format!(
                "stream URL too long: {} bytes (max: {} bytes)",
                self.url.len(),
                MAX_URL_LEN
            )));
        }

        if self.bitrate / 1000 > u32::from(u16::MAX) {
            return Err(Error::Validation(format!(
                "bitrate {} bps exceeds {} kbps",
                self.bitrate,
                u16::MAX
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for StreamParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamParams")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &"<redacted>")
            .field("url", &self.url)
            .field("resolution", &self.resolution)
            .field("fps", &self.fps)
            .field("bitrate", &self.bitrate)
            .field("stabilization", &self.stabilization)
            .finish()
    }
}
