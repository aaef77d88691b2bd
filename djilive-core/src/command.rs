//! Request kinds sent to the camera

use std::fmt;

use bytes::Bytes;

use crate::{constants::requests::*, frame::Frame};

/// Requests the client can send
///
/// Each kind is routed with a fixed target, transaction id and command
/// type. Responses carry the same transaction id back.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Request {
    Pair,
    StopStreaming,
    PrepareToStream,
    SetupWifi,
    Configure,
    StartStreaming,
}

impl Request {
    pub const ALL: [Request; 6] = [
        Self::Pair,
        Self::StopStreaming,
        Self::PrepareToStream,
        Self::SetupWifi,
        Self::Configure,
        Self::StartStreaming,
    ];

    /// Logical endpoint the request is addressed to
    pub fn target(self) -> u16 {
        match self {
            Self::Pair => PAIR_TARGET,
            Self::StopStreaming => STOP_STREAMING_TARGET,
            Self::PrepareToStream => PREPARE_TO_STREAM_TARGET,
            Self::SetupWifi => SETUP_WIFI_TARGET,
            Self::Configure => CONFIGURE_TARGET,
            Self::StartStreaming => START_STREAMING_TARGET,
        }
    }

    /// Transaction id the matching response echoes
    pub fn transaction_id(self) -> u16 {
        match self {
            Self::Pair => PAIR_TRANSACTION_ID,
            Self::StopStreaming => STOP_STREAMING_TRANSACTION_ID,
            Self::PrepareToStream => PREPARE_TO_STREAM_TRANSACTION_ID,
            Self::SetupWifi => SETUP_WIFI_TRANSACTION_ID,
            Self::Configure => CONFIGURE_TRANSACTION_ID,
            Self::StartStreaming => START_STREAMING_TRANSACTION_ID,
        }
    }

    /// Protocol operation code
    pub fn command_type(self) -> u32 {
        match self {
            Self::Pair => PAIR_TYPE,
            Self::StopStreaming => STOP_STREAMING_TYPE,
            Self::PrepareToStream => PREPARE_TO_STREAM_TYPE,
            Self::SetupWifi => SETUP_WIFI_TYPE,
            Self::Configure => CONFIGURE_TYPE,
            Self::StartStreaming => START_STREAMING_TYPE,
        }
    }

    /// Get request name
    pub fn name(self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::StopStreaming => "STOP_STREAMING",
            Self::PrepareToStream => "PREPARE_TO_STREAM",
            Self::SetupWifi => "SETUP_WIFI",
            Self::Configure => "CONFIGURE",
            Self::StartStreaming => "START_STREAMING",
        }
    }

    /// Build the frame for this request around an encoded payload
    pub fn frame(self, payload: impl Into<Bytes>) -> Frame {
        Frame::new(
            self.target(),
            self.transaction_id(),
            self.command_type(),
            payload,
        )
    }

    /// Check whether `frame` answers this request
    pub fn is_answered_by(self, frame: &Frame) -> bool {
        frame.transaction_id == self.transaction_id()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:04X})", self.name(), self.transaction_id())
    }
}
