//! # djilive-core
//!
//! Core protocol implementation for DJI cameras over Bluetooth LE.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - Checksum calculation
//! - Request routing and payload encoders
//! - Camera identification from advertising data
//! - The live stream session state machine

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod model;
pub mod payload;
pub mod session;

pub use command::Request;
pub use error::{Error, Result};
pub use frame::Frame;
pub use session::{
    validate_pairing_pin, Effect, Event, Session, SessionConfig, SessionState, Watchdog,
};
