//! # djilive
//!
//! Rust client for live streaming from DJI cameras over Bluetooth LE.
//!
//! ## Features
//!
//! - Drives the camera from discovery to an RTMP live stream
//! - Async/await API using Tokio
//! - Watchdogs that abandon stalled sessions
//! - Battery telemetry while streaming
//!
//! ## Quick Start
//!
//! ```no_run
//! use djilive::{Device, DeviceModel, LoopbackTransport, StreamParams};
//!
//! #[tokio::main]
//! async fn main() -> djilive::Result<()> {
//!     let (transport, _camera) = LoopbackTransport::pair();
//!
//!     let device = Device::builder("osmo-pocket-3", DeviceModel::OsmoPocket3)
//!         .spawn(transport)?;
//!
//!     let params = StreamParams::new("Home", "secret123", "rtmp://example.com/live");
//!     device.start_stream(params)?;
//!
//!     // ...
//!
//!     device.stop_stream()?;
//!     device.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;
pub mod scanner;
pub mod watchdog;

// Re-exports
pub use device::{Device, DeviceBuilder, StateCallback};
pub use error::{Error, Result};
pub use scanner::Scanner;

// Re-export types
pub use djilive_core::{SessionConfig, SessionState, Watchdog};
pub use djilive_transport::{LoopbackPeer, LoopbackTransport, Transport, TransportEvent};
pub use djilive_types::{
    DeviceModel, DeviceVariant, DiscoveredDevice, ImageStabilization, Resolution, StreamParams,
};
