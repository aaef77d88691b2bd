//! Type definitions for djilive

pub mod discovered;
pub mod error;
pub mod model;
pub mod stream;

pub use discovered::DiscoveredDevice;
pub use error::{Error, Result};
pub use model::{DeviceModel, DeviceVariant};
pub use stream::{ImageStabilization, Resolution, StreamParams};
