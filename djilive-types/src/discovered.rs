//! Discovered device information

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::model::DeviceModel;

/// A camera seen while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Transport-level peripheral identifier
    pub id: String,

    /// Model identified from the advertising data
    pub model: DeviceModel,

    /// Raw manufacturer-specific advertising data
    pub manufacturer_data: Bytes,

    /// When the device was first seen
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredDevice {
    pub fn new(id: impl Into<String>, model: DeviceModel, manufacturer_data: Bytes) -> Self {
        Self {
            id: id.into(),
            model,
            manufacturer_data,
            discovered_at: Utc::now(),
        }
    }
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device[{}: {}]", self.id, self.model)
    }
}
