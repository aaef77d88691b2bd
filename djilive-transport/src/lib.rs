//! Transport layer for DJI cameras
//!
//! Abstracts the BLE central role: scanning, connecting, GATT enumeration,
//! notifications and writes. Asynchronous callbacks from the radio are
//! delivered as [`TransportEvent`]s on the channel handed to
//! [`Transport::start_discovery`].

pub mod error;
pub mod loopback;

pub use error::{Error, Result};
pub use loopback::{LoopbackPeer, LoopbackTransport};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Asynchronous input produced by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peripheral advertised while scanning
    Discovered {
        id: String,
        manufacturer_data: Option<Bytes>,
    },

    /// Value notified on a subscribed characteristic
    Notification { characteristic: u16, data: Bytes },

    /// Connected peripheral went away
    Disconnected,
}

/// Sender half for transport events
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Transport trait for BLE central implementations
///
/// GATT services and characteristics are identified by their 16-bit UUIDs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start scanning; discoveries and later notifications go to `events`
    async fn start_discovery(&mut self, events: EventSender) -> Result<()>;

    /// Stop scanning
    async fn stop_discovery(&mut self) -> Result<()>;

    /// Connect to a discovered peripheral
    async fn connect(&mut self, peripheral_id: &str) -> Result<()>;

    /// List the services of the connected peripheral
    async fn discover_services(&mut self) -> Result<Vec<u16>>;

    /// List the characteristics of one service
    async fn discover_characteristics(&mut self, service: u16) -> Result<Vec<u16>>;

    /// Enable notifications on a characteristic
    async fn subscribe(&mut self, characteristic: u16) -> Result<()>;

    /// Write without response
    async fn write(&mut self, characteristic: u16, data: &[u8]) -> Result<()>;

    /// Disconnect and drop all subscriptions
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;
}
