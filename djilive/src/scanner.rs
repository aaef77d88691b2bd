//! Camera discovery
//!
//! Reports each DJI camera in range once, identified by the model bytes in
//! its manufacturer data.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use djilive_core::model::{is_dji_device, model_from_manufacturer_data};
use djilive_transport::{Transport, TransportEvent};
use djilive_types::{DeviceModel, DiscoveredDevice};

use crate::error::Result;

/// Scans for DJI cameras
///
/// # Examples
///
/// ```no_run
/// use djilive::{LoopbackTransport, Scanner};
///
/// #[tokio::main]
/// async fn main() -> djilive::Result<()> {
///     let (transport, _peer) = LoopbackTransport::pair();
///     let mut scanner = Scanner::new(transport);
///
///     scanner.start().await?;
///     if let Some(device) = scanner.next_device().await {
///         println!("Found {}", device);
///     }
///     scanner.stop().await?;
///     Ok(())
/// }
/// ```
pub struct Scanner<T: Transport> {
    transport: T,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    discovered: Vec<DiscoveredDevice>,
}

impl<T: Transport> Scanner<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            events: None,
            discovered: Vec::new(),
        }
    }

    /// Start scanning, forgetting devices found by a previous scan
    pub async fn start(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.discovered.clear();
        self.transport.start_discovery(tx).await?;
        self.events = Some(rx);
        info!("Scanning for DJI devices");
        Ok(())
    }

    /// Wait for the next camera not reported before
    ///
    /// Returns `None` once the scan is stopped or the transport goes away.
    pub async fn next_device(&mut self) -> Option<DiscoveredDevice> {
        loop {
            let event = self.events.as_mut()?.recv().await;
            match event {
                Some(TransportEvent::Discovered {
                    id,
                    manufacturer_data,
                }) => {
                    if let Some(device) = self.on_discovered(id, manufacturer_data) {
                        return Some(device);
                    }
                }
                Some(other) => trace!(event = ?other, "Ignoring transport event while scanning"),
                None => {
                    self.events = None;
                    return None;
                }
            }
        }
    }

    fn on_discovered(
        &mut self,
        id: String,
        manufacturer_data: Option<Bytes>,
    ) -> Option<DiscoveredDevice> {
        let manufacturer_data = manufacturer_data?;
        if !is_dji_device(&manufacturer_data) {
            return None;
        }
        if self.discovered.iter().any(|device| device.id == id) {
            trace!(peripheral = %id, "Already reported");
            return None;
        }

        let model =
            model_from_manufacturer_data(&manufacturer_data).unwrap_or(DeviceModel::Unknown);
        debug!(
            peripheral = %id,
            model = %model,
            manufacturer_data = %hex::encode(&manufacturer_data),
            "Discovered DJI device"
        );

        let device = DiscoveredDevice::new(id, model, manufacturer_data);
        self.discovered.push(device.clone());
        Some(device)
    }

    /// Devices reported by the current scan, in discovery order
    pub fn discovered(&self) -> &[DiscoveredDevice] {
        &self.discovered
    }

    pub fn is_scanning(&self) -> bool {
        self.events.is_some()
    }

    /// Stop scanning
    pub async fn stop(&mut self) -> Result<()> {
        self.events = None;
        self.transport.stop_discovery().await?;
        info!(found = self.discovered.len(), "Stopped scanning");
        Ok(())
    }

    /// Give back the transport, e.g. to drive a [`Device`](crate::Device)
    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djilive_transport::LoopbackTransport;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_reports_dji_devices_once() {
        let (transport, peer) = LoopbackTransport::pair();
        let mut scanner = Scanner::new(transport);
        scanner.start().await.unwrap();
        assert!(scanner.is_scanning());

        // Not DJI, no data, then a camera twice
        peer.advertise("phone", Some(Bytes::from_static(&[0x4C, 0x00, 0x10, 0x05])));
        peer.advertise("speaker", None);
        peer.advertise("pocket", Some(Bytes::from_static(&[0xAA, 0x08, 0x20, 0x00])));
        peer.advertise("pocket", Some(Bytes::from_static(&[0xAA, 0x08, 0x20, 0x00])));
        peer.advertise("action", Some(Bytes::from_static(&[0xAA, 0x08, 0x12, 0x00, 0x01])));

        let first = scanner.next_device().await.unwrap();
        assert_eq!(first.id, "pocket");
        assert_eq!(first.model, DeviceModel::OsmoPocket3);

        let second = scanner.next_device().await.unwrap();
        assert_eq!(second.id, "action");
        assert_eq!(second.model, DeviceModel::OsmoAction3);
        assert_eq!(second.manufacturer_data.len(), 5);

        let ids: Vec<&str> = scanner.discovered().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["pocket", "action"]);
    }

    #[tokio::test]
    async fn test_unknown_and_truncated_models() {
        let (transport, peer) = LoopbackTransport::pair();
        let mut scanner = Scanner::new(transport);
        scanner.start().await.unwrap();

        peer.advertise("mystery", Some(Bytes::from_static(&[0xAA, 0x08, 0x99, 0x00])));
        peer.advertise("short", Some(Bytes::from_static(&[0xAA, 0x08])));

        assert_eq!(scanner.next_device().await.unwrap().model, DeviceModel::Unknown);
        assert_eq!(scanner.next_device().await.unwrap().model, DeviceModel::Unknown);
    }

    #[tokio::test]
    async fn test_stop_and_restart() {
        let (transport, peer) = LoopbackTransport::pair();
        let mut scanner = Scanner::new(transport);
        scanner.start().await.unwrap();
        peer.advertise("pocket", Some(Bytes::from_static(&[0xAA, 0x08, 0x20, 0x00])));
        scanner.next_device().await.unwrap();

        scanner.stop().await.unwrap();
        assert!(!scanner.is_scanning());
        assert!(!peer.is_scanning());
        assert_eq!(scanner.next_device().await, None);

        // A new scan reports the same camera again
        scanner.start().await.unwrap();
        assert!(scanner.discovered().is_empty());
        peer.advertise("pocket", Some(Bytes::from_static(&[0xAA, 0x08, 0x20, 0x00])));
        assert_eq!(scanner.next_device().await.unwrap().id, "pocket");

        let transport = scanner.into_transport();
        assert!(!transport.is_connected());
    }
}
