//! In-memory transport
//!
//! [`LoopbackTransport`] plays the central role; its [`LoopbackPeer`] plays
//! the camera. The peer advertises, notifies, and reads back everything the
//! central wrote. Used by tests and demos where no radio is available.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use djilive_core::constants::gatt;

use crate::{error::*, EventSender, Transport, TransportEvent};

/// Service exposed by default, holding the notify and write characteristics
pub const DEFAULT_SERVICE: u16 = 0xFFF0;

#[derive(Debug)]
struct Shared {
    events: Option<EventSender>,
    scanning: bool,
    connected: Option<String>,
    subscriptions: HashSet<u16>,
    advertised: HashSet<String>,
    services: BTreeMap<u16, Vec<u16>>,
    connect_failure: Option<String>,
}

impl Shared {
    fn has_characteristic(&self, characteristic: u16) -> bool {
        self.services
            .values()
            .any(|chars| chars.contains(&characteristic))
    }

    fn send(&self, event: TransportEvent) -> bool {
        match &self.events {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }
}

/// Central side of an in-memory link
pub struct LoopbackTransport {
    shared: Arc<Mutex<Shared>>,
    writes: mpsc::UnboundedSender<(u16, Bytes)>,
}

/// Camera side of an in-memory link
pub struct LoopbackPeer {
    shared: Arc<Mutex<Shared>>,
    writes: mpsc::UnboundedReceiver<(u16, Bytes)>,
}

impl LoopbackTransport {
    /// Create a connected transport/peer pair
    ///
    /// The peer exposes [`DEFAULT_SERVICE`] with the notify and write
    /// characteristics.
    pub fn pair() -> (Self, LoopbackPeer) {
        let mut services = BTreeMap::new();
        services.insert(
            DEFAULT_SERVICE,
            vec![gatt::NOTIFY_CHARACTERISTIC, gatt::WRITE_CHARACTERISTIC],
        );

        let shared = Arc::new(Mutex::new(Shared {
            events: None,
            scanning: false,
            connected: None,
            subscriptions: HashSet::new(),
            advertised: HashSet::new(),
            services,
            connect_failure: None,
        }));
        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                shared: shared.clone(),
                writes: tx,
            },
            LoopbackPeer { shared, writes: rx },
        )
    }

    fn require_connected(shared: &Shared) -> Result<()> {
        if shared.connected.is_none() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn start_discovery(&mut self, events: EventSender) -> Result<()> {
        let mut shared = self.shared.lock();
        debug!("Loopback discovery started");
        shared.events = Some(events);
        shared.scanning = true;
        Ok(())
    }

    async fn stop_discovery(&mut self) -> Result<()> {
        self.shared.lock().scanning = false;
        debug!("Loopback discovery stopped");
        Ok(())
    }

    async fn connect(&mut self, peripheral_id: &str) -> Result<()> {
        let mut shared = self.shared.lock();

        if shared.connected.is_some() {
            return Err(Error::AlreadyConnected);
        }
        if let Some(reason) = &shared.connect_failure {
            return Err(Error::ConnectionFailed {
                peripheral: peripheral_id.to_string(),
                reason: reason.clone(),
            });
        }
        if !shared.advertised.contains(peripheral_id) {
            return Err(Error::PeripheralNotFound(peripheral_id.to_string()));
        }

        debug!(peripheral = %peripheral_id, "Loopback connected");
        shared.connected = Some(peripheral_id.to_string());
        Ok(())
    }

    async fn discover_services(&mut self) -> Result<Vec<u16>> {
        let shared = self.shared.lock();
        Self::require_connected(&shared)?;
        Ok(shared.services.keys().copied().collect())
    }

    async fn discover_characteristics(&mut self, service: u16) -> Result<Vec<u16>> {
        let shared = self.shared.lock();
        Self::require_connected(&shared)?;
        shared
            .services
            .get(&service)
            .cloned()
            .ok_or_else(|| Error::DiscoveryFailed(format!("unknown service 0x{:04X}", service)))
    }

    async fn subscribe(&mut self, characteristic: u16) -> Result<()> {
        let mut shared = self.shared.lock();
        Self::require_connected(&shared)?;
        if !shared.has_characteristic(characteristic) {
            return Err(Error::CharacteristicNotFound(characteristic));
        }
        shared.subscriptions.insert(characteristic);
        Ok(())
    }

    async fn write(&mut self, characteristic: u16, data: &[u8]) -> Result<()> {
        {
            let shared = self.shared.lock();
            Self::require_connected(&shared)?;
            if !shared.has_characteristic(characteristic) {
                return Err(Error::CharacteristicNotFound(characteristic));
            }
        }

        trace!(
            characteristic = format!("0x{:04X}", characteristic),
            data = %hex::encode(data),
            "Loopback write"
        );

        self.writes
            .send((characteristic, Bytes::copy_from_slice(data)))
            .map_err(|_| Error::ChannelClosed)
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        if let Some(peripheral) = shared.connected.take() {
            debug!(peripheral = %peripheral, "Loopback disconnected");
        }
        shared.subscriptions.clear();
        shared.scanning = false;
        shared.events = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.lock().connected.is_some()
    }
}

impl LoopbackPeer {
    /// Advertise a peripheral. Returns true if a scan observed it.
    pub fn advertise(&self, id: impl Into<String>, manufacturer_data: Option<Bytes>) -> bool {
        let id = id.into();
        let mut shared = self.shared.lock();
        shared.advertised.insert(id.clone());

        if !shared.scanning {
            return false;
        }
        shared.send(TransportEvent::Discovered {
            id,
            manufacturer_data,
        })
    }

    /// Notify a value. Returns true if the central is subscribed and listening.
    pub fn notify(&self, characteristic: u16, data: impl Into<Bytes>) -> bool {
        let shared = self.shared.lock();
        if shared.connected.is_none() || !shared.subscriptions.contains(&characteristic) {
            return false;
        }
        shared.send(TransportEvent::Notification {
            characteristic,
            data: data.into(),
        })
    }

    /// Drop the link from the peripheral side
    pub fn drop_connection(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.connected.take().is_none() {
            return false;
        }
        shared.subscriptions.clear();
        shared.send(TransportEvent::Disconnected)
    }

    /// Make every connect attempt fail with `reason`, or succeed again with `None`
    pub fn set_connect_failure(&self, reason: Option<String>) {
        self.shared.lock().connect_failure = reason;
    }

    /// Replace the GATT table
    pub fn set_services(&self, services: impl IntoIterator<Item = (u16, Vec<u16>)>) {
        self.shared.lock().services = services.into_iter().collect();
    }

    /// Wait for the next write from the central
    pub async fn next_write(&mut self) -> Option<(u16, Bytes)> {
        self.writes.recv().await
    }

    /// Take a write if one is already queued
    pub fn try_next_write(&mut self) -> Option<(u16, Bytes)> {
        self.writes.try_recv().ok()
    }

    pub fn is_scanning(&self) -> bool {
        self.shared.lock().scanning
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected.is_some()
    }

    pub fn is_subscribed(&self, characteristic: u16) -> bool {
        self.shared.lock().subscriptions.contains(&characteristic)
    }
}
