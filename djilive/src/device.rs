//! High-level device interface
//!
//! [`Device`] is a cloneable handle to a background driver task. The driver
//! owns the [`Session`], the transport and the watchdogs, and is the only
//! place session events are handled: caller requests, transport callbacks
//! and watchdog expiries all funnel through it one at a time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use djilive_core::{
    constants::gatt, validate_pairing_pin, Effect, Event, Session, SessionConfig, SessionState,
};
use djilive_transport::{Transport, TransportEvent};
use djilive_types::{DeviceModel, DeviceVariant, StreamParams};

use crate::error::{Error, Result};
use crate::watchdog::{Expiry, Watchdogs};

/// Callback invoked on every session state change
pub type StateCallback = Arc<dyn Fn(SessionState) + Send + Sync>;

/// Values mirrored from the driver for synchronous reads
#[derive(Debug, Clone)]
struct Status {
    state: SessionState,
    model: DeviceModel,
    battery_percentage: Option<u8>,
    pairing_pin: String,
}

enum Command {
    Start(StreamParams),
    Stop,
    SetPairingPin(String, oneshot::Sender<Result<()>>),
    Shutdown(oneshot::Sender<()>),
}

/// DJI camera
///
/// # Examples
///
/// ```no_run
/// use djilive::{Device, DeviceModel, LoopbackTransport, StreamParams};
///
/// #[tokio::main]
/// async fn main() -> djilive::Result<()> {
///     let (transport, _camera) = LoopbackTransport::pair();
///
///     let device = Device::builder("osmo-action-4", DeviceModel::OsmoAction4)
///         .on_state_change(|state| println!("State: {}", state))
///         .spawn(transport)?;
///
///     device.start_stream(StreamParams::new("Home", "secret123", "rtmp://example.com/live"))?;
///
///     device.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Device {
    peripheral_id: String,
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<RwLock<Status>>,
}

impl Device {
    /// Configure a device for the given peripheral
    pub fn builder(peripheral_id: impl Into<String>, model: DeviceModel) -> DeviceBuilder {
        DeviceBuilder {
            peripheral_id: peripheral_id.into(),
            model,
            config: SessionConfig::default(),
            on_state_change: None,
        }
    }

    pub fn peripheral_id(&self) -> &str {
        &self.peripheral_id
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.status.read().state
    }

    /// Camera model, possibly identified from advertising data
    pub fn model(&self) -> DeviceModel {
        self.status.read().model
    }

    /// Last battery level reported while streaming
    pub fn battery_percentage(&self) -> Option<u8> {
        self.status.read().battery_percentage
    }

    pub fn pairing_pin(&self) -> String {
        self.status.read().pairing_pin.clone()
    }

    /// Check if the driver task is still running
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Start a live stream
    ///
    /// Any session in progress is torn down first.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - A parameter cannot be encoded (empty or too long strings, bitrate out of range)
    /// - The driver has stopped
    pub fn start_stream(&self, params: StreamParams) -> Result<()> {
        params.validate()?;
        info!(peripheral = %self.peripheral_id, "Start stream requested");
        self.send(Command::Start(params))
    }

    /// Stop the live stream; a no-op while idle
    pub fn stop_stream(&self) -> Result<()> {
        info!(peripheral = %self.peripheral_id, "Stop stream requested");
        self.send(Command::Stop)
    }

    /// Set the PIN used for the next pairing
    pub async fn set_pairing_pin(&self, pin: impl Into<String>) -> Result<()> {
        let pin = pin.into();
        validate_pairing_pin(&pin)?;

        let (tx, rx) = oneshot::channel();
        self.send(Command::SetPairingPin(pin, tx))?;
        rx.await.map_err(|_| Error::DriverStopped)?
    }

    /// Tear down any session and stop the driver
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::DriverStopped)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status.read();
        f.debug_struct("Device")
            .field("peripheral_id", &self.peripheral_id)
            .field("model", &status.model)
            .field("state", &status.state)
            .field("battery_percentage", &status.battery_percentage)
            .finish()
    }
}

/// Builder for [`Device`]
pub struct DeviceBuilder {
    peripheral_id: String,
    model: DeviceModel,
    config: SessionConfig,
    on_state_change: Option<StateCallback>,
}

impl DeviceBuilder {
    /// Set pairing PIN (default: "love")
    pub fn with_pairing_pin(mut self, pin: impl Into<String>) -> Self {
        self.config.pairing_pin = pin.into();
        self
    }

    /// Force the payload variant instead of deriving it from the model
    pub fn with_variant(mut self, variant: DeviceVariant) -> Self {
        self.config.variant = Some(variant);
        self
    }

    /// Set the time allowed to reach `Streaming` (default: 60 s)
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.config.start_timeout = timeout;
        self
    }

    /// Set the time allowed to acknowledge a stop (default: 10 s)
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    /// Register a state change callback
    ///
    /// Runs on the driver task, so it should return quickly.
    pub fn on_state_change(mut self, callback: impl Fn(SessionState) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(Arc::new(callback));
        self
    }

    /// Start the driver task on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns error if the pairing PIN does not fit in a pair request.
    pub fn spawn(self, transport: impl Transport + 'static) -> Result<Device> {
        validate_pairing_pin(&self.config.pairing_pin)?;

        let status = Arc::new(RwLock::new(Status {
            state: SessionState::Idle,
            model: self.model,
            battery_percentage: None,
            pairing_pin: self.config.pairing_pin.clone(),
        }));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            session: Session::with_config(self.peripheral_id.clone(), self.model, self.config),
            transport: Box::new(transport),
            watchdogs: Watchdogs::new(expiry_tx),
            commands: command_rx,
            expiries: expiry_rx,
            events: None,
            write_ready: false,
            status: status.clone(),
            on_state_change: self.on_state_change,
        };

        debug!(peripheral = %self.peripheral_id, model = %self.model, "Spawning device driver");
        tokio::spawn(driver.run());

        Ok(Device {
            peripheral_id: self.peripheral_id,
            commands: command_tx,
            status,
        })
    }
}

struct Driver {
    session: Session,
    transport: Box<dyn Transport>,
    watchdogs: Watchdogs,
    commands: mpsc::UnboundedReceiver<Command>,
    expiries: mpsc::UnboundedReceiver<Expiry>,
    /// Transport events for the current session only
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    /// Write characteristic found on the connected peripheral
    write_ready: bool,
    status: Arc<RwLock<Status>>,
    on_state_change: Option<StateCallback>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Start(params)) => {
                        self.apply(Event::StartRequested(params)).await;
                    }
                    Some(Command::Stop) => self.apply(Event::StopRequested).await,
                    Some(Command::SetPairingPin(pin, reply)) => {
                        let result = self.session.set_pairing_pin(pin).map_err(Error::from);
                        if result.is_ok() {
                            self.status.write().pairing_pin = self.session.pairing_pin().to_string();
                        }
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown(ack)) => {
                        self.teardown().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        debug!("All device handles dropped");
                        self.teardown().await;
                        break;
                    }
                },
                Some(expiry) = self.expiries.recv() => {
                    if self.watchdogs.expire(expiry) {
                        self.apply(Event::WatchdogExpired(expiry.watchdog)).await;
                    }
                }
                event = next_event(&mut self.events) => match event {
                    Some(event) => self.on_transport_event(event).await,
                    None => self.events = None,
                },
            }
        }

        debug!(peripheral = %self.session.peripheral_id(), "Device driver stopped");
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Discovered {
                id,
                manufacturer_data,
            } => {
                self.apply(Event::DeviceDiscovered {
                    id,
                    manufacturer_data,
                })
                .await;
            }
            TransportEvent::Notification {
                characteristic,
                data,
            } => {
                trace!(
                    characteristic = format!("0x{:04X}", characteristic),
                    len = data.len(),
                    "Notification received"
                );
                self.apply(Event::Notification {
                    characteristic,
                    data,
                })
                .await;
            }
            TransportEvent::Disconnected => {
                warn!(state = %self.session.state(), "Camera disconnected");
                self.write_ready = false;
            }
        }
    }

    async fn apply(&mut self, event: Event) {
        for effect in self.session.handle(event) {
            self.execute(effect).await;
        }

        let mut status = self.status.write();
        status.battery_percentage = self.session.battery_percentage();
        status.model = self.session.model();
    }

    async fn teardown(&mut self) {
        for effect in self.session.teardown() {
            self.execute(effect).await;
        }
        self.watchdogs.cancel_all();
        self.status.write().battery_percentage = None;
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StateChanged(state) => {
                self.status.write().state = state;
                if let Some(callback) = &self.on_state_change {
                    callback(state);
                }
            }
            Effect::StartDiscovery => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.events = Some(rx);
                if let Err(e) = self.transport.start_discovery(tx).await {
                    error!(error = %e, "Failed to start discovery");
                }
            }
            Effect::StopDiscovery => {
                if let Err(e) = self.transport.stop_discovery().await {
                    warn!(error = %e, "Failed to stop discovery");
                }
            }
            Effect::Connect { peripheral_id } => {
                if let Err(e) = self.connect(&peripheral_id).await {
                    error!(
                        peripheral = %peripheral_id,
                        error = %e,
                        recoverable = e.is_recoverable(),
                        "Failed to connect"
                    );
                }
            }
            Effect::Write { request, frame } => {
                if !self.write_ready || !self.transport.is_connected() {
                    warn!(request = %request, "Not connected, dropping request");
                    return;
                }
                trace!(request = %request, len = frame.len(), "Writing request");
                if let Err(e) = self
                    .transport
                    .write(gatt::WRITE_CHARACTERISTIC, &frame)
                    .await
                {
                    error!(request = %request, error = %e, "Write failed");
                }
            }
            Effect::ArmWatchdog { watchdog, after } => self.watchdogs.arm(watchdog, after),
            Effect::CancelWatchdog(watchdog) => self.watchdogs.cancel(watchdog),
            Effect::ReleaseTransport => {
                // Stale notifications must never reach the next session
                self.events = None;
                self.write_ready = false;
                if let Err(e) = self.transport.stop_discovery().await {
                    debug!(error = %e, "Failed to stop discovery");
                }
                if let Err(e) = self.transport.disconnect().await {
                    warn!(error = %e, "Failed to disconnect");
                }
            }
        }
    }

    /// Connect, enumerate the GATT table and subscribe to notifications
    async fn connect(&mut self, peripheral_id: &str) -> djilive_transport::Result<()> {
        self.transport.connect(peripheral_id).await?;
        info!(peripheral = %peripheral_id, "Connected");

        let mut notify_found = false;
        for service in self.transport.discover_services().await? {
            debug!(service = format!("0x{:04X}", service), "Discovered service");

            let characteristics = match self.transport.discover_characteristics(service).await {
                Ok(characteristics) => characteristics,
                Err(e) => {
                    warn!(service = format!("0x{:04X}", service), error = %e, "Characteristic discovery failed");
                    continue;
                }
            };

            for characteristic in characteristics {
                debug!(characteristic = format!("0x{:04X}", characteristic), "Discovered characteristic");
                if characteristic == gatt::WRITE_CHARACTERISTIC {
                    self.write_ready = true;
                }
                if characteristic == gatt::NOTIFY_CHARACTERISTIC {
                    self.transport.subscribe(characteristic).await?;
                    notify_found = true;
                }
            }
        }

        if !notify_found {
            return Err(djilive_transport::Error::CharacteristicNotFound(
                gatt::NOTIFY_CHARACTERISTIC,
            ));
        }
        if !self.write_ready {
            warn!("Write characteristic not found, requests will be dropped");
        }
        Ok(())
    }
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
