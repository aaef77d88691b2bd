//! Live stream session state machine
//!
//! A session drives one camera from discovery to a live stream and back.
//! It performs no I/O itself: [`Session::handle`] takes one [`Event`],
//! updates the session, and returns the [`Effect`]s the caller must carry
//! out (write a frame, connect, arm a watchdog, ...). Events are handled one
//! at a time and each handler runs to completion.
//!
//! ```text
//! Idle → Discovering → Connecting → CheckingPaired → [Pairing] → CleaningUp
//!      → PreparingStream → SettingUpWifi → [Configuring] → StartingStream
//!      → Streaming → StoppingStream → Idle
//! ```
//!
//! At most one request is outstanding at any time. A response is accepted
//! only if it carries the transaction id of that request.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use djilive_types::{DeviceModel, DeviceVariant, StreamParams};

use crate::{
    command::Request,
    constants::{self, gatt, payloads, telemetry},
    error::{Error, Result},
    frame::Frame,
    model, payload,
};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Nothing in progress
    #[default]
    Idle,

    /// Scanning for the camera
    Discovering,

    /// Connecting and waiting for the camera to report ready
    Connecting,

    /// Pair request sent
    CheckingPaired,

    /// Waiting for the user to confirm pairing on the camera
    Pairing,

    /// Stopping any stream left over from a previous session
    CleaningUp,

    PreparingStream,

    SettingUpWifi,

    /// Sending image stabilization settings (some models only)
    Configuring,

    StartingStream,

    /// Stream is live
    Streaming,

    StoppingStream,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::CheckingPaired => "checkingPaired",
            Self::Pairing => "pairing",
            Self::CleaningUp => "cleaningUp",
            Self::PreparingStream => "preparingStream",
            Self::SettingUpWifi => "settingUpWifi",
            Self::Configuring => "configuring",
            Self::StartingStream => "startingStream",
            Self::Streaming => "streaming",
            Self::StoppingStream => "stoppingStream",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Session timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Watchdog {
    /// Bounds the time from start request to live stream
    Start,

    /// Bounds the time the camera takes to acknowledge a stop
    Stop,
}

impl Watchdog {
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start-watchdog",
            Self::Stop => "stop-watchdog",
        }
    }
}

impl fmt::Display for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked to start streaming
    StartRequested(StreamParams),

    /// Caller asked to stop streaming
    StopRequested,

    /// Transport found a peripheral while scanning
    DeviceDiscovered {
        id: String,
        manufacturer_data: Option<Bytes>,
    },

    /// Bytes notified on a subscribed characteristic
    Notification { characteristic: u16, data: Bytes },

    /// A watchdog ran out
    WatchdogExpired(Watchdog),
}

/// Work the session asks its driver to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StateChanged(SessionState),
    StartDiscovery,
    StopDiscovery,
    Connect { peripheral_id: String },
    /// Write an encoded frame to the request characteristic
    Write { request: Request, frame: Bytes },
    /// Arm a watchdog, superseding any pending instance of it
    ArmWatchdog { watchdog: Watchdog, after: Duration },
    CancelWatchdog(Watchdog),
    /// Stop discovery, drop subscriptions and disconnect
    ReleaseTransport,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub pairing_pin: String,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    /// Overrides the variant derived from the device model
    pub variant: Option<DeviceVariant>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pairing_pin: constants::DEFAULT_PAIRING_PIN.to_string(),
            start_timeout: constants::START_TIMEOUT,
            stop_timeout: constants::STOP_TIMEOUT,
            variant: None,
        }
    }
}

/// Check that a PIN fits in a pair request frame
pub fn validate_pairing_pin(pin: &str) -> Result<()> {
    let encoded = payload::pair(pin)?;
    if encoded.len() > Frame::MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            size: encoded.len(),
            max: Frame::MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

/// One camera interaction
#[derive(Debug, Clone)]
pub struct Session {
    peripheral_id: String,
    model: DeviceModel,
    config: SessionConfig,
    params: Option<StreamParams>,
    state: SessionState,
    pending: Option<Request>,
    battery_percentage: Option<u8>,
}

impl Session {
    /// Create an idle session for the given peripheral
    pub fn new(peripheral_id: impl Into<String>, model: DeviceModel) -> Self {
        Self::with_config(peripheral_id, model, SessionConfig::default())
    }

    pub fn with_config(
        peripheral_id: impl Into<String>,
        model: DeviceModel,
        config: SessionConfig,
    ) -> Self {
        Self {
            peripheral_id: peripheral_id.into(),
            model,
            config,
            params: None,
            state: SessionState::Idle,
            pending: None,
            battery_percentage: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peripheral_id(&self) -> &str {
        &self.peripheral_id
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    /// Payload encoding convention in use
    pub fn variant(&self) -> DeviceVariant {
        self.config.variant.unwrap_or_else(|| self.model.variant())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Parameters captured by the last start request
    pub fn params(&self) -> Option<&StreamParams> {
        self.params.as_ref()
    }

    /// Request awaiting a response
    pub fn pending(&self) -> Option<Request> {
        self.pending
    }

    /// Last battery level reported while streaming
    pub fn battery_percentage(&self) -> Option<u8> {
        self.battery_percentage
    }

    pub fn pairing_pin(&self) -> &str {
        &self.config.pairing_pin
    }

    /// Set the PIN sent with the next pair request
    ///
    /// # Errors
    ///
    /// Returns an error if the PIN does not fit in a pair frame.
    pub fn set_pairing_pin(&mut self, pin: impl Into<String>) -> Result<()> {
        let pin = pin.into();
        validate_pairing_pin(&pin)?;
        self.config.pairing_pin = pin;
        Ok(())
    }

    /// Abandon whatever is in progress and return to `Idle`
    pub fn teardown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.state != SessionState::Idle {
            info!(state = %self.state, "Tearing down session");
        }
        self.reset(&mut effects);
        effects
    }

    /// Feed one event through the state machine
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            Event::StartRequested(params) => self.on_start_requested(params, &mut effects),
            Event::StopRequested => self.on_stop_requested(&mut effects),
            Event::DeviceDiscovered {
                id,
                manufacturer_data,
            } => self.on_device_discovered(id, manufacturer_data, &mut effects),
            Event::Notification {
                characteristic,
                data,
            } => self.on_notification(characteristic, &data, &mut effects),
            Event::WatchdogExpired(watchdog) => {
                warn!(
                    watchdog = %watchdog,
                    state = %self.state,
                    "Watchdog expired, abandoning session"
                );
                self.reset(&mut effects);
            }
        }

        effects
    }

    fn on_start_requested(&mut self, params: StreamParams, effects: &mut Vec<Effect>) {
        info!(
            model = %self.model,
            resolution = %params.resolution,
            fps = params.fps,
            bitrate = params.bitrate,
            stabilization = %params.stabilization,
            "Starting live stream"
        );

        self.reset(effects);
        self.params = Some(params);
        self.arm(Watchdog::Start, effects);
        effects.push(Effect::StartDiscovery);
        self.set_state(SessionState::Discovering, effects);
    }

    fn on_stop_requested(&mut self, effects: &mut Vec<Effect>) {
        if self.state == SessionState::Idle {
            debug!("Stop requested while idle, ignoring");
            return;
        }

        info!(state = %self.state, "Stopping live stream");

        if self.state == SessionState::Discovering {
            effects.push(Effect::StopDiscovery);
        }
        effects.push(Effect::CancelWatchdog(Watchdog::Start));
        self.arm(Watchdog::Stop, effects);
        self.send(Request::StopStreaming, Ok(payload::stop_streaming()), effects);
        self.set_state(SessionState::StoppingStream, effects);
    }

    fn on_device_discovered(
        &mut self,
        id: String,
        manufacturer_data: Option<Bytes>,
        effects: &mut Vec<Effect>,
    ) {
        if self.state != SessionState::Discovering {
            trace!(peripheral = %id, state = %self.state, "Ignoring discovery outside of scan");
            return;
        }
        if id != self.peripheral_id {
            trace!(peripheral = %id, "Ignoring other peripheral");
            return;
        }
        let Some(manufacturer_data) = manufacturer_data else {
            debug!(peripheral = %id, "Target found without manufacturer data, waiting");
            return;
        };

        if self.model == DeviceModel::Unknown {
            if let Some(model) = model::model_from_manufacturer_data(&manufacturer_data) {
                if model.is_known() {
                    info!(model = %model, "Identified camera model from advertising data");
                    self.model = model;
                }
            }
        }

        effects.push(Effect::StopDiscovery);
        effects.push(Effect::Connect { peripheral_id: id });
        // Re-armed to cover the connect and any reconnect attempts
        self.arm(Watchdog::Start, effects);
        self.set_state(SessionState::Connecting, effects);
    }

    fn on_notification(&mut self, characteristic: u16, data: &[u8], effects: &mut Vec<Effect>) {
        if self.state == SessionState::Connecting
            && characteristic == gatt::NOTIFY_CHARACTERISTIC
        {
            info!("Camera ready, attempting to pair");
            let pair = payload::pair(&self.config.pairing_pin);
            if self.send(Request::Pair, pair, effects) {
                self.set_state(SessionState::CheckingPaired, effects);
            }
            return;
        }

        if data.is_empty() {
            debug!(characteristic = format!("0x{:04X}", characteristic), "Received empty message");
            return;
        }

        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, data = %hex::encode(data), "Dropping malformed frame");
                return;
            }
        };

        debug!(frame = %frame, state = %self.state, "Received frame");

        match self.state {
            SessionState::CheckingPaired => self.process_checking_paired(&frame, effects),
            SessionState::Pairing => self.process_pairing(effects),
            SessionState::CleaningUp => self.process_cleaning_up(&frame, effects),
            SessionState::PreparingStream => self.process_preparing_stream(&frame, effects),
            SessionState::SettingUpWifi => self.process_setting_up_wifi(&frame, effects),
            SessionState::Configuring => self.process_configuring(&frame, effects),
            SessionState::StartingStream => self.process_starting_stream(&frame, effects),
            SessionState::Streaming => self.process_streaming(&frame),
            SessionState::StoppingStream => self.process_stopping_stream(&frame, effects),
            SessionState::Idle | SessionState::Discovering | SessionState::Connecting => {
                debug!(state = %self.state, "Received message in unexpected state");
            }
        }
    }

    fn process_checking_paired(&mut self, frame: &Frame, effects: &mut Vec<Effect>) {
        if !self.answers_pending(frame) {
            return;
        }
        if frame.payload.as_ref() == payloads::ALREADY_PAIRED {
            info!("Camera already paired");
            self.process_pairing(effects);
        } else {
            info!("Confirm pairing on the camera");
            self.set_state(SessionState::Pairing, effects);
        }
    }

    fn process_pairing(&mut self, effects: &mut Vec<Effect>) {
        if self.send(Request::StopStreaming, Ok(payload::stop_streaming()), effects) {
            self.set_state(SessionState::CleaningUp, effects);
        }
    }

    fn process_cleaning_up(&mut self, frame: &Frame, effects: &mut Vec<Effect>) {
        if !self.answers_pending(frame) {
            return;
        }
        if self.send(Request::PrepareToStream, Ok(payload::prepare_to_stream()), effects) {
            self.set_state(SessionState::PreparingStream, effects);
        }
    }

    fn process_preparing_stream(&mut self, frame: &Frame, effects: &mut Vec<Effect>) {
        if !self.answers_pending(frame) {
            return;
        }
        let wifi = match &self.params {
            Some(p) if !p.wifi_ssid.is_empty() && !p.wifi_password.is_empty() => {
                payload::setup_wifi(&p.wifi_ssid, &p.wifi_password)
            }
            _ => {
                warn!("No Wi-Fi credentials, cannot continue setup");
                return;
            }
        };
        if self.send(Request::SetupWifi, wifi, effects) {
            self.set_state(SessionState::SettingUpWifi, effects);
        }
    }

    fn process_setting_up_wifi(&mut self, frame: &Frame, effects: &mut Vec<Effect>) {
        if !self.answers_pending(frame) {
            return;
        }
        if self.model.requires_configuration() {
            let Some(stabilization) = self.params.as_ref().map(|p| p.stabilization) else {
                warn!("No stream parameters, cannot configure");
                return;
            };
            let configure = payload::configure(stabilization, self.variant());
            if self.send(Request::Configure, Ok(configure), effects) {
                self.set_state(SessionState::Configuring, effects);
            }
        } else {
            self.send_start_streaming(effects);
        }
    }

    fn process_configuring(&mut self, frame: &Frame, effects: &mut Vec<Effect>) {
        if !self.answers_pending(frame) {
            return;
        }
        self.send_start_streaming(effects);
    }

    fn send_start_streaming(&mut self, effects: &mut Vec<Effect>) {
        let variant = self.variant();
        let start = match &self.params {
            Some(p) if !p.url.is_empty() => payload::start_streaming(
                &p.url,
                p.resolution,
                p.fps,
                p.bitrate_kbps(),
                variant,
            ),
            _ => {
                warn!("No stream URL, cannot start streaming");
                return;
            }
        };
        if self.send(Request::StartStreaming, start, effects) {
            self.set_state(SessionState::StartingStream, effects);
        }
    }

    fn process_starting_stream(&mut self, frame: &Frame, effects: &mut Vec<Effect>) {
        if !self.answers_pending(frame) {
            return;
        }
        self.pending = None;
        effects.push(Effect::CancelWatchdog(Watchdog::Start));
        self.set_state(SessionState::Streaming, effects);
    }

    fn process_streaming(&mut self, frame: &Frame) {
        if frame.command_type != telemetry::BATTERY_TYPE {
            return;
        }
        if let Some(&percentage) = frame.payload.get(telemetry::BATTERY_OFFSET) {
            if self.battery_percentage != Some(percentage) {
                debug!(battery = percentage, "Battery level updated");
            }
            self.battery_percentage = Some(percentage);
        }
    }

    fn process_stopping_stream(&mut self, frame: &Frame, effects: &mut Vec<Effect>) {
        if !self.answers_pending(frame) {
            return;
        }
        info!("Live stream stopped");
        self.reset(effects);
    }

    fn answers_pending(&self, frame: &Frame) -> bool {
        match self.pending {
            Some(request) if request.is_answered_by(frame) => true,
            pending => {
                debug!(
                    transaction_id = format!("0x{:04X}", frame.transaction_id),
                    pending = ?pending,
                    "Dropping response for another transaction"
                );
                false
            }
        }
    }

    /// Encode and queue a request. Returns false if it could not be encoded.
    fn send(&mut self, request: Request, payload: Result<Bytes>, effects: &mut Vec<Effect>) -> bool {
        let encoded = payload.and_then(|payload| request.frame(payload).encode());
        match encoded {
            Ok(frame) => {
                debug!(request = %request, len = frame.len(), "Sending request");
                self.pending = Some(request);
                effects.push(Effect::Write {
                    request,
                    frame: frame.freeze(),
                });
                true
            }
            Err(e) => {
                warn!(request = %request, error = %e, "Failed to encode request");
                false
            }
        }
    }

    fn arm(&self, watchdog: Watchdog, effects: &mut Vec<Effect>) {
        let after = match watchdog {
            Watchdog::Start => self.config.start_timeout,
            Watchdog::Stop => self.config.stop_timeout,
        };
        effects.push(Effect::ArmWatchdog { watchdog, after });
    }

    fn reset(&mut self, effects: &mut Vec<Effect>) {
        effects.push(Effect::CancelWatchdog(Watchdog::Start));
        effects.push(Effect::CancelWatchdog(Watchdog::Stop));
        effects.push(Effect::ReleaseTransport);
        self.pending = None;
        self.battery_percentage = None;
        self.set_state(SessionState::Idle, effects);
    }

    fn set_state(&mut self, state: SessionState, effects: &mut Vec<Effect>) {
        if self.state == state {
            return;
        }
        info!(from = %self.state, to = %state, "State change");
        self.state = state;
        effects.push(Effect::StateChanged(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djilive_types::{ImageStabilization, Resolution};
    use pretty_assertions::assert_eq;

    const PERIPHERAL: &str = "osmo-1";
    const ADVERTISING: [u8; 4] = [0xAA, 0x08, 0x14, 0x00];

    fn params() -> StreamParams {
        StreamParams::new("Home", "secret123", "rtmp://example.com/live")
            .with_resolution(Resolution::R1080p)
            .with_fps(30)
            .with_bitrate(6_000_000)
            .with_stabilization(ImageStabilization::RockSteadyPlus)
    }

    fn response(request: Request, payload: &[u8]) -> Bytes {
        request
            .frame(Bytes::copy_from_slice(payload))
            .encode()
            .unwrap()
            .freeze()
    }

    fn notify(session: &mut Session, data: Bytes) -> Vec<Effect> {
        session.handle(Event::Notification {
            characteristic: gatt::NOTIFY_CHARACTERISTIC,
            data,
        })
    }

    fn respond(session: &mut Session, request: Request) -> Vec<Effect> {
        notify(session, response(request, &[0x00]))
    }

    fn states(effects: &[Effect]) -> Vec<SessionState> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn written(effects: &[Effect]) -> Vec<Request> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Write { request, .. } => Some(*request),
                _ => None,
            })
            .collect()
    }

    fn discovered(session: &mut Session) -> Vec<Effect> {
        session.handle(Event::DeviceDiscovered {
            id: PERIPHERAL.to_string(),
            manufacturer_data: Some(Bytes::from_static(&ADVERTISING)),
        })
    }

    /// Drive a fresh session up to `CheckingPaired`
    fn connected(model: DeviceModel) -> Session {
        let mut session = Session::new(PERIPHERAL, model);
        session.handle(Event::StartRequested(params()));
        discovered(&mut session);
        notify(&mut session, Bytes::new());
        assert_eq!(session.state(), SessionState::CheckingPaired);
        session
    }

    /// Drive a fresh session up to `Streaming`
    fn streaming(model: DeviceModel) -> Session {
        let mut session = connected(model);
        notify(&mut session, response(Request::Pair, &payloads::ALREADY_PAIRED));
        respond(&mut session, Request::StopStreaming);
        respond(&mut session, Request::PrepareToStream);
        respond(&mut session, Request::SetupWifi);
        if model.requires_configuration() {
            respond(&mut session, Request::Configure);
        }
        respond(&mut session, Request::StartStreaming);
        assert_eq!(session.state(), SessionState::Streaming);
        session
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.pairing_pin(), "love");
        assert_eq!(session.battery_percentage(), None);
        assert_eq!(session.pending(), None);
        assert_eq!(session.variant(), DeviceVariant::Standard);
    }

    #[test]
    fn test_start_from_idle() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        let effects = session.handle(Event::StartRequested(params()));

        assert_eq!(
            effects,
            vec![
                Effect::CancelWatchdog(Watchdog::Start),
                Effect::CancelWatchdog(Watchdog::Stop),
                Effect::ReleaseTransport,
                Effect::ArmWatchdog {
                    watchdog: Watchdog::Start,
                    after: Duration::from_secs(60),
                },
                Effect::StartDiscovery,
                Effect::StateChanged(SessionState::Discovering),
            ]
        );
        assert_eq!(session.params(), Some(&params()));
    }

    #[test]
    fn test_full_sequence_with_configuration() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        let mut observed = Vec::new();
        let mut requests = Vec::new();

        let mut record = |effects: Vec<Effect>| {
            observed.extend(states(&effects));
            requests.extend(written(&effects));
        };

        record(session.handle(Event::StartRequested(params())));
        record(discovered(&mut session));
        record(notify(&mut session, Bytes::from_static(&[0x01])));
        // Not yet paired: the camera asks the user to confirm
        record(notify(&mut session, response(Request::Pair, &[0x00, 0x00])));
        record(notify(&mut session, response(Request::Pair, &[0x01])));
        record(respond(&mut session, Request::StopStreaming));
        record(respond(&mut session, Request::PrepareToStream));
        record(respond(&mut session, Request::SetupWifi));
        record(respond(&mut session, Request::Configure));
        record(respond(&mut session, Request::StartStreaming));

        assert_eq!(
            observed,
            vec![
                SessionState::Discovering,
                SessionState::Connecting,
                SessionState::CheckingPaired,
                SessionState::Pairing,
                SessionState::CleaningUp,
                SessionState::PreparingStream,
                SessionState::SettingUpWifi,
                SessionState::Configuring,
                SessionState::StartingStream,
                SessionState::Streaming,
            ]
        );
        assert_eq!(
            requests,
            vec![
                Request::Pair,
                Request::StopStreaming,
                Request::PrepareToStream,
                Request::SetupWifi,
                Request::Configure,
                Request::StartStreaming,
            ]
        );
        assert_eq!(session.state(), SessionState::Streaming);

        let effects = session.handle(Event::StopRequested);
        assert_eq!(states(&effects), vec![SessionState::StoppingStream]);
        let effects = respond(&mut session, Request::StopStreaming);
        assert_eq!(states(&effects), vec![SessionState::Idle]);
    }

    #[test]
    fn test_written_frames_match_payload_encoders() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        session.handle(Event::StartRequested(params()));
        discovered(&mut session);
        notify(&mut session, Bytes::new());
        notify(&mut session, response(Request::Pair, &payloads::ALREADY_PAIRED));
        respond(&mut session, Request::StopStreaming);
        respond(&mut session, Request::PrepareToStream);
        respond(&mut session, Request::SetupWifi);
        let effects = respond(&mut session, Request::Configure);

        let Some(Effect::Write { frame, .. }) = effects.first() else {
            panic!("expected a write, got {:?}", effects);
        };
        let frame = Frame::decode(frame).unwrap();
        let expected = payload::start_streaming(
            "rtmp://example.com/live",
            Resolution::R1080p,
            30,
            6000,
            DeviceVariant::Standard,
        )
        .unwrap();

        assert_eq!(frame.transaction_id, 0x8C2C);
        assert_eq!(frame.payload, expected);
    }

    #[test]
    fn test_models_without_configuration_skip_it() {
        for model in [
            DeviceModel::OsmoAction3,
            DeviceModel::OsmoPocket3,
            DeviceModel::Unknown,
        ] {
            let mut session = Session::new(PERIPHERAL, model);
            session.handle(Event::StartRequested(params()));
            session.handle(Event::DeviceDiscovered {
                id: PERIPHERAL.to_string(),
                manufacturer_data: Some(Bytes::from_static(&[0xAA, 0x08, 0x99, 0x00])),
            });
            notify(&mut session, Bytes::new());
            notify(&mut session, response(Request::Pair, &payloads::ALREADY_PAIRED));
            respond(&mut session, Request::StopStreaming);
            respond(&mut session, Request::PrepareToStream);
            let effects = respond(&mut session, Request::SetupWifi);

            assert_eq!(written(&effects), vec![Request::StartStreaming]);
            assert_eq!(states(&effects), vec![SessionState::StartingStream]);
        }
    }

    #[test]
    fn test_already_paired_skips_pairing() {
        let mut session = connected(DeviceModel::OsmoAction4);
        let effects = notify(&mut session, response(Request::Pair, &[0x00, 0x01]));

        assert_eq!(written(&effects), vec![Request::StopStreaming]);
        assert_eq!(states(&effects), vec![SessionState::CleaningUp]);
    }

    #[test]
    fn test_pairing_advances_on_any_message() {
        let mut session = connected(DeviceModel::OsmoAction4);
        notify(&mut session, response(Request::Pair, &[0x00]));
        assert_eq!(session.state(), SessionState::Pairing);

        // Any well-formed frame confirms pairing, whatever its transaction
        let unrelated = Frame::new(0x0000, 0x1234, 0x00_0001, vec![0xFF])
            .encode()
            .unwrap()
            .freeze();
        let effects = notify(&mut session, unrelated);

        assert_eq!(written(&effects), vec![Request::StopStreaming]);
        assert_eq!(session.state(), SessionState::CleaningUp);
    }

    #[test]
    fn test_mismatched_transaction_is_ignored() {
        let mut session = connected(DeviceModel::OsmoAction4);
        notify(&mut session, response(Request::Pair, &payloads::ALREADY_PAIRED));
        assert_eq!(session.state(), SessionState::CleaningUp);
        assert_eq!(session.pending(), Some(Request::StopStreaming));

        let effects = respond(&mut session, Request::SetupWifi);
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::CleaningUp);

        // A late duplicate of the pair response is dropped too
        let effects = notify(&mut session, response(Request::Pair, &payloads::ALREADY_PAIRED));
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::CleaningUp);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let mut session = connected(DeviceModel::OsmoAction4);
        let mut corrupted = response(Request::Pair, &payloads::ALREADY_PAIRED).to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0x01;

        assert!(notify(&mut session, Bytes::from(corrupted)).is_empty());
        assert!(notify(&mut session, Bytes::from_static(&[0x00, 0x01, 0x02])).is_empty());
        assert!(notify(&mut session, Bytes::new()).is_empty());
        assert_eq!(session.state(), SessionState::CheckingPaired);
    }

    #[test]
    fn test_messages_while_idle_are_dropped() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        let effects = respond(&mut session, Request::StopStreaming);
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_ready_signal_requires_notify_characteristic() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        session.handle(Event::StartRequested(params()));
        discovered(&mut session);

        let effects = session.handle(Event::Notification {
            characteristic: gatt::WRITE_CHARACTERISTIC,
            data: Bytes::from_static(&[0x01]),
        });
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn test_discovery_filters_peripherals() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);

        // Not scanning yet
        assert!(discovered(&mut session).is_empty());

        session.handle(Event::StartRequested(params()));
        let effects = session.handle(Event::DeviceDiscovered {
            id: "someone-else".to_string(),
            manufacturer_data: Some(Bytes::from_static(&ADVERTISING)),
        });
        assert!(effects.is_empty());

        let effects = session.handle(Event::DeviceDiscovered {
            id: PERIPHERAL.to_string(),
            manufacturer_data: None,
        });
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::Discovering);

        let effects = discovered(&mut session);
        assert_eq!(
            effects,
            vec![
                Effect::StopDiscovery,
                Effect::Connect {
                    peripheral_id: PERIPHERAL.to_string(),
                },
                Effect::ArmWatchdog {
                    watchdog: Watchdog::Start,
                    after: Duration::from_secs(60),
                },
                Effect::StateChanged(SessionState::Connecting),
            ]
        );
    }

    #[test]
    fn test_unknown_model_is_identified_on_discovery() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::Unknown);
        session.handle(Event::StartRequested(params()));
        discovered(&mut session);
        assert_eq!(session.model(), DeviceModel::OsmoAction4);

        // A known model is never replaced
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoPocket3);
        session.handle(Event::StartRequested(params()));
        discovered(&mut session);
        assert_eq!(session.model(), DeviceModel::OsmoPocket3);
    }

    #[test]
    fn test_missing_wifi_credentials_stall_setup() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction3);
        session.handle(Event::StartRequested(StreamParams::new("", "", "rtmp://x")));
        discovered(&mut session);
        notify(&mut session, Bytes::new());
        notify(&mut session, response(Request::Pair, &payloads::ALREADY_PAIRED));
        respond(&mut session, Request::StopStreaming);

        let effects = respond(&mut session, Request::PrepareToStream);
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::PreparingStream);
    }

    #[test]
    fn test_battery_telemetry() {
        let mut session = streaming(DeviceModel::OsmoAction4);
        assert_eq!(session.battery_percentage(), None);

        let mut status = vec![0u8; 24];
        status[20] = 87;
        let frame = Frame::new(0x0000, 0x0001, telemetry::BATTERY_TYPE, status)
            .encode()
            .unwrap()
            .freeze();
        assert!(notify(&mut session, frame).is_empty());
        assert_eq!(session.battery_percentage(), Some(87));

        // Too short to carry the battery byte
        let short = Frame::new(0x0000, 0x0001, telemetry::BATTERY_TYPE, vec![0u8; 20])
            .encode()
            .unwrap()
            .freeze();
        notify(&mut session, short);
        assert_eq!(session.battery_percentage(), Some(87));

        // Other telemetry is ignored
        let mut other = vec![0u8; 24];
        other[20] = 5;
        let other = Frame::new(0x0000, 0x0001, 0x02_0E00, other)
            .encode()
            .unwrap()
            .freeze();
        notify(&mut session, other);
        assert_eq!(session.battery_percentage(), Some(87));
        assert_eq!(session.state(), SessionState::Streaming);
    }

    #[test]
    fn test_streaming_cancels_start_watchdog() {
        let mut session = connected(DeviceModel::OsmoPocket3);
        notify(&mut session, response(Request::Pair, &payloads::ALREADY_PAIRED));
        respond(&mut session, Request::StopStreaming);
        respond(&mut session, Request::PrepareToStream);
        respond(&mut session, Request::SetupWifi);
        let effects = respond(&mut session, Request::StartStreaming);

        assert_eq!(
            effects,
            vec![
                Effect::CancelWatchdog(Watchdog::Start),
                Effect::StateChanged(SessionState::Streaming),
            ]
        );
        assert_eq!(session.pending(), None);
    }

    #[test]
    fn test_stop_while_streaming() {
        let mut session = streaming(DeviceModel::OsmoAction4);
        let effects = session.handle(Event::StopRequested);

        assert_eq!(effects.len(), 4);
        assert_eq!(effects[0], Effect::CancelWatchdog(Watchdog::Start));
        assert_eq!(
            effects[1],
            Effect::ArmWatchdog {
                watchdog: Watchdog::Stop,
                after: Duration::from_secs(10),
            }
        );
        assert!(matches!(
            effects[2],
            Effect::Write {
                request: Request::StopStreaming,
                ..
            }
        ));
        assert_eq!(effects[3], Effect::StateChanged(SessionState::StoppingStream));

        let effects = respond(&mut session, Request::StopStreaming);
        assert!(effects.contains(&Effect::ReleaseTransport));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.battery_percentage(), None);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        assert!(session.handle(Event::StopRequested).is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_stop_while_discovering() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        session.handle(Event::StartRequested(params()));
        let effects = session.handle(Event::StopRequested);

        assert_eq!(effects[0], Effect::StopDiscovery);
        assert_eq!(written(&effects), vec![Request::StopStreaming]);
        assert_eq!(session.state(), SessionState::StoppingStream);

        // Only a scan in progress is stopped
        let mut session = connected(DeviceModel::OsmoAction4);
        let effects = session.handle(Event::StopRequested);
        assert!(!effects.contains(&Effect::StopDiscovery));
    }

    #[test]
    fn test_stop_mid_setup() {
        let mut session = connected(DeviceModel::OsmoAction4);
        let effects = session.handle(Event::StopRequested);
        assert_eq!(written(&effects), vec![Request::StopStreaming]);
        assert_eq!(session.state(), SessionState::StoppingStream);
    }

    #[test]
    fn test_start_watchdog_resets_from_any_state() {
        let setups: [fn(&mut Session); 5] = [
            |_| {},
            |s| {
                discovered(s);
            },
            |s| {
                discovered(s);
                notify(s, Bytes::new());
            },
            |s| {
                discovered(s);
                notify(s, Bytes::new());
                notify(s, response(Request::Pair, &[0x00]));
            },
            |s| {
                discovered(s);
                notify(s, Bytes::new());
                notify(s, response(Request::Pair, &payloads::ALREADY_PAIRED));
                respond(s, Request::StopStreaming);
                respond(s, Request::PrepareToStream);
            },
        ];

        for setup in setups {
            let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
            session.handle(Event::StartRequested(params()));
            setup(&mut session);
            assert_ne!(session.state(), SessionState::Idle);

            let effects = session.handle(Event::WatchdogExpired(Watchdog::Start));
            assert!(effects.contains(&Effect::ReleaseTransport));
            assert_eq!(states(&effects), vec![SessionState::Idle]);
            assert_eq!(session.state(), SessionState::Idle);
            assert_eq!(session.battery_percentage(), None);
            assert_eq!(session.pending(), None);
        }
    }

    #[test]
    fn test_watchdog_clears_battery() {
        let mut session = streaming(DeviceModel::OsmoPocket3);
        let mut status = vec![0u8; 21];
        status[20] = 42;
        notify(
            &mut session,
            Frame::new(0, 0, telemetry::BATTERY_TYPE, status)
                .encode()
                .unwrap()
                .freeze(),
        );
        assert_eq!(session.battery_percentage(), Some(42));

        session.handle(Event::StopRequested);
        session.handle(Event::WatchdogExpired(Watchdog::Stop));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.battery_percentage(), None);
    }

    #[test]
    fn test_restart_tears_down_previous_session() {
        let mut session = streaming(DeviceModel::OsmoAction4);
        let effects = session.handle(Event::StartRequested(params()));

        assert!(effects.contains(&Effect::ReleaseTransport));
        assert_eq!(
            states(&effects),
            vec![SessionState::Idle, SessionState::Discovering]
        );
    }

    #[test]
    fn test_custom_pin_and_variant() {
        let config = SessionConfig {
            pairing_pin: "1234".to_string(),
            variant: Some(DeviceVariant::Extended),
            ..SessionConfig::default()
        };
        let mut session = Session::with_config(PERIPHERAL, DeviceModel::OsmoAction4, config);
        assert_eq!(session.variant(), DeviceVariant::Extended);

        session.handle(Event::StartRequested(params()));
        discovered(&mut session);
        let effects = notify(&mut session, Bytes::new());

        let Some(Effect::Write { frame, .. }) = effects.first() else {
            panic!("expected a write, got {:?}", effects);
        };
        let frame = Frame::decode(frame).unwrap();
        assert_eq!(&frame.payload[33..], &[4, b'1', b'2', b'3', b'4']);
    }

    #[test]
    fn test_teardown() {
        let mut session = streaming(DeviceModel::OsmoAction4);
        let effects = session.teardown();
        assert_eq!(
            effects,
            vec![
                Effect::CancelWatchdog(Watchdog::Start),
                Effect::CancelWatchdog(Watchdog::Stop),
                Effect::ReleaseTransport,
                Effect::StateChanged(SessionState::Idle),
            ]
        );

        // Already idle: transport is still released, no state change
        let effects = session.teardown();
        assert_eq!(effects.len(), 3);
        assert!(states(&effects).is_empty());
    }

    #[test]
    fn test_set_pairing_pin_validates_length() {
        let mut session = Session::new(PERIPHERAL, DeviceModel::OsmoAction4);
        assert!(session.set_pairing_pin("0000").is_ok());
        assert_eq!(session.pairing_pin(), "0000");

        let max = Frame::MAX_PAYLOAD_SIZE - payloads::PAIR_TOKEN.len() - 1;
        assert!(session.set_pairing_pin("9".repeat(max)).is_ok());
        assert!(matches!(
            session.set_pairing_pin("9".repeat(max + 1)),
            Err(Error::PayloadTooLarge { .. })
        ));
        assert_eq!(session.pairing_pin().len(), max);
    }
}
