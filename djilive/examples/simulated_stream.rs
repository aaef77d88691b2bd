//! Full live stream session against a simulated camera
//!
//! Run with `RUST_LOG=debug` to see the protocol exchange.

use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use djilive::{Device, DeviceModel, LoopbackPeer, LoopbackTransport, SessionState, StreamParams};
use djilive_core::{
    constants::{gatt, payloads, telemetry},
    Frame, Request,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const PERIPHERAL: &str = "osmo-action-4";

/// Answer every request like a camera that is already paired
async fn camera(mut peer: LoopbackPeer) -> anyhow::Result<()> {
    while let Some((_, data)) = peer.next_write().await {
        let frame = Frame::decode(&data).context("camera received a malformed frame")?;
        let Some(request) = Request::ALL.into_iter().find(|r| r.is_answered_by(&frame)) else {
            continue;
        };

        let payload: &[u8] = match request {
            Request::Pair => &payloads::ALREADY_PAIRED,
            _ => &[0x00],
        };
        let response = request.frame(Bytes::copy_from_slice(payload)).encode()?;
        peer.notify(gatt::NOTIFY_CHARACTERISTIC, response.freeze());

        if request == Request::StartStreaming {
            let mut status = vec![0u8; 24];
            status[telemetry::BATTERY_OFFSET] = 81;
            let status = Frame::new(0x0000, 0x0000, telemetry::BATTERY_TYPE, status).encode()?;
            peer.notify(gatt::NOTIFY_CHARACTERISTIC, status.freeze());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (transport, peer) = LoopbackTransport::pair();
    let (state_tx, mut states) = mpsc::unbounded_channel();

    let device = Device::builder(PERIPHERAL, DeviceModel::OsmoAction4)
        .on_state_change(move |state| {
            let _ = state_tx.send(state);
        })
        .spawn(transport)?;

    let params = StreamParams::new("Home", "secret123", "rtmp://example.com/live");
    println!("Starting stream with {:?}", params);
    device.start_stream(params)?;

    let mut peer = Some(peer);
    while let Some(state) = states.recv().await {
        println!("State: {}", state);
        match state {
            SessionState::Discovering => {
                if let Some(peer) = &peer {
                    peer.advertise(PERIPHERAL, Some(Bytes::from_static(&[0xAA, 0x08, 0x14, 0x00])));
                }
            }
            SessionState::Connecting => {
                if let Some(peer) = peer.take() {
                    peer.notify(gatt::NOTIFY_CHARACTERISTIC, vec![0x00]);
                    tokio::spawn(camera(peer));
                }
            }
            SessionState::Streaming => {
                tokio::time::sleep(Duration::from_millis(100)).await;
                println!("Battery: {:?}%", device.battery_percentage());
                device.stop_stream()?;
            }
            SessionState::Idle => break,
            _ => {}
        }
    }

    device.shutdown().await;
    println!("Done!");
    Ok(())
}
