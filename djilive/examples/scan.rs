//! Scanning example

use std::time::Duration;

use bytes::Bytes;
use djilive::{LoopbackTransport, Scanner};
use tokio::time::timeout;

#[tokio::main]
async fn main() -> djilive::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let (transport, peer) = LoopbackTransport::pair();
    let mut scanner = Scanner::new(transport);
    scanner.start().await?;

    // Simulated advertisements; a real radio reports these on its own
    peer.advertise("pocket-3", Some(Bytes::from_static(&[0xAA, 0x08, 0x20, 0x00])));
    peer.advertise("headphones", Some(Bytes::from_static(&[0x4C, 0x00, 0x07, 0x19])));
    peer.advertise("action-3", Some(Bytes::from_static(&[0xAA, 0x08, 0x12, 0x00])));

    while let Ok(Some(device)) = timeout(Duration::from_millis(500), scanner.next_device()).await {
        println!("Found {} (advertised {} bytes)", device, device.manufacturer_data.len());
    }

    scanner.stop().await?;
    println!("{} device(s) found", scanner.discovered().len());
    Ok(())
}
