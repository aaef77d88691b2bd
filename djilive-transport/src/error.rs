//! Transport errors

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection to {peripheral} failed: {reason}")]
    ConnectionFailed { peripheral: String, reason: String },

    #[error("Peripheral not found: {0}")]
    PeripheralNotFound(String),

    #[error("Characteristic not found: 0x{0:04X}")]
    CharacteristicNotFound(u16),

    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Event channel closed")]
    ChannelClosed,
}

impl Error {
    /// Check if a later attempt on the same peripheral may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotConnected | Error::ConnectionFailed { .. } | Error::DiscoveryFailed(_)
        )
    }
}
