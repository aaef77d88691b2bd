//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] djilive_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] djilive_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] djilive_types::Error),

    #[error("Device driver has stopped")]
    DriverStopped,
}
