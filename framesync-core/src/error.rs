//! Crate-level error type

use crate::config::ConfigError;
use crate::playback::{DecoderError, SeekError};
use crate::transport::TransportError;

/// Errors surfaced by the player session
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),

    #[error(transparent)]
    Seek(#[from] SeekError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Already connected to a peer channel")]
    AlreadyConnected,
}
