//! Line Transport
//!
//! Reliable, ordered byte stream carrying status lines to and from a peer
//! (usually through a relay that forwards every line to the other clients).

mod link;

pub use link::StatusLink;

use thiserror::Error;

/// Transport-related errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Status channel is disconnected")]
    Disconnected,

    #[error("Link task closed")]
    Closed,
}

/// Outbound side of a status channel
pub trait StatusSink {
    fn is_connected(&self) -> bool;

    /// Queue one line for sending. Must not block the caller.
    fn send_line(&self, line: &str) -> Result<(), TransportError>;
}
