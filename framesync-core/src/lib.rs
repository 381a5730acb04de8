//! FrameSync - Core Library
//!
//! This library plays a media stream locally and keeps its playhead loosely
//! in step with a remote peer. Peers exchange one-line status broadcasts over
//! a best-effort line channel; there is no session negotiation.

pub mod clock;
pub mod config;
pub mod controls;
pub mod error;
pub mod playback;
pub mod player;
pub mod render;
pub mod status;
pub mod sync;
pub mod transport;

// Re-exports for convenience
pub use config::SyncConfig;
pub use error::CoreError;
pub use playback::{Decoder, PlaybackEngine, PlaybackState, SyntheticDecoder};
pub use player::{Player, SyncStats, TickResult};
pub use status::{StateTag, StatusSnapshot};
