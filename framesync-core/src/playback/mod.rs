//! Playback Engine
//!
//! Local playback model, the decoder collaborator, and the decode/seek loop.

mod decoder;
mod engine;
mod state;
mod synthetic;

pub use decoder::*;
pub use engine::*;
pub use state::*;
pub use synthetic::*;
