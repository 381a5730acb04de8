//! Decoder collaborator interface
//!
//! Demuxing, decoding and color conversion live behind the `Decoder` trait.
//! The engine only needs a frame, its timestamp, and a way to reposition.

use std::fmt;
use thiserror::Error;

/// Frame rate assumed when the container does not report one
pub const FALLBACK_FRAME_RATE: f64 = 30.0;

/// Metadata reported when a media item is opened
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Identifies the item to peers; must match on both sides for sync
    pub label: String,
    /// 0 means unknown/unbounded
    pub duration_secs: f64,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
}

impl MediaInfo {
    /// Frame rate, falling back to 30 fps when the reported one is unusable
    pub fn effective_frame_rate(&self) -> f64 {
        if self.frame_rate.is_finite() && self.frame_rate > 0.0 {
            self.frame_rate
        } else {
            FALLBACK_FRAME_RATE
        }
    }
}

/// A renderable RGB24 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// One decoded video frame
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Raw presentation timestamp in the stream's time base
    pub pts: Option<i64>,
    /// Position derived from `pts`; `None` when the frame carried no timestamp
    pub position_secs: Option<f64>,
    pub buffer: FrameBuffer,
}

/// Low-level seek strategies, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStrategy {
    /// Land on the nearest keyframe at or before the target
    BackwardKeyframe,
    /// Land on any frame near the target
    AnyFrame,
}

impl fmt::Display for SeekStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeekStrategy::BackwardKeyframe => f.write_str("backward-keyframe"),
            SeekStrategy::AnyFrame => f.write_str("any-frame"),
        }
    }
}

/// Errors reported by a decoder
#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("{strategy} seek failed: {reason}")]
    Seek {
        strategy: SeekStrategy,
        reason: String,
    },
}

/// Source of decoded frames for one open media item
pub trait Decoder {
    /// Metadata captured at open time
    fn info(&self) -> &MediaInfo;

    /// Decode the next frame. `Ok(None)` means the input is exhausted.
    fn decode_next_frame(&mut self) -> Result<Option<DecodedFrame>, DecoderError>;

    /// Reposition the demuxer near `target_secs` using the given strategy
    fn seek(&mut self, target_secs: f64, strategy: SeekStrategy) -> Result<(), DecoderError>;

    /// Drop frames buffered inside the codec (called after every successful seek)
    fn flush_buffers(&mut self);
}
