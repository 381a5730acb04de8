//! Status record types

use std::fmt;
use std::str::FromStr;

use crate::playback::PlaybackPhase;

/// Coarse playback state carried in every status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateTag {
    Playing,
    Paused,
    Seeking,
    Eof,
    Closed,
}

impl StateTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateTag::Playing => "playing",
            StateTag::Paused => "paused",
            StateTag::Seeking => "seeking",
            StateTag::Eof => "eof",
            StateTag::Closed => "closed",
        }
    }
}

impl From<PlaybackPhase> for StateTag {
    fn from(phase: PlaybackPhase) -> Self {
        match phase {
            PlaybackPhase::Playing => StateTag::Playing,
            PlaybackPhase::Paused => StateTag::Paused,
            PlaybackPhase::Seeking => StateTag::Seeking,
            PlaybackPhase::EndOfStream => StateTag::Eof,
        }
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playing" => Ok(StateTag::Playing),
            "paused" => Ok(StateTag::Paused),
            "seeking" => Ok(StateTag::Seeking),
            "eof" => Ok(StateTag::Eof),
            "closed" => Ok(StateTag::Closed),
            _ => Err(()),
        }
    }
}

/// Window dimensions reported alongside the playhead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

/// One parsed observation of a peer's playback state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Which media item the snapshot describes
    pub source_label: String,
    pub state_tag: StateTag,
    pub is_paused: bool,
    /// Sender's wall clock at send time
    pub sent_at_epoch_ms: i64,
    /// Sender's position at send time
    pub playhead_ms: i64,
}

/// Every field of one encoded status line
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub label: String,
    pub elapsed: String,
    pub remaining: String,
    pub total: String,
    /// 0.00 - 100.00
    pub progress_percent: f64,
    pub frame_rate: f64,
    pub paused: bool,
    pub eof: bool,
    pub window: WindowSize,
    pub state: StateTag,
    pub sent_at_epoch_ms: i64,
    /// Estimated epoch at which playback was at position 0
    pub sync_anchor_ms: i64,
    pub playhead_ms: i64,
    /// 0 when unknown
    pub duration_ms: i64,
    pub remaining_ms: i64,
    pub frame_index: u64,
    pub decoded_frames: u64,
    pub pts: Option<i64>,
}

impl StatusReport {
    /// The part of the report receivers act on
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            source_label: self.label.clone(),
            state_tag: self.state,
            is_paused: self.paused,
            sent_at_epoch_ms: self.sent_at_epoch_ms,
            playhead_ms: self.playhead_ms,
        }
    }
}
