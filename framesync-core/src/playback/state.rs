//! Local playback model

/// Clamp a position into `[0, duration]`, or `[0, inf)` when the duration is unknown.
///
/// Non-finite inputs collapse to 0.
pub fn clamp_position(secs: f64, duration_secs: f64) -> f64 {
    if !secs.is_finite() {
        return 0.0;
    }
    if duration_secs > 0.0 {
        secs.clamp(0.0, duration_secs)
    } else {
        secs.max(0.0)
    }
}

/// Phase of the decode/seek state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Playing,
    Paused,
    Seeking,
    EndOfStream,
}

/// Authoritative local model of what is playing, where, and whether it moves.
///
/// Only the playback engine and the reconciler mutate it; everything else
/// reads through the accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    position_secs: f64,
    /// 0 means unknown/unbounded
    duration_secs: f64,
    paused: bool,
    /// Decoder-native timestamp of the last decoded frame
    presentation_timestamp: Option<i64>,
    decoded_frame_count: u64,
    at_end_of_stream: bool,
}

impl PlaybackState {
    /// Create the state for a freshly opened item, positioned at 0 and playing
    pub fn new(duration_secs: f64) -> Self {
        let duration_secs = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            0.0
        };
        Self {
            position_secs: 0.0,
            duration_secs,
            paused: false,
            presentation_timestamp: None,
            decoded_frame_count: 0,
            at_end_of_stream: false,
        }
    }

    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Whether the duration is known
    pub fn has_duration(&self) -> bool {
        self.duration_secs > 0.0
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn presentation_timestamp(&self) -> Option<i64> {
        self.presentation_timestamp
    }

    pub fn decoded_frame_count(&self) -> u64 {
        self.decoded_frame_count
    }

    pub fn at_end_of_stream(&self) -> bool {
        self.at_end_of_stream
    }

    /// Progress as a fraction in `[0, 1]` (0 when the duration is unknown)
    pub fn progress(&self) -> f64 {
        if self.has_duration() {
            (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Position in whole milliseconds
    pub fn playhead_ms(&self) -> i64 {
        (self.position_secs * 1000.0).round() as i64
    }

    pub(crate) fn set_position(&mut self, secs: f64) {
        self.position_secs = clamp_position(secs, self.duration_secs);
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Record one decoded frame. A frame without a timestamp still counts but
    /// leaves the position where it was.
    pub(crate) fn record_frame(&mut self, pts: Option<i64>, position_secs: Option<f64>) {
        self.decoded_frame_count = self.decoded_frame_count.saturating_add(1);
        if pts.is_some() {
            self.presentation_timestamp = pts;
        }
        if let Some(secs) = position_secs {
            self.set_position(secs);
        }
    }

    pub(crate) fn mark_end_of_stream(&mut self) {
        self.at_end_of_stream = true;
    }

    pub(crate) fn clear_end_of_stream(&mut self) {
        self.at_end_of_stream = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_with_known_duration() {
        assert_eq!(clamp_position(-5.0, 60.0), 0.0);
        assert_eq!(clamp_position(75.0, 60.0), 60.0);
        assert_eq!(clamp_position(12.5, 60.0), 12.5);
    }

    #[test]
    fn test_clamp_with_unknown_duration() {
        assert_eq!(clamp_position(-1.0, 0.0), 0.0);
        assert_eq!(clamp_position(1e6, 0.0), 1e6);
        assert_eq!(clamp_position(f64::NAN, 0.0), 0.0);
        assert_eq!(clamp_position(f64::INFINITY, 10.0), 0.0);
    }

    #[test]
    fn test_position_writes_are_clamped() {
        let mut state = PlaybackState::new(10.0);
        state.set_position(42.0);
        assert_eq!(state.position_secs(), 10.0);
        state.record_frame(Some(1), Some(-3.0));
        assert_eq!(state.position_secs(), 0.0);
    }

    #[test]
    fn test_frame_without_timestamp_keeps_position() {
        let mut state = PlaybackState::new(10.0);
        state.record_frame(Some(90_000), Some(1.0));
        state.record_frame(None, None);

        assert_eq!(state.position_secs(), 1.0);
        assert_eq!(state.presentation_timestamp(), Some(90_000));
        assert_eq!(state.decoded_frame_count(), 2);
    }

    #[test]
    fn test_invalid_duration_means_unknown() {
        let state = PlaybackState::new(f64::NAN);
        assert!(!state.has_duration());
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn test_playhead_ms_rounds() {
        let mut state = PlaybackState::new(0.0);
        state.set_position(1.2346);
        assert_eq!(state.playhead_ms(), 1235);
    }
}
