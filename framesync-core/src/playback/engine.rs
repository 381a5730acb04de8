//! Decode/seek engine
//!
//! Advances `PlaybackState` one frame per tick and performs frame-accurate
//! seeks: a container seek lands on a keyframe at or before the target, so
//! the engine walks forward a bounded number of frames to close the gap.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::decoder::{DecodedFrame, Decoder, DecoderError, FrameBuffer, MediaInfo, SeekStrategy};
use super::state::{clamp_position, PlaybackPhase, PlaybackState};
use crate::config::DEFAULT_MAX_SEEK_STEPS;

/// Tolerance when comparing a decoded position with the seek target
const TARGET_EPSILON_SECS: f64 = 1e-6;

/// Result of one engine tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A frame was decoded and the position advanced
    Frame,
    /// Input ran out on this tick
    EndOfStream,
    /// The decoder returned an error; nothing changed
    Skipped,
    /// Paused or already at end of stream; nothing decoded
    Idle,
}

/// How a successful seek settled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekOutcome {
    /// Requested target after clamping
    pub target_secs: f64,
    /// Position actually landed on
    pub landed_secs: f64,
    /// Frames decoded while walking toward the target
    pub steps: u32,
    pub strategy: SeekStrategy,
    /// False when the walk hit the step bound or end of input first
    pub reached_target: bool,
}

/// Both seek strategies failed
#[derive(Debug, Error)]
#[error("Seek to {target_secs:.3}s failed ({primary}; fallback: {fallback})")]
pub struct SeekError {
    pub target_secs: f64,
    pub primary: DecoderError,
    pub fallback: DecoderError,
}

/// Owns the decoder and the local playback model
#[derive(Debug)]
pub struct PlaybackEngine<D: Decoder> {
    decoder: D,
    state: PlaybackState,
    max_seek_steps: u32,
    seeking: bool,
    current_frame: Option<FrameBuffer>,
}

impl<D: Decoder> PlaybackEngine<D> {
    /// Wrap an opened decoder. `max_seek_steps` is forced to at least 1.
    pub fn new(decoder: D, max_seek_steps: u32) -> Self {
        let state = PlaybackState::new(decoder.info().duration_secs);
        Self {
            decoder,
            state,
            max_seek_steps: max_seek_steps.max(1),
            seeking: false,
            current_frame: None,
        }
    }

    /// Engine with the default step bound
    pub fn with_default_bound(decoder: D) -> Self {
        Self::new(decoder, DEFAULT_MAX_SEEK_STEPS)
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn info(&self) -> &MediaInfo {
        self.decoder.info()
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn max_seek_steps(&self) -> u32 {
        self.max_seek_steps
    }

    /// Last frame decoded, if any
    pub fn current_frame(&self) -> Option<&FrameBuffer> {
        self.current_frame.as_ref()
    }

    pub fn phase(&self) -> PlaybackPhase {
        if self.seeking {
            PlaybackPhase::Seeking
        } else if self.state.at_end_of_stream() {
            PlaybackPhase::EndOfStream
        } else if self.state.is_paused() {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Playing
        }
    }

    /// Advance by one frame unless paused or at end of stream
    pub fn step(&mut self) -> StepOutcome {
        if self.state.is_paused() || self.state.at_end_of_stream() {
            return StepOutcome::Idle;
        }
        self.decode_one()
    }

    /// Set the pause flag. Returns true if it changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        if self.state.is_paused() == paused {
            return false;
        }
        self.state.set_paused(paused);
        debug!("Engine: paused={} at {:.3}s", paused, self.state.position_secs());
        true
    }

    /// Flip the pause flag and return the new value
    pub fn toggle_pause(&mut self) -> bool {
        let paused = !self.state.is_paused();
        self.set_paused(paused);
        paused
    }

    /// Seek to `target_secs`, walking forward from the landed keyframe until
    /// the target is reached, input runs out, or the step bound is spent.
    ///
    /// The pause flag is untouched, so playback resumes in whatever state it
    /// was in. On failure the state stays at the last decoded position.
    pub fn seek(&mut self, target_secs: f64) -> Result<SeekOutcome, SeekError> {
        let target_secs = clamp_position(target_secs, self.state.duration_secs());
        self.seeking = true;

        let strategy = match self.decoder.seek(target_secs, SeekStrategy::BackwardKeyframe) {
            Ok(()) => SeekStrategy::BackwardKeyframe,
            Err(primary) => {
                debug!("Engine: {}, retrying with {}", primary, SeekStrategy::AnyFrame);
                match self.decoder.seek(target_secs, SeekStrategy::AnyFrame) {
                    Ok(()) => SeekStrategy::AnyFrame,
                    Err(fallback) => {
                        self.seeking = false;
                        let error = SeekError {
                            target_secs,
                            primary,
                            fallback,
                        };
                        warn!("Engine: {}", error);
                        return Err(error);
                    }
                }
            }
        };

        self.decoder.flush_buffers();
        self.state.clear_end_of_stream();
        // Provisional until a timestamped frame says otherwise
        self.state.set_position(target_secs);

        let mut steps = 0;
        let mut reached_target = false;
        while steps < self.max_seek_steps {
            match self.decoder.decode_next_frame() {
                Ok(Some(frame)) => {
                    steps += 1;
                    let landed = frame.position_secs;
                    self.accept_frame(frame);
                    if landed.is_some_and(|pos| pos + TARGET_EPSILON_SECS >= target_secs) {
                        reached_target = true;
                        break;
                    }
                }
                Ok(None) => {
                    self.state.mark_end_of_stream();
                    break;
                }
                Err(e) => {
                    steps += 1;
                    debug!("Engine: decode error while settling seek: {}", e);
                }
            }
        }
        self.seeking = false;

        let outcome = SeekOutcome {
            target_secs,
            landed_secs: self.state.position_secs(),
            steps,
            strategy,
            reached_target,
        };

        if reached_target {
            debug!(
                "Engine: seek to {:.3}s settled at {:.3}s after {} frames ({})",
                target_secs, outcome.landed_secs, steps, strategy
            );
        } else {
            info!(
                "Engine: seek to {:.3}s stopped short at {:.3}s after {} frames (eof={})",
                target_secs,
                outcome.landed_secs,
                steps,
                self.state.at_end_of_stream()
            );
        }

        Ok(outcome)
    }

    fn decode_one(&mut self) -> StepOutcome {
        match self.decoder.decode_next_frame() {
            Ok(Some(frame)) => {
                self.accept_frame(frame);
                StepOutcome::Frame
            }
            Ok(None) => {
                self.state.mark_end_of_stream();
                info!("Engine: end of stream at {:.3}s", self.state.position_secs());
                StepOutcome::EndOfStream
            }
            Err(e) => {
                warn!("Engine: {}", e);
                StepOutcome::Skipped
            }
        }
    }

    fn accept_frame(&mut self, frame: DecodedFrame) {
        self.state.record_frame(frame.pts, frame.position_secs);
        self.current_frame = Some(frame.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{SyntheticDecoder, SyntheticMedia};

    fn engine(duration_secs: f64, gop: u64, max_steps: u32) -> PlaybackEngine<SyntheticDecoder> {
        let decoder = SyntheticDecoder::new(SyntheticMedia {
            label: "clip".to_string(),
            duration_secs,
            frame_rate: 10.0,
            keyframe_interval: gop,
            width: 2,
            height: 2,
        });
        PlaybackEngine::new(decoder, max_steps)
    }

    #[test]
    fn test_step_counts_every_frame() {
        let mut engine = engine(10.0, 5, 300);
        for _ in 0..25 {
            assert_eq!(engine.step(), StepOutcome::Frame);
        }
        assert_eq!(engine.state().decoded_frame_count(), 25);
        assert!((engine.state().position_secs() - 2.4).abs() < 1e-9);
        assert!(engine.current_frame().is_some());
    }

    #[test]
    fn test_paused_engine_does_not_decode() {
        let mut engine = engine(10.0, 5, 300);
        engine.set_paused(true);
        assert_eq!(engine.step(), StepOutcome::Idle);
        assert_eq!(engine.state().decoded_frame_count(), 0);
        assert_eq!(engine.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn test_end_of_stream_is_sticky_until_seek() {
        let mut engine = engine(1.0, 5, 300);
        for _ in 0..10 {
            engine.step();
        }
        assert_eq!(engine.step(), StepOutcome::EndOfStream);
        assert_eq!(engine.phase(), PlaybackPhase::EndOfStream);
        assert_eq!(engine.step(), StepOutcome::Idle);

        let outcome = engine.seek(0.25).unwrap();
        assert!(outcome.reached_target);
        assert!(!engine.state().at_end_of_stream());
        assert_eq!(engine.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_seek_walks_from_keyframe_to_target() {
        let mut engine = engine(60.0, 25, 300);
        let outcome = engine.seek(12.3).unwrap();

        // frame 123 -> keyframe 100, walk 24 frames to reach 123
        assert_eq!(outcome.strategy, SeekStrategy::BackwardKeyframe);
        assert!(outcome.reached_target);
        assert_eq!(outcome.steps, 24);
        assert!((engine.state().position_secs() - 12.3).abs() < 1e-6);
        assert_eq!(engine.decoder().flush_count(), 1);
    }

    #[test]
    fn test_seek_walk_is_bounded() {
        let mut engine = engine(600.0, 1000, 10);
        let outcome = engine.seek(50.0).unwrap();

        assert!(!outcome.reached_target);
        assert_eq!(outcome.steps, 10);
        // keyframe 0, ten frames decoded -> frame 9
        assert!((outcome.landed_secs - 0.9).abs() < 1e-9);
        assert_eq!(engine.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_seek_falls_back_to_second_strategy() {
        let decoder = SyntheticDecoder::new(SyntheticMedia::default()).with_failing_primary_seek();
        let mut engine = PlaybackEngine::with_default_bound(decoder);
        let outcome = engine.seek(5.0).unwrap();

        assert_eq!(outcome.strategy, SeekStrategy::AnyFrame);
        assert_eq!(outcome.steps, 1);
        assert!(outcome.reached_target);
    }

    #[test]
    fn test_seek_failure_keeps_last_position() {
        let decoder = SyntheticDecoder::new(SyntheticMedia::default()).with_failing_seeks();
        let mut engine = PlaybackEngine::with_default_bound(decoder);
        for _ in 0..5 {
            engine.step();
        }
        let before = engine.state().clone();

        assert!(engine.seek(30.0).is_err());
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_seek_is_clamped_into_duration() {
        let mut engine = engine(10.0, 5, 300);
        for target in [-100.0, -0.5, 3.3, 9.95, 10.0, 55.0, f64::NAN] {
            engine.seek(target).unwrap();
            let pos = engine.state().position_secs();
            assert!((0.0..=10.0).contains(&pos), "target {} landed at {}", target, pos);
        }
    }

    #[test]
    fn test_seek_to_end_marks_end_of_stream() {
        let mut engine = engine(10.0, 5, 300);
        let outcome = engine.seek(10.0).unwrap();

        assert!(!outcome.reached_target);
        assert!(engine.state().at_end_of_stream());
        assert_eq!(engine.state().position_secs(), 10.0);
    }

    #[test]
    fn test_seek_preserves_pause_flag() {
        let mut engine = engine(10.0, 5, 300);
        engine.set_paused(true);
        engine.seek(4.0).unwrap();
        assert!(engine.state().is_paused());
        assert_eq!(engine.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn test_decoded_count_never_decreases() {
        let mut engine = engine(10.0, 5, 300);
        let mut last = 0;
        for i in 0..40 {
            if i % 7 == 0 {
                engine.seek((i % 3) as f64).unwrap();
            } else {
                engine.step();
            }
            let count = engine.state().decoded_frame_count();
            assert!(count >= last);
            last = count;
        }
    }
}
