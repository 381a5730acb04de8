//! Synthetic test-pattern decoder
//!
//! Produces a deterministic stream of solid-color frames with a fixed frame
//! rate and keyframe interval. Used by the headless peer and by tests in place
//! of real media.

use tracing::debug;

use super::decoder::{DecodedFrame, Decoder, DecoderError, FrameBuffer, MediaInfo, SeekStrategy};

/// Stream time base denominator (90 kHz, as MPEG-TS uses)
const TIME_BASE_DEN: i64 = 90_000;

/// URI scheme accepted by `SyntheticDecoder::open`
pub const SYNTHETIC_SCHEME: &str = "synthetic:";

/// Description of a synthetic stream
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMedia {
    pub label: String,
    /// 0 means unbounded
    pub duration_secs: f64,
    pub frame_rate: f64,
    /// Frames between keyframes
    pub keyframe_interval: u64,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticMedia {
    fn default() -> Self {
        Self {
            label: "synthetic".to_string(),
            duration_secs: 60.0,
            frame_rate: 25.0,
            keyframe_interval: 12,
            width: 16,
            height: 9,
        }
    }
}

impl SyntheticMedia {
    /// Parse `synthetic:name=clip:duration=120:fps=25:gop=50:size=64x36`.
    /// Every parameter is optional.
    pub fn parse(path: &str) -> Result<Self, DecoderError> {
        let open_error = |reason: String| DecoderError::Open {
            path: path.to_string(),
            reason,
        };

        let params = path
            .strip_prefix(SYNTHETIC_SCHEME)
            .ok_or_else(|| open_error(format!("expected a {} path", SYNTHETIC_SCHEME)))?;

        let mut media = Self::default();
        for param in params.split(':').filter(|p| !p.is_empty()) {
            let (key, value) = param
                .split_once('=')
                .ok_or_else(|| open_error(format!("malformed parameter '{}'", param)))?;
            let invalid = || open_error(format!("invalid {} '{}'", key, value));
            match key {
                "name" if !value.is_empty() => media.label = value.to_string(),
                "duration" => {
                    media.duration_secs = value.parse().map_err(|_| invalid())?;
                }
                "fps" => {
                    media.frame_rate = value.parse().map_err(|_| invalid())?;
                }
                "gop" => {
                    media.keyframe_interval = value.parse().map_err(|_| invalid())?;
                }
                "size" => {
                    let (w, h) = value.split_once('x').ok_or_else(invalid)?;
                    media.width = w.parse().map_err(|_| invalid())?;
                    media.height = h.parse().map_err(|_| invalid())?;
                }
                _ => return Err(invalid()),
            }
        }

        if !(media.frame_rate.is_finite() && media.frame_rate > 0.0) {
            return Err(open_error("frame rate must be positive".to_string()));
        }
        if media.width == 0 || media.height == 0 {
            return Err(open_error("frame size must be non-zero".to_string()));
        }
        Ok(media)
    }
}

/// Deterministic decoder over a `SyntheticMedia` description
#[derive(Debug)]
pub struct SyntheticDecoder {
    info: MediaInfo,
    keyframe_interval: u64,
    /// None when the stream is unbounded
    total_frames: Option<u64>,
    next_frame: u64,
    fail_primary_seek: bool,
    fail_fallback_seek: bool,
    /// Every n-th frame comes out without a timestamp
    missing_pts_every: Option<u64>,
    flush_count: u64,
    seek_count: u64,
}

impl SyntheticDecoder {
    /// Open a `synthetic:` path
    pub fn open(path: &str) -> Result<Self, DecoderError> {
        Ok(Self::new(SyntheticMedia::parse(path)?))
    }

    pub fn new(media: SyntheticMedia) -> Self {
        let total_frames = if media.duration_secs.is_finite() && media.duration_secs > 0.0 {
            Some((media.duration_secs * media.frame_rate).floor() as u64)
        } else {
            None
        };

        debug!(
            "Synthetic decoder: '{}' {:.3}s @ {:.3}fps, gop={}, frames={:?}",
            media.label, media.duration_secs, media.frame_rate, media.keyframe_interval, total_frames
        );

        Self {
            info: MediaInfo {
                label: media.label,
                duration_secs: media.duration_secs.max(0.0),
                frame_rate: media.frame_rate,
                width: media.width,
                height: media.height,
            },
            keyframe_interval: media.keyframe_interval.max(1),
            total_frames,
            next_frame: 0,
            fail_primary_seek: false,
            fail_fallback_seek: false,
            missing_pts_every: None,
            flush_count: 0,
            seek_count: 0,
        }
    }

    /// Make the backward-keyframe seek always fail
    pub fn with_failing_primary_seek(mut self) -> Self {
        self.fail_primary_seek = true;
        self
    }

    /// Make both seek strategies always fail
    pub fn with_failing_seeks(mut self) -> Self {
        self.fail_primary_seek = true;
        self.fail_fallback_seek = true;
        self
    }

    /// Strip the timestamp from every `every`-th frame
    pub fn with_missing_timestamps(mut self, every: u64) -> Self {
        self.missing_pts_every = Some(every.max(1));
        self
    }

    /// Index of the frame the next decode call returns
    pub fn next_frame_index(&self) -> u64 {
        self.next_frame
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    pub fn seek_count(&self) -> u64 {
        self.seek_count
    }

    fn pts_for(&self, index: u64) -> i64 {
        (index as f64 * TIME_BASE_DEN as f64 / self.info.frame_rate).round() as i64
    }

    fn frame_index_for(&self, secs: f64) -> u64 {
        let index = (secs.max(0.0) * self.info.frame_rate + 1e-9).floor() as u64;
        match self.total_frames {
            Some(total) => index.min(total),
            None => index,
        }
    }

    fn pattern(&self, index: u64) -> FrameBuffer {
        let shade = [
            (index.wrapping_mul(7) % 256) as u8,
            (index.wrapping_mul(13) % 256) as u8,
            (index.wrapping_mul(29) % 256) as u8,
        ];
        let pixels = self.info.width as usize * self.info.height as usize;
        let data = shade.iter().copied().cycle().take(pixels * 3).collect();
        FrameBuffer {
            width: self.info.width,
            height: self.info.height,
            data,
        }
    }
}

impl Decoder for SyntheticDecoder {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn decode_next_frame(&mut self) -> Result<Option<DecodedFrame>, DecoderError> {
        if let Some(total) = self.total_frames {
            if self.next_frame >= total {
                return Ok(None);
            }
        }

        let index = self.next_frame;
        self.next_frame += 1;

        let has_pts = match self.missing_pts_every {
            Some(every) => (index + 1) % every != 0,
            None => true,
        };
        let (pts, position_secs) = if has_pts {
            let pts = self.pts_for(index);
            (Some(pts), Some(pts as f64 / TIME_BASE_DEN as f64))
        } else {
            (None, None)
        };

        Ok(Some(DecodedFrame {
            pts,
            position_secs,
            buffer: self.pattern(index),
        }))
    }

    fn seek(&mut self, target_secs: f64, strategy: SeekStrategy) -> Result<(), DecoderError> {
        let fail = match strategy {
            SeekStrategy::BackwardKeyframe => self.fail_primary_seek,
            SeekStrategy::AnyFrame => self.fail_fallback_seek,
        };
        if fail {
            return Err(DecoderError::Seek {
                strategy,
                reason: "simulated failure".to_string(),
            });
        }

        let mut index = self.frame_index_for(target_secs);
        if strategy == SeekStrategy::BackwardKeyframe {
            index -= index % self.keyframe_interval;
        }
        self.next_frame = index;
        self.seek_count += 1;
        Ok(())
    }

    fn flush_buffers(&mut self) {
        self.flush_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(duration_secs: f64) -> SyntheticMedia {
        SyntheticMedia {
            label: "clip".to_string(),
            duration_secs,
            frame_rate: 10.0,
            keyframe_interval: 5,
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn test_parse_full_path() {
        let media = SyntheticMedia::parse("synthetic:name=movie:duration=120:fps=24:gop=48:size=64x36").unwrap();
        assert_eq!(media.label, "movie");
        assert_eq!(media.duration_secs, 120.0);
        assert_eq!(media.frame_rate, 24.0);
        assert_eq!(media.keyframe_interval, 48);
        assert_eq!((media.width, media.height), (64, 36));
    }

    #[test]
    fn test_parse_defaults_and_errors() {
        assert_eq!(SyntheticMedia::parse("synthetic:").unwrap(), SyntheticMedia::default());
        assert!(SyntheticMedia::parse("/tmp/movie.mkv").is_err());
        assert!(SyntheticMedia::parse("synthetic:fps=abc").is_err());
        assert!(SyntheticMedia::parse("synthetic:fps=0").is_err());
        assert!(SyntheticMedia::parse("synthetic:colour=red").is_err());
        assert!(SyntheticMedia::parse("synthetic:size=0x10").is_err());
    }

    #[test]
    fn test_frames_advance_and_exhaust() {
        let mut decoder = SyntheticDecoder::new(media(1.0));
        let mut positions = Vec::new();
        while let Some(frame) = decoder.decode_next_frame().unwrap() {
            positions.push(frame.position_secs.unwrap());
            assert_eq!(frame.buffer.data.len(), 2 * 2 * 3);
        }
        assert_eq!(positions.len(), 10);
        assert_eq!(positions[0], 0.0);
        assert!((positions[9] - 0.9).abs() < 1e-9);
        assert!(decoder.decode_next_frame().unwrap().is_none());
    }

    #[test]
    fn test_backward_seek_lands_on_keyframe() {
        let mut decoder = SyntheticDecoder::new(media(10.0));
        decoder.seek(3.75, SeekStrategy::BackwardKeyframe).unwrap();
        // frame 37 -> keyframe 35
        assert_eq!(decoder.next_frame_index(), 35);

        decoder.seek(3.75, SeekStrategy::AnyFrame).unwrap();
        assert_eq!(decoder.next_frame_index(), 37);
        assert_eq!(decoder.seek_count(), 2);
    }

    #[test]
    fn test_seek_failures() {
        let mut decoder = SyntheticDecoder::new(media(10.0)).with_failing_primary_seek();
        assert!(decoder.seek(1.0, SeekStrategy::BackwardKeyframe).is_err());
        assert!(decoder.seek(1.0, SeekStrategy::AnyFrame).is_ok());

        let mut decoder = SyntheticDecoder::new(media(10.0)).with_failing_seeks();
        assert!(decoder.seek(1.0, SeekStrategy::AnyFrame).is_err());
        assert_eq!(decoder.next_frame_index(), 0);
    }

    #[test]
    fn test_missing_timestamps() {
        let mut decoder = SyntheticDecoder::new(media(10.0)).with_missing_timestamps(3);
        let frames: Vec<_> = (0..3).map(|_| decoder.decode_next_frame().unwrap().unwrap()).collect();
        assert!(frames[0].pts.is_some());
        assert!(frames[1].pts.is_some());
        assert!(frames[2].pts.is_none());
        assert!(frames[2].position_secs.is_none());
    }

    #[test]
    fn test_unbounded_stream_never_exhausts() {
        let mut decoder = SyntheticDecoder::new(media(0.0));
        decoder.seek(1_000.0, SeekStrategy::AnyFrame).unwrap();
        assert!(decoder.decode_next_frame().unwrap().is_some());
        assert_eq!(decoder.info().duration_secs, 0.0);
    }
}
