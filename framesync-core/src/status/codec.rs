//! Status line encoder and parser
//!
//! Wire format: a marker token followed by space-separated `key=value`
//! tokens, newline terminated:
//!
//! ```text
//! #FSYNC label=movie.mkv elapsed=00:01:40 remaining=00:18:20 total=00:20:00 progress=8.33 ...
//! ```
//!
//! Values never contain whitespace (the label is percent-escaped). The parser
//! looks for the marker anywhere in the line, since relays may prefix the
//! sender's name, and ignores tokens it does not know.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use thiserror::Error;

use super::snapshot::{StateTag, StatusReport, StatusSnapshot, WindowSize};
use crate::playback::PlaybackState;

/// Token that marks a line as a status record
pub const STATUS_MARKER: &str = "#FSYNC";

/// Placeholder for times that cannot be computed (unknown duration)
const UNKNOWN_CLOCK: &str = "--:--:--";

/// Why a line was not accepted as a status record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRejection {
    #[error("no status marker")]
    NoMarker,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': '{value}'")]
    InvalidField { field: &'static str, value: String },
}

/// Local facts that go into a status line besides the playback model
#[derive(Debug, Clone, Copy)]
pub struct StatusContext<'a> {
    pub label: &'a str,
    pub frame_rate: f64,
    pub window: WindowSize,
    pub state: StateTag,
    pub sent_at_epoch_ms: i64,
}

/// Build the full report for the current local state
pub fn build_report(state: &PlaybackState, ctx: &StatusContext<'_>) -> StatusReport {
    let playhead_ms = state.playhead_ms();
    let duration_ms = if state.has_duration() {
        (state.duration_secs() * 1000.0).round() as i64
    } else {
        0
    };
    let remaining_ms = if duration_ms > 0 {
        (duration_ms - playhead_ms).max(0)
    } else {
        0
    };
    let frame_index = if ctx.frame_rate.is_finite() && ctx.frame_rate > 0.0 {
        (state.position_secs() * ctx.frame_rate).floor() as u64
    } else {
        0
    };

    StatusReport {
        label: ctx.label.to_string(),
        elapsed: format_clock(playhead_ms),
        remaining: if duration_ms > 0 {
            format_clock(remaining_ms)
        } else {
            UNKNOWN_CLOCK.to_string()
        },
        total: if duration_ms > 0 {
            format_clock(duration_ms)
        } else {
            UNKNOWN_CLOCK.to_string()
        },
        progress_percent: (state.progress() * 100.0).clamp(0.0, 100.0),
        frame_rate: ctx.frame_rate,
        paused: state.is_paused(),
        eof: state.at_end_of_stream(),
        window: ctx.window,
        state: ctx.state,
        sent_at_epoch_ms: ctx.sent_at_epoch_ms,
        sync_anchor_ms: ctx.sent_at_epoch_ms - playhead_ms,
        playhead_ms,
        duration_ms,
        remaining_ms,
        frame_index,
        decoded_frames: state.decoded_frame_count(),
        pts: state.presentation_timestamp(),
    }
}

/// Encode the current local state as one newline-terminated status line
pub fn encode_status(state: &PlaybackState, ctx: &StatusContext<'_>) -> String {
    build_report(state, ctx).to_string()
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} label={}", STATUS_MARKER, escape_value(&self.label))?;
        write!(
            f,
            " elapsed={} remaining={} total={} progress={:.2} fps={:.3}",
            self.elapsed, self.remaining, self.total, self.progress_percent, self.frame_rate
        )?;
        write!(
            f,
            " paused={} eof={} window={}x{} state={}",
            flag(self.paused),
            flag(self.eof),
            self.window.width,
            self.window.height,
            self.state
        )?;
        write!(
            f,
            " sent_ms={} anchor_ms={} playhead_ms={} duration_ms={} remaining_ms={}",
            self.sent_at_epoch_ms, self.sync_anchor_ms, self.playhead_ms, self.duration_ms, self.remaining_ms
        )?;
        write!(f, " frame={} decoded={}", self.frame_index, self.decoded_frames)?;
        match self.pts {
            Some(pts) => writeln!(f, " pts={}", pts),
            None => writeln!(f, " pts=none"),
        }
    }
}

/// Parse one line into a snapshot, or say why it was rejected
pub fn parse_line(line: &str) -> Result<StatusSnapshot, ParseRejection> {
    let mut tokens = line.split_whitespace();
    if !tokens.by_ref().any(|token| token == STATUS_MARKER) {
        return Err(ParseRejection::NoMarker);
    }

    let fields: HashMap<&str, &str> = tokens.filter_map(|token| token.split_once('=')).collect();

    let source_label = field(&fields, "label", unescape_value)?;
    let state_tag = field(&fields, "state", |v| v.parse::<StateTag>().ok())?;
    let is_paused = field(&fields, "paused", parse_flag)?;
    let sent_at_epoch_ms = field(&fields, "sent_ms", |v| v.parse::<i64>().ok())?;
    let playhead_ms = field(&fields, "playhead_ms", |v| v.parse::<i64>().ok())?;

    Ok(StatusSnapshot {
        source_label,
        state_tag,
        is_paused,
        sent_at_epoch_ms,
        playhead_ms,
    })
}

/// Parse one line, dropping anything malformed
pub fn decode_line(line: &str) -> Option<StatusSnapshot> {
    parse_line(line).ok()
}

fn field<T>(
    fields: &HashMap<&str, &str>,
    name: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ParseRejection> {
    let raw = fields
        .get(name)
        .copied()
        .ok_or(ParseRejection::MissingField(name))?;
    parse(raw).ok_or_else(|| ParseRejection::InvalidField {
        field: name,
        value: raw.to_string(),
    })
}

fn flag(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "yes" | "1" | "true" => Some(true),
        "no" | "0" | "false" => Some(false),
        _ => None,
    }
}

/// `HH:MM:SS` from milliseconds (negative inputs read as 0)
pub fn format_clock(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60
    )
}

/// Percent-escape whitespace, control characters and '%'
fn escape_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch == '%' || ch.is_whitespace() || ch.is_control() {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{:02X}", byte);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn unescape_value(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
