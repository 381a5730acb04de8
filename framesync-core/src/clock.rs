//! Wall-clock helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current time in milliseconds since UNIX epoch
pub fn current_time_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
