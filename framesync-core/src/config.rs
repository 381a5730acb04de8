//! Sync policy configuration
//!
//! The drift threshold, broadcast interval and seek bound are policy values,
//! so they can come from a JSON file and be overridden per process through
//! environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Drift below this is left alone to avoid seek jitter
pub const DEFAULT_DRIFT_THRESHOLD_MS: u64 = 500;

/// Periodic status broadcast interval
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 1000;

/// Maximum frames decoded while settling one seek
pub const DEFAULT_MAX_SEEK_STEPS: u32 = 300;

/// Jump size for arrow keys and the back/forward buttons
pub const DEFAULT_SEEK_STEP_SECS: f64 = 10.0;

/// Remote snapshots are ignored for this long after a local user action.
/// Measured on the local clock only; 0 disables the guard.
pub const DEFAULT_LOCAL_ACTION_GRACE_MS: u64 = 500;

const ENV_DRIFT_THRESHOLD_MS: &str = "FRAMESYNC_DRIFT_THRESHOLD_MS";
const ENV_BROADCAST_INTERVAL_MS: &str = "FRAMESYNC_BROADCAST_INTERVAL_MS";
const ENV_MAX_SEEK_STEPS: &str = "FRAMESYNC_MAX_SEEK_STEPS";
const ENV_SEEK_STEP_SECS: &str = "FRAMESYNC_SEEK_STEP_SECS";
const ENV_LOCAL_ACTION_GRACE_MS: &str = "FRAMESYNC_LOCAL_ACTION_GRACE_MS";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Sync policy values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub drift_threshold_ms: u64,
    pub broadcast_interval_ms: u64,
    pub max_seek_steps: u32,
    pub seek_step_secs: f64,
    pub local_action_grace_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_threshold_ms: DEFAULT_DRIFT_THRESHOLD_MS,
            broadcast_interval_ms: DEFAULT_BROADCAST_INTERVAL_MS,
            max_seek_steps: DEFAULT_MAX_SEEK_STEPS,
            seek_step_secs: DEFAULT_SEEK_STEP_SECS,
            local_action_grace_ms: DEFAULT_LOCAL_ACTION_GRACE_MS,
        }
    }
}

impl SyncConfig {
    /// Load from an optional JSON file, then apply `FRAMESYNC_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        debug!("Config: {:?}", config);
        Ok(config)
    }

    /// Parse a JSON document; missing keys keep their defaults
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment, in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DRIFT_THRESHOLD_MS) {
            self.drift_threshold_ms = parse_override(ENV_DRIFT_THRESHOLD_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_BROADCAST_INTERVAL_MS) {
            self.broadcast_interval_ms = parse_override(ENV_BROADCAST_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_SEEK_STEPS) {
            self.max_seek_steps = parse_override(ENV_MAX_SEEK_STEPS, &value)?;
        }
        if let Some(value) = lookup(ENV_SEEK_STEP_SECS) {
            self.seek_step_secs = parse_override(ENV_SEEK_STEP_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_LOCAL_ACTION_GRACE_MS) {
            self.local_action_grace_ms = parse_override(ENV_LOCAL_ACTION_GRACE_MS, &value)?;
        }
        Ok(())
    }

    /// Reject values that would make the sync loop unbounded or meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_seek_steps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_seek_steps",
                value: self.max_seek_steps.to_string(),
            });
        }
        if self.broadcast_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "broadcast_interval_ms",
                value: self.broadcast_interval_ms.to_string(),
            });
        }
        if !(self.seek_step_secs.is_finite() && self.seek_step_secs > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "seek_step_secs",
                value: self.seek_step_secs.to_string(),
            });
        }
        // A guard as long as the broadcast interval would also swallow the peer's periodic resend
        if self.local_action_grace_ms >= self.broadcast_interval_ms {
            return Err(ConfigError::InvalidValue {
                key: "local_action_grace_ms",
                value: self.local_action_grace_ms.to_string(),
            });
        }
        Ok(())
    }

    pub fn drift_threshold_secs(&self) -> f64 {
        self.drift_threshold_ms as f64 / 1000.0
    }

    pub fn local_action_grace_ms(&self) -> i64 {
        i64::try_from(self.local_action_grace_ms).unwrap_or(i64::MAX)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }
}

fn parse_override<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
