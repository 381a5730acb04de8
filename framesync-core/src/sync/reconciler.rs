//! Remote reconciler
//!
//! Decides, per remote snapshot, whether to jump the local playhead and/or
//! flip the pause flag. Snapshots are ordered by the sender's send time via a
//! monotonic watermark, never by arrival order.

use thiserror::Error;
use tracing::{debug, info};

use crate::playback::{clamp_position, Decoder, PlaybackEngine, PlaybackState, SeekError, SeekOutcome};
use crate::status::{StateTag, StatusSnapshot};

/// Most recent accepted sender timestamp. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationWatermark {
    last_accepted_sent_epoch_ms: i64,
}

impl ReconciliationWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> i64 {
        self.last_accepted_sent_epoch_ms
    }

    /// A snapshot is admitted only if it was sent strictly after the watermark
    pub fn admits(&self, sent_at_epoch_ms: i64) -> bool {
        sent_at_epoch_ms > self.last_accepted_sent_epoch_ms
    }

    pub fn advance(&mut self, sent_at_epoch_ms: i64) {
        self.last_accepted_sent_epoch_ms = self.last_accepted_sent_epoch_ms.max(sent_at_epoch_ms);
    }
}

/// Why a snapshot was dropped without side effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("snapshot describes a different media item")]
    ForeignItem,

    #[error("snapshot sent at or before watermark {watermark}")]
    Stale { watermark: i64 },

    #[error("local user action {since_ms}ms ago takes precedence")]
    LocalActionPending { since_ms: i64 },
}

/// What an accepted snapshot asks the local player to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncPlan {
    /// Estimated current peer position
    pub target_secs: f64,
    /// `|local - target|`
    pub drift_secs: f64,
    pub seek_to: Option<f64>,
    pub set_paused: Option<bool>,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.seek_to.is_none() && self.set_paused.is_none()
    }
}

/// Result of reconciling one snapshot
#[derive(Debug)]
pub enum ReconcileOutcome {
    Rejected(Rejection),
    Applied {
        plan: SyncPlan,
        seek: Option<Result<SeekOutcome, SeekError>>,
        paused_changed: bool,
    },
}

impl ReconcileOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { .. })
    }

    /// Whether a seek was attempted
    pub fn forced_seek(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { seek: Some(_), .. })
    }

    /// Whether a seek was attempted and landed (the visible frame changed)
    pub fn seek_succeeded(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { seek: Some(Ok(_)), .. })
    }

    pub fn paused_changed(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { paused_changed: true, .. })
    }
}

/// Applies remote snapshots to the local engine
#[derive(Debug, Clone)]
pub struct Reconciler {
    local_label: String,
    drift_threshold_secs: f64,
    watermark: ReconciliationWatermark,
    /// Local clock only, never compared against sender timestamps
    local_action_grace_ms: i64,
    last_local_action_ms: Option<i64>,
}

impl Reconciler {
    pub fn new(local_label: impl Into<String>, drift_threshold_secs: f64) -> Self {
        Self {
            local_label: local_label.into(),
            drift_threshold_secs,
            watermark: ReconciliationWatermark::new(),
            local_action_grace_ms: 0,
            last_local_action_ms: None,
        }
    }

    pub fn with_local_action_grace(mut self, grace_ms: i64) -> Self {
        self.local_action_grace_ms = grace_ms.max(0);
        self
    }

    pub fn watermark(&self) -> i64 {
        self.watermark.value()
    }

    pub fn drift_threshold_secs(&self) -> f64 {
        self.drift_threshold_secs
    }

    /// Record a local user action at local time `now_ms`.
    ///
    /// Snapshots arriving within the grace window are dropped so a peer line
    /// already in flight cannot undo the action. The watermark is untouched.
    pub fn note_local_action(&mut self, now_ms: i64) {
        self.last_local_action_ms = Some(now_ms);
    }

    /// Validate a snapshot and work out the corrective actions.
    ///
    /// Advances the watermark for every snapshot that passes the label,
    /// staleness and grace checks, even when no action results.
    pub fn plan(
        &mut self,
        snapshot: &StatusSnapshot,
        local: &PlaybackState,
        now_ms: i64,
    ) -> Result<SyncPlan, Rejection> {
        if snapshot.source_label != self.local_label {
            return Err(Rejection::ForeignItem);
        }
        if !self.watermark.admits(snapshot.sent_at_epoch_ms) {
            return Err(Rejection::Stale {
                watermark: self.watermark.value(),
            });
        }
        if let Some(at) = self.last_local_action_ms {
            let since_ms = now_ms.saturating_sub(at);
            if since_ms < self.local_action_grace_ms {
                return Err(Rejection::LocalActionPending { since_ms });
            }
        }
        self.watermark.advance(snapshot.sent_at_epoch_ms);

        let mut target_secs = snapshot.playhead_ms as f64 / 1000.0;
        if !snapshot.is_paused {
            // Dead-reckon the peer forward by the one-way delay
            let elapsed_ms = now_ms.saturating_sub(snapshot.sent_at_epoch_ms).max(0);
            target_secs += elapsed_ms as f64 / 1000.0;
        }
        let target_secs = clamp_position(target_secs, local.duration_secs());
        let drift_secs = (local.position_secs() - target_secs).abs();

        if snapshot.state_tag == StateTag::Closed {
            return Ok(SyncPlan {
                target_secs,
                drift_secs,
                seek_to: None,
                set_paused: None,
            });
        }

        let force_seek = snapshot.state_tag == StateTag::Seeking || drift_secs >= self.drift_threshold_secs;
        let set_paused = (snapshot.is_paused != local.is_paused()).then_some(snapshot.is_paused);

        Ok(SyncPlan {
            target_secs,
            drift_secs,
            seek_to: force_seek.then_some(target_secs),
            set_paused,
        })
    }

    /// Plan and apply one snapshot against the engine.
    ///
    /// Goes through the same engine calls a user action would, and never asks
    /// for a broadcast itself.
    pub fn reconcile<D: Decoder>(
        &mut self,
        snapshot: &StatusSnapshot,
        engine: &mut PlaybackEngine<D>,
        now_ms: i64,
    ) -> ReconcileOutcome {
        let plan = match self.plan(snapshot, engine.state(), now_ms) {
            Ok(plan) => plan,
            Err(rejection) => {
                debug!("Reconciler: dropped snapshot sent at {} ({})", snapshot.sent_at_epoch_ms, rejection);
                return ReconcileOutcome::Rejected(rejection);
            }
        };

        let seek = plan.seek_to.map(|target| {
            info!(
                "Reconciler: drift {:.3}s (state={}), seeking to {:.3}s",
                plan.drift_secs, snapshot.state_tag, target
            );
            engine.seek(target)
        });

        let paused_changed = match plan.set_paused {
            Some(paused) => {
                info!("Reconciler: peer paused={}, following", paused);
                engine.set_paused(paused)
            }
            None => false,
        };

        if plan.is_noop() {
            debug!(
                "Reconciler: in sync (drift {:.3}s, target {:.3}s)",
                plan.drift_secs, plan.target_secs
            );
        }

        ReconcileOutcome::Applied {
            plan,
            seek,
            paused_changed,
        }
    }
}
