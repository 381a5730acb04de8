//! Single-slot snapshot mailbox
//!
//! The only object shared between the transport reader and the playback
//! tick. Holds at most one snapshot; a newer post replaces an unconsumed one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::status::StatusSnapshot;

/// Last-write-wins handoff from the reader task to the main tick
#[derive(Debug, Clone, Default)]
pub struct SnapshotMailbox {
    slot: Arc<Mutex<Option<StatusSnapshot>>>,
    overwritten: Arc<AtomicU64>,
}

impl SnapshotMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot. Returns true if it replaced one nobody had taken.
    pub fn post(&self, snapshot: StatusSnapshot) -> bool {
        let replaced = self.slot.lock().replace(snapshot).is_some();
        if replaced {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
        replaced
    }

    /// Take the pending snapshot, leaving the slot empty
    pub fn take(&self) -> Option<StatusSnapshot> {
        self.slot.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Snapshots dropped because a newer one arrived first
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StateTag;

    fn snapshot(sent_at_epoch_ms: i64) -> StatusSnapshot {
        StatusSnapshot {
            source_label: "movie".to_string(),
            state_tag: StateTag::Playing,
            is_paused: false,
            sent_at_epoch_ms,
            playhead_ms: 0,
        }
    }

    #[test]
    fn test_newest_post_wins() {
        let mailbox = SnapshotMailbox::new();
        assert!(!mailbox.post(snapshot(1)));
        assert!(mailbox.post(snapshot(2)));
        assert!(mailbox.post(snapshot(3)));

        assert_eq!(mailbox.take().unwrap().sent_at_epoch_ms, 3);
        assert!(mailbox.take().is_none());
        assert_eq!(mailbox.overwritten(), 2);
    }

    #[test]
    fn test_clones_share_the_slot() {
        let reader_side = SnapshotMailbox::new();
        let tick_side = reader_side.clone();

        let handle = std::thread::spawn(move || {
            for sent in 1..=100 {
                reader_side.post(snapshot(sent));
            }
        });
        handle.join().unwrap();

        assert!(tick_side.has_pending());
        assert_eq!(tick_side.take().unwrap().sent_at_epoch_ms, 100);
    }
}
