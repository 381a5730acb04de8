//! Status broadcaster
//!
//! Decides when the local status line goes out: on every state-tag change,
//! whenever a send is explicitly requested, and otherwise once per interval.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::status::StateTag;
use crate::transport::StatusSink;

/// What happened on one broadcaster tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Sent,
    /// Nothing due yet
    NotDue,
    /// No channel, or the channel was lost earlier
    Offline,
    /// The send failed; the channel is now considered lost
    Failed,
}

/// Periodic plus change-triggered status sender
#[derive(Debug, Clone)]
pub struct StatusBroadcaster {
    interval: Duration,
    send_due: bool,
    last_sent_at: Option<Instant>,
    last_tag: Option<StateTag>,
    channel_lost: bool,
    lines_sent: u64,
}

impl StatusBroadcaster {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            // first tick always sends
            send_due: true,
            last_sent_at: None,
            last_tag: None,
            channel_lost: false,
            lines_sent: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    pub fn channel_lost(&self) -> bool {
        self.channel_lost
    }

    /// Request a send on the next tick regardless of the interval
    pub fn mark_due(&mut self) {
        self.send_due = true;
    }

    /// Record the current state tag; a change makes a send due
    pub fn observe_tag(&mut self, tag: StateTag) {
        if self.last_tag != Some(tag) {
            if self.last_tag.is_some() {
                debug!("Broadcaster: state {:?} -> {}", self.last_tag, tag);
            }
            self.last_tag = Some(tag);
            self.send_due = true;
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        if self.send_due {
            return true;
        }
        match self.last_sent_at {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Send one line through `sink` if a send is due.
    ///
    /// `encode` is only called when a line actually goes out, so the sent_ms
    /// stamp is taken at send time.
    pub fn tick<S, F>(&mut self, now: Instant, sink: Option<&S>, encode: F) -> BroadcastOutcome
    where
        S: StatusSink + ?Sized,
        F: FnOnce() -> String,
    {
        if self.channel_lost {
            return BroadcastOutcome::Offline;
        }
        let Some(sink) = sink else {
            return BroadcastOutcome::Offline;
        };
        if !self.is_due(now) {
            return BroadcastOutcome::NotDue;
        }
        if !sink.is_connected() {
            self.lose_channel("peer closed the connection");
            return BroadcastOutcome::Failed;
        }

        let line = encode();
        match sink.send_line(&line) {
            Ok(()) => {
                self.send_due = false;
                self.last_sent_at = Some(now);
                self.lines_sent += 1;
                BroadcastOutcome::Sent
            }
            Err(e) => {
                self.lose_channel(&e.to_string());
                BroadcastOutcome::Failed
            }
        }
    }

    fn lose_channel(&mut self, reason: &str) {
        if !self.channel_lost {
            warn!("Broadcaster: status channel lost ({}), continuing locally", reason);
            self.channel_lost = true;
        }
    }
}
