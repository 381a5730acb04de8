//! Player session
//!
//! Owns the engine, the renderer, the sync state and an async runtime for the
//! status link. `tick` is one pass of the main loop:
//! input, decode, reconcile, broadcast, present.

use std::time::{Duration, Instant};

use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, warn};

use crate::clock::current_time_ms;
use crate::config::SyncConfig;
use crate::controls::{ControlHit, ControlLayout};
use crate::error::CoreError;
use crate::playback::{Decoder, PlaybackEngine};
use crate::render::{InputEvent, Key, OverlayView, Renderer};
use crate::status::{self, StateTag, StatusContext, StatusSnapshot};
use crate::sync::{BroadcastOutcome, ReconcileOutcome, Reconciler, Rejection, SnapshotMailbox, StatusBroadcaster};
use crate::transport::{StatusLink, StatusSink};

/// Whether the main loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    Continue,
    Quit,
}

/// Counters for one player session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub snapshots_applied: u64,
    pub rejected_stale: u64,
    pub rejected_foreign: u64,
    /// Dropped inside the grace window after a local action
    pub rejected_pending: u64,
    /// Remote-driven seeks that landed
    pub seeks_forced: u64,
    pub seeks_failed: u64,
    pub pause_flips: u64,
    /// Seeks and pause toggles from local input
    pub local_actions: u64,
    pub lines_sent: u64,
    pub mailbox_overwrites: u64,
}

pub struct Player<D: Decoder, R: Renderer> {
    runtime: Runtime,
    engine: PlaybackEngine<D>,
    renderer: R,
    config: SyncConfig,
    reconciler: Reconciler,
    broadcaster: StatusBroadcaster,
    mailbox: SnapshotMailbox,
    link: Option<StatusLink>,
    layout: ControlLayout,
    /// Preview ratio while the seek bar is being dragged
    scrub: Option<f64>,
    /// Next broadcast carries `state=seeking`
    announce_seek: bool,
    stats: SyncStats,
}

impl<D: Decoder, R: Renderer> Player<D, R> {
    pub fn new(decoder: D, renderer: R, config: SyncConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let runtime = Runtime::new().map_err(CoreError::Runtime)?;

        let info = decoder.info().clone();
        info!(
            "Player: opened '{}' ({:.3}s @ {:.3}fps, {}x{})",
            info.label,
            info.duration_secs,
            info.effective_frame_rate(),
            info.width,
            info.height
        );

        Ok(Self {
            runtime,
            engine: PlaybackEngine::new(decoder, config.max_seek_steps),
            renderer,
            reconciler: Reconciler::new(info.label.clone(), config.drift_threshold_secs())
                .with_local_action_grace(config.local_action_grace_ms()),
            broadcaster: StatusBroadcaster::new(config.broadcast_interval()),
            config,
            mailbox: SnapshotMailbox::new(),
            link: None,
            layout: ControlLayout::new(info.width, info.height),
            scrub: None,
            announce_seek: false,
            stats: SyncStats::default(),
        })
    }

    /// Open the status channel to a peer (or relay)
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), CoreError> {
        if self.link.is_some() {
            return Err(CoreError::AlreadyConnected);
        }
        let link = self
            .runtime
            .block_on(StatusLink::connect(host, port, self.mailbox.clone()))?;
        self.link = Some(link);
        self.broadcaster.mark_due();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.is_connected()) && !self.broadcaster.channel_lost()
    }

    /// Mailbox fed by the status link reader
    pub fn mailbox(&self) -> &SnapshotMailbox {
        &self.mailbox
    }

    pub fn engine(&self) -> &PlaybackEngine<D> {
        &self.engine
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn layout(&self) -> &ControlLayout {
        &self.layout
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn runtime_handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            lines_sent: self.broadcaster.lines_sent(),
            mailbox_overwrites: self.mailbox.overwritten(),
            ..self.stats
        }
    }

    /// Delay between ticks for the media's frame rate
    pub fn frame_delay(&self) -> Duration {
        let fps = self.engine.info().effective_frame_rate().max(1.0);
        Duration::from_millis((1000.0 / fps) as u64)
    }

    /// One pass of the main loop
    pub fn tick(&mut self) -> TickResult {
        for event in self.renderer.poll_input() {
            if self.handle_input(event) == TickResult::Quit {
                return TickResult::Quit;
            }
        }

        self.engine.step();

        if let Some(snapshot) = self.mailbox.take() {
            self.apply_remote(&snapshot);
        }

        self.broadcast(Instant::now());
        self.present();
        TickResult::Continue
    }

    /// Tick at the frame rate until input asks to quit
    pub fn run(&mut self) {
        let delay = self.frame_delay();
        info!("Player: running at {}ms per frame", delay.as_millis());
        while self.tick() == TickResult::Continue {
            std::thread::sleep(delay);
        }
    }

    /// Send a final `closed` line, stop the link tasks and return the session stats
    pub fn shutdown(mut self) -> SyncStats {
        if let Some(link) = self.link.take() {
            if link.is_connected() && !self.broadcaster.channel_lost() {
                let line = Self::encode_line(&self.engine, &self.layout, StateTag::Closed);
                if let Err(e) = link.send_line(&line) {
                    debug!("Player: could not send closing status: {}", e);
                }
            }
            self.runtime.block_on(link.shutdown());
        }

        let stats = self.stats();
        info!(
            "Player: session ended (applied={}, stale={}, foreign={}, pending={}, seeks={}, failed_seeks={}, pause_flips={}, local={}, sent={}, overwritten={})",
            stats.snapshots_applied,
            stats.rejected_stale,
            stats.rejected_foreign,
            stats.rejected_pending,
            stats.seeks_forced,
            stats.seeks_failed,
            stats.pause_flips,
            stats.local_actions,
            stats.lines_sent,
            stats.mailbox_overwrites
        );
        stats
    }

    fn handle_input(&mut self, event: InputEvent) -> TickResult {
        match event {
            InputEvent::Quit | InputEvent::Key(Key::Escape) => return TickResult::Quit,
            InputEvent::Key(Key::Space) => self.user_toggle_pause(),
            InputEvent::Key(Key::Left) => self.user_jump(-self.config.seek_step_secs),
            InputEvent::Key(Key::Right) => self.user_jump(self.config.seek_step_secs),
            InputEvent::Key(Key::Other(_)) => {}
            InputEvent::PointerDown { x, y } => match self.layout.hit_test(x, y) {
                Some(ControlHit::Back) => self.user_jump(-self.config.seek_step_secs),
                Some(ControlHit::Forward) => self.user_jump(self.config.seek_step_secs),
                Some(ControlHit::SeekBar) if self.engine.state().has_duration() => {
                    self.scrub = Some(self.layout.bar_ratio(x));
                }
                Some(ControlHit::SeekBar) | None => {}
            },
            InputEvent::PointerMove { x, .. } => {
                if self.scrub.is_some() {
                    self.scrub = Some(self.layout.bar_ratio(x));
                }
            }
            InputEvent::PointerUp { x, .. } => {
                if self.scrub.take().is_some() {
                    let target = self.layout.bar_ratio(x) * self.engine.state().duration_secs();
                    self.user_seek(target);
                }
            }
            InputEvent::Resize { width, height } => {
                self.layout = ControlLayout::for_window(width, height);
                debug!("Player: window resized to {}x{}", width, height);
            }
        }
        TickResult::Continue
    }

    fn user_jump(&mut self, delta_secs: f64) {
        let target = self.engine.state().position_secs() + delta_secs;
        self.user_seek(target);
    }

    fn user_seek(&mut self, target_secs: f64) {
        self.stats.local_actions += 1;
        self.reconciler.note_local_action(current_time_ms());
        match self.engine.seek(target_secs) {
            Ok(outcome) => {
                debug!(
                    "Player: seek to {:.3}s landed at {:.3}s after {} steps",
                    outcome.target_secs, outcome.landed_secs, outcome.steps
                );
                self.announce_seek = true;
                self.broadcaster.mark_due();
            }
            Err(e) => warn!("Player: {}", e),
        }
    }

    fn user_toggle_pause(&mut self) {
        self.stats.local_actions += 1;
        self.reconciler.note_local_action(current_time_ms());
        let paused = self.engine.toggle_pause();
        info!("Player: {}", if paused { "paused" } else { "resumed" });
        self.broadcaster.mark_due();
    }

    fn apply_remote(&mut self, snapshot: &StatusSnapshot) {
        match self.reconciler.reconcile(snapshot, &mut self.engine, current_time_ms()) {
            ReconcileOutcome::Rejected(Rejection::ForeignItem) => self.stats.rejected_foreign += 1,
            ReconcileOutcome::Rejected(Rejection::Stale { .. }) => self.stats.rejected_stale += 1,
            ReconcileOutcome::Rejected(Rejection::LocalActionPending { .. }) => self.stats.rejected_pending += 1,
            ReconcileOutcome::Applied {
                seek, paused_changed, ..
            } => {
                self.stats.snapshots_applied += 1;
                match seek {
                    Some(Ok(_)) => self.stats.seeks_forced += 1,
                    Some(Err(_)) => self.stats.seeks_failed += 1,
                    None => {}
                }
                if paused_changed {
                    self.stats.pause_flips += 1;
                }
            }
        }
    }

    fn current_tag(&self) -> StateTag {
        if self.announce_seek {
            StateTag::Seeking
        } else {
            StateTag::from(self.engine.phase())
        }
    }

    /// Status line for the current state, stamped now
    fn encode_line(engine: &PlaybackEngine<D>, layout: &ControlLayout, state: StateTag) -> String {
        let info = engine.info();
        let ctx = StatusContext {
            label: &info.label,
            frame_rate: info.effective_frame_rate(),
            window: layout.window_size(),
            state,
            sent_at_epoch_ms: current_time_ms(),
        };
        status::encode_status(engine.state(), &ctx)
    }

    fn broadcast(&mut self, now: Instant) {
        let tag = self.current_tag();
        self.broadcaster.observe_tag(tag);

        let (engine, layout) = (&self.engine, &self.layout);
        let outcome = self
            .broadcaster
            .tick(now, self.link.as_ref(), || Self::encode_line(engine, layout, tag));
        if outcome != BroadcastOutcome::NotDue {
            self.announce_seek = false;
        }
    }

    fn present(&mut self) {
        let state = self.engine.state();
        let overlay = OverlayView {
            layout: self.layout,
            progress: self.scrub.unwrap_or_else(|| state.progress()),
            paused: state.is_paused(),
            scrubbing: self.scrub.is_some(),
        };
        self.renderer.present(self.engine.current_frame(), &overlay);
    }
}
