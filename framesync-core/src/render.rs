//! Rendering surface collaborator
//!
//! The player hands each tick's frame and overlay to a `Renderer` and pulls
//! input events back from it. `HeadlessRenderer` draws nothing and is what the
//! peer binary runs with.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::controls::ControlLayout;
use crate::playback::FrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Left,
    Right,
    Escape,
    Other(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    Key(Key),
    PointerDown { x: i32, y: i32 },
    PointerUp { x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    Resize { width: u32, height: u32 },
}

/// What the control strip should show this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayView {
    pub layout: ControlLayout,
    /// Bar fill in `[0, 1]`; the scrub preview while dragging
    pub progress: f64,
    pub paused: bool,
    pub scrubbing: bool,
}

pub trait Renderer {
    /// Draw the current frame (if any has been decoded yet) and the overlay
    fn present(&mut self, frame: Option<&FrameBuffer>, overlay: &OverlayView);

    /// Drain the input events gathered since the last call
    fn poll_input(&mut self) -> Vec<InputEvent>;
}

/// Renderer with no window. Quits when its shared flag is raised.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    quit: Arc<AtomicBool>,
    presented: u64,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag that makes the next `poll_input` report `Quit`
    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        self.quit.clone()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Renderer for HeadlessRenderer {
    fn present(&mut self, frame: Option<&FrameBuffer>, overlay: &OverlayView) {
        self.presented += 1;
        trace!(
            "Headless: frame {} ({}), progress {:.3}",
            self.presented,
            frame.map_or("none".to_string(), |f| format!("{}x{}", f.width, f.height)),
            overlay.progress
        );
    }

    fn poll_input(&mut self) -> Vec<InputEvent> {
        if self.quit.load(Ordering::SeqCst) {
            vec![InputEvent::Quit]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_quits_on_flag() {
        let mut renderer = HeadlessRenderer::new();
        assert!(renderer.poll_input().is_empty());

        renderer.quit_handle().store(true, Ordering::SeqCst);
        assert_eq!(renderer.poll_input(), vec![InputEvent::Quit]);
    }

    #[test]
    fn test_headless_counts_presents() {
        let mut renderer = HeadlessRenderer::new();
        let overlay = OverlayView {
            layout: ControlLayout::new(16, 9),
            progress: 0.0,
            paused: false,
            scrubbing: false,
        };
        renderer.present(None, &overlay);
        renderer.present(None, &overlay);
        assert_eq!(renderer.presented(), 2);
    }
}
