//! Control overlay geometry
//!
//! A fixed-height strip below the video holding a back button, a forward
//! button and a seek bar. Pure layout and hit testing; drawing is up to the
//! renderer.

use crate::status::WindowSize;

/// Height of the strip below the video
pub const CONTROL_STRIP_HEIGHT: u32 = 90;

const BUTTON_WIDTH: i32 = 80;
const BUTTON_HEIGHT: i32 = 42;
const BACK_BUTTON_X: i32 = 20;
const FORWARD_BUTTON_X: i32 = 120;
const BUTTON_TOP: i32 = 20;
const SEEK_BAR_X: i32 = 230;
const SEEK_BAR_TOP: i32 = 35;
const SEEK_BAR_HEIGHT: i32 = 12;
const SEEK_BAR_MIN_WIDTH: i32 = 60;
const SEEK_BAR_RIGHT_MARGIN: i32 = 30;

/// Axis-aligned rectangle, right and bottom edges exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Which control a pointer position falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlHit {
    Back,
    Forward,
    SeekBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLayout {
    video_width: u32,
    video_height: u32,
    back: Rect,
    forward: Rect,
    seek_bar: Rect,
}

impl ControlLayout {
    /// Layout for a video area of `video_width` x `video_height`
    pub fn new(video_width: u32, video_height: u32) -> Self {
        let top = i32::try_from(video_height)
            .unwrap_or(i32::MAX)
            .min(i32::MAX - CONTROL_STRIP_HEIGHT as i32);
        let width = i32::try_from(video_width).unwrap_or(i32::MAX);

        Self {
            video_width,
            video_height,
            back: Rect {
                x: BACK_BUTTON_X,
                y: top + BUTTON_TOP,
                width: BUTTON_WIDTH,
                height: BUTTON_HEIGHT,
            },
            forward: Rect {
                x: FORWARD_BUTTON_X,
                y: top + BUTTON_TOP,
                width: BUTTON_WIDTH,
                height: BUTTON_HEIGHT,
            },
            seek_bar: Rect {
                x: SEEK_BAR_X,
                y: top + SEEK_BAR_TOP,
                width: (width - SEEK_BAR_X - SEEK_BAR_RIGHT_MARGIN).max(SEEK_BAR_MIN_WIDTH),
                height: SEEK_BAR_HEIGHT,
            },
        }
    }

    /// Layout for a whole window, strip included
    pub fn for_window(window_width: u32, window_height: u32) -> Self {
        Self::new(window_width, window_height.saturating_sub(CONTROL_STRIP_HEIGHT))
    }

    pub fn back_button(&self) -> Rect {
        self.back
    }

    pub fn forward_button(&self) -> Rect {
        self.forward
    }

    pub fn seek_bar(&self) -> Rect {
        self.seek_bar
    }

    pub fn window_size(&self) -> WindowSize {
        WindowSize {
            width: self.video_width,
            height: self.video_height.saturating_add(CONTROL_STRIP_HEIGHT),
        }
    }

    pub fn hit_test(&self, x: i32, y: i32) -> Option<ControlHit> {
        if self.back.contains(x, y) {
            Some(ControlHit::Back)
        } else if self.forward.contains(x, y) {
            Some(ControlHit::Forward)
        } else if self.seek_bar.contains(x, y) {
            Some(ControlHit::SeekBar)
        } else {
            None
        }
    }

    /// Horizontal position along the seek bar as a ratio in `[0, 1]`.
    /// Positions left or right of the bar clamp to its ends (scrub drags).
    pub fn bar_ratio(&self, x: i32) -> f64 {
        let offset = f64::from(x) - f64::from(self.seek_bar.x);
        let width = f64::from(self.seek_bar.width.max(1));
        (offset / width).clamp(0.0, 1.0)
    }

    /// Width of the filled part of the bar for a `[0, 1]` progress value
    pub fn fill_width(&self, progress: f64) -> i32 {
        let progress = if progress.is_finite() { progress.clamp(0.0, 1.0) } else { 0.0 };
        (f64::from(self.seek_bar.width) * progress) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_for_640x360() {
        let layout = ControlLayout::new(640, 360);
        assert_eq!(layout.back_button(), Rect { x: 20, y: 380, width: 80, height: 42 });
        assert_eq!(layout.forward_button(), Rect { x: 120, y: 380, width: 80, height: 42 });
        assert_eq!(layout.seek_bar(), Rect { x: 230, y: 395, width: 380, height: 12 });
        assert_eq!(layout.window_size(), WindowSize { width: 640, height: 450 });
    }

    #[test]
    fn test_narrow_video_keeps_minimum_bar() {
        let layout = ControlLayout::new(160, 90);
        assert_eq!(layout.seek_bar().width, 60);
    }

    #[test]
    fn test_hit_test() {
        let layout = ControlLayout::new(640, 360);
        assert_eq!(layout.hit_test(20, 380), Some(ControlHit::Back));
        assert_eq!(layout.hit_test(99, 421), Some(ControlHit::Back));
        assert_eq!(layout.hit_test(100, 380), None);
        assert_eq!(layout.hit_test(150, 400), Some(ControlHit::Forward));
        assert_eq!(layout.hit_test(300, 400), Some(ControlHit::SeekBar));
        assert_eq!(layout.hit_test(300, 407), None);
        assert_eq!(layout.hit_test(300, 100), None);
    }

    #[test]
    fn test_bar_ratio_clamps() {
        let layout = ControlLayout::new(640, 360);
        assert_eq!(layout.bar_ratio(230), 0.0);
        assert_eq!(layout.bar_ratio(420), 0.5);
        assert_eq!(layout.bar_ratio(0), 0.0);
        assert_eq!(layout.bar_ratio(5000), 1.0);
    }

    #[test]
    fn test_bar_ratio_extreme_pointer_coordinates() {
        let layout = ControlLayout::new(640, 360);
        assert_eq!(layout.bar_ratio(i32::MIN), 0.0);
        assert_eq!(layout.bar_ratio(i32::MAX), 1.0);

        let wide = ControlLayout::new(u32::MAX, 360);
        assert_eq!(wide.bar_ratio(i32::MIN), 0.0);
        assert!(wide.bar_ratio(i32::MAX) > 0.99);
    }

    #[test]
    fn test_fill_width() {
        let layout = ControlLayout::new(640, 360);
        assert_eq!(layout.fill_width(0.25), 95);
        assert_eq!(layout.fill_width(3.0), 380);
        assert_eq!(layout.fill_width(f64::NAN), 0);
    }

    #[test]
    fn test_for_window_subtracts_strip() {
        let layout = ControlLayout::for_window(640, 450);
        assert_eq!(layout, ControlLayout::new(640, 360));
        assert_eq!(ControlLayout::for_window(640, 10).window_size().height, 90);
    }
}
