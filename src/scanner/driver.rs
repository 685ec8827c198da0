//! Boundary to the screen: pixel capture and input injection.
//!
//! All coordinates are window-relative; implementations translate them to
//! absolute screen positions.

use anyhow::Result;
use image::RgbaImage;
use rand::Rng;
use std::time::Duration;

use super::config::{ScannerConfig, WaitRange};
use super::layout::AspectRatio;
use crate::geometry::Rect;

/// Pacing profiles for waits between actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitProfile {
    /// After clicking an inventory slot, until the card panel updates
    SelectNextItem,
    /// After scrolling
    Fast,
    Normal,
}

impl WaitProfile {
    pub fn range(self, config: &ScannerConfig) -> WaitRange {
        match self {
            WaitProfile::SelectNextItem => config.select_item_wait_ms,
            WaitProfile::Fast => config.fast_wait_ms,
            WaitProfile::Normal => config.normal_wait_ms,
        }
    }
}

/// Picks a random duration inside `range`.
pub fn jittered(range: WaitRange) -> Duration {
    let (low, high) = if range.min <= range.max {
        (range.min, range.max)
    } else {
        (range.max, range.min)
    };
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

/// Capture and input service for the game window.
pub trait ScreenDriver {
    /// Client area size in pixels.
    fn window_size(&self) -> (u32, u32);

    fn aspect_ratio(&self) -> AspectRatio {
        let (width, height) = self.window_size();
        AspectRatio::from_size(width, height)
    }

    fn capture_window(&mut self) -> Result<RgbaImage>;

    fn capture_region(&mut self, region: Rect) -> Result<RgbaImage>;

    fn set_cursor_pos(&mut self, x: i32, y: i32) -> Result<()>;

    fn click(&mut self) -> Result<()>;

    /// Scrolls the mouse wheel; positive is up, negative is down, in ticks.
    fn scroll(&mut self, delta: i32) -> Result<()>;

    /// Sleeps for a randomized interval of the given profile.
    fn random_wait(&mut self, profile: WaitProfile);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jittered_stays_in_range() {
        for _ in 0..50 {
            let wait = jittered(WaitRange::new(10, 20));
            assert!(wait >= Duration::from_millis(10));
            assert!(wait <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_jittered_accepts_swapped_bounds() {
        let wait = jittered(WaitRange::new(30, 30));
        assert_eq!(wait, Duration::from_millis(30));
        let wait = jittered(WaitRange::new(40, 35));
        assert!(wait >= Duration::from_millis(35) && wait <= Duration::from_millis(40));
    }

    #[test]
    fn test_profile_ranges_come_from_config() {
        let config = ScannerConfig::default();
        assert_eq!(WaitProfile::Fast.range(&config), config.fast_wait_ms);
        assert_eq!(
            WaitProfile::SelectNextItem.range(&config),
            config.select_item_wait_ms
        );
    }
}
