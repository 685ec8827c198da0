//! `ScreenDriver` for the live game window.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::time::Duration;

use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::SetForegroundWindow;

use super::input::{left_click, move_cursor, scroll_wheel};
use super::screenshot::WindowCapturer;
use super::window::{client_size, client_to_screen, find_game_window, is_window_valid};
use crate::geometry::Rect;
use crate::scanner::card::crop;
use crate::scanner::config::ScannerConfig;
use crate::scanner::driver::{jittered, ScreenDriver, WaitProfile};

const FOCUS_SETTLE: Duration = Duration::from_millis(200);

pub struct WindowsDriver {
    hwnd: HWND,
    width: u32,
    height: u32,
    capturer: WindowCapturer,
    config: ScannerConfig,
}

impl WindowsDriver {
    /// Finds the game window, brings it to the foreground and prepares capture.
    pub fn attach(config: ScannerConfig) -> Result<Self> {
        let hwnd = find_game_window()?;
        let (width, height) = client_size(hwnd)?;
        if width == 0 || height == 0 {
            return Err(anyhow!("Game window is minimized"));
        }

        unsafe {
            let _ = SetForegroundWindow(hwnd);
        }
        std::thread::sleep(FOCUS_SETTLE);

        crate::log(&format!("Attached to game window: {}x{}", width, height));
        Ok(Self {
            hwnd,
            width,
            height,
            capturer: WindowCapturer::new(hwnd)?,
            config,
        })
    }

    fn ensure_window(&self) -> Result<()> {
        if !is_window_valid(self.hwnd) {
            return Err(anyhow!("Game window closed"));
        }
        Ok(())
    }
}

impl ScreenDriver for WindowsDriver {
    fn window_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn capture_window(&mut self) -> Result<RgbaImage> {
        self.ensure_window()?;
        self.capturer.grab()
    }

    fn capture_region(&mut self, region: Rect) -> Result<RgbaImage> {
        let window = self.capture_window()?;
        Ok(crop(&window, &region))
    }

    fn set_cursor_pos(&mut self, x: i32, y: i32) -> Result<()> {
        self.ensure_window()?;
        move_cursor(client_to_screen(self.hwnd, x, y)?)
    }

    fn click(&mut self) -> Result<()> {
        left_click()
    }

    fn scroll(&mut self, delta: i32) -> Result<()> {
        scroll_wheel(delta)
    }

    fn random_wait(&mut self, profile: WaitProfile) {
        std::thread::sleep(jittered(profile.range(&self.config)));
    }
}
