//! Mouse input through `SendInput`.
//!
//! The game reads raw input, so window messages are ignored; events must be
//! injected at the hardware level and the window must be in the foreground.

use anyhow::{anyhow, Result};
use std::time::Duration;

use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN, WHEEL_DELTA};

const BUTTON_HOLD: Duration = Duration::from_millis(30);
const WHEEL_TICK_GAP: Duration = Duration::from_millis(10);

fn send_mouse(dx: i32, dy: i32, mouse_data: i32, flags: MOUSE_EVENT_FLAGS) -> Result<()> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: mouse_data as u32,
                dwFlags: flags,
                ..Default::default()
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent != 1 {
        return Err(anyhow!("SendInput rejected mouse event {:?}", flags));
    }
    Ok(())
}

/// Moves the cursor to an absolute screen position.
pub fn move_cursor(screen: POINT) -> Result<()> {
    let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) }.max(1);
    let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) }.max(1);

    // MOUSEEVENTF_ABSOLUTE expects 0-65535
    let norm_x = ((screen.x as i64 * 65535) / screen_width as i64) as i32;
    let norm_y = ((screen.y as i64 * 65535) / screen_height as i64) as i32;
    send_mouse(norm_x, norm_y, 0, MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE)
}

/// Left click at the current cursor position.
pub fn left_click() -> Result<()> {
    send_mouse(0, 0, 0, MOUSEEVENTF_LEFTDOWN)?;
    std::thread::sleep(BUTTON_HOLD);
    send_mouse(0, 0, 0, MOUSEEVENTF_LEFTUP)
}

/// Turns the wheel `ticks` notches, one event per notch; positive is up.
pub fn scroll_wheel(ticks: i32) -> Result<()> {
    let step = if ticks >= 0 { 1 } else { -1 };
    for _ in 0..ticks.unsigned_abs() {
        send_mouse(0, 0, step * WHEEL_DELTA as i32, MOUSEEVENTF_WHEEL)?;
        std::thread::sleep(WHEEL_TICK_GAP);
    }
    Ok(())
}
