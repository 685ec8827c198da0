//! Window discovery for the game client.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowRect, GetWindowTextLengthW, GetWindowThreadProcessId,
    IsWindow, IsWindowVisible,
};

/// Executable names of the game client (global and CN releases), compared case-insensitively.
const GAME_PROCESS_NAMES: [&str; 2] = ["genshinimpact.exe", "yuanshen.exe"];

/// Returns the lowercase file name of the process owning `hwnd`.
unsafe fn process_name_of(hwnd: HWND) -> Option<String> {
    unsafe {
        let mut process_id: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        if process_id == 0 {
            return None;
        }

        let process_handle =
            OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;
        let mut name_buf: Vec<u16> = vec![0; 1024];
        let mut len = name_buf.len() as u32;
        let result = QueryFullProcessImageNameW(
            process_handle,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(name_buf.as_mut_ptr()),
            &mut len,
        );
        let _ = windows::Win32::Foundation::CloseHandle(process_handle);
        if result.is_err() || len == 0 {
            return None;
        }

        let full_path = OsString::from_wide(&name_buf[..len as usize])
            .to_string_lossy()
            .to_string();
        full_path
            .rsplit('\\')
            .next()
            .map(|name| name.to_lowercase())
    }
}

/// Finds the visible, titled main window of the game client.
pub fn find_game_window() -> Result<HWND> {
    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let found = &mut *(lparam.0 as *mut Option<(HWND, String)>);

            if !IsWindowVisible(hwnd).as_bool() || GetWindowTextLengthW(hwnd) == 0 {
                return TRUE;
            }

            match process_name_of(hwnd) {
                Some(name) if GAME_PROCESS_NAMES.contains(&name.as_str()) => {
                    *found = Some((hwnd, name));
                    BOOL(0)
                }
                _ => TRUE,
            }
        }
    }

    crate::log("Searching for game window...");
    let mut found: Option<(HWND, String)> = None;
    unsafe {
        // EnumWindows reports FALSE when the callback stops early
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut found as *mut _ as isize));
    }

    let (hwnd, name) =
        found.ok_or_else(|| anyhow!("Could not find the game window. Is the game running?"))?;
    crate::log(&format!("Found {} window {:?}", name, hwnd));
    Ok(hwnd)
}

pub fn is_window_valid(hwnd: HWND) -> bool {
    unsafe { IsWindow(hwnd).as_bool() }
}

/// Client area size in pixels.
pub fn client_size(hwnd: HWND) -> Result<(u32, u32)> {
    let mut client_rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut client_rect)? };
    let width = (client_rect.right - client_rect.left).max(0) as u32;
    let height = (client_rect.bottom - client_rect.top).max(0) as u32;
    Ok((width, height))
}

/// Translates a client-area position to screen coordinates.
pub fn client_to_screen(hwnd: HWND, x: i32, y: i32) -> Result<POINT> {
    let mut point = POINT { x, y };
    unsafe {
        if !ClientToScreen(hwnd, &mut point).as_bool() {
            return Err(anyhow!("ClientToScreen failed"));
        }
    }
    Ok(point)
}

/// Offset of the client area's top-left corner from the full window's
/// top-left corner. Window captures include the frame; this crops it away.
pub fn client_offset(hwnd: HWND) -> Result<POINT> {
    let origin = client_to_screen(hwnd, 0, 0)?;
    let mut window_rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut window_rect)? };
    Ok(POINT {
        x: origin.x - window_rect.left,
        y: origin.y - window_rect.top,
    })
}
