//! Inventory Scanner
//!
//! Usage:
//!   inventory-scanner                  scan the weapon inventory of the running game
//!   inventory-scanner <screenshot.png> run slot detection on a saved screenshot

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;

use inventory_scanner::catalog::Catalogs;
use inventory_scanner::ocr::{ensure_tesseract, TesseractEngine};
use inventory_scanner::scanner::{get_config, init_config, ScanResources, ScannerConfig};
use inventory_scanner::vision::{draw_overlay, infer_grid};
use inventory_scanner::{log, paths};

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        log(&format!("[PANIC]{} {}", location, msg));
    }));

    paths::ensure_directories()?;
    init_config();
    let config = get_config();

    match std::env::args().nth(1) {
        Some(screenshot) => analyze_screenshot(Path::new(&screenshot), config),
        None => run_live_scan(config),
    }
}

/// Runs grid inference on a saved screenshot and writes `<name>_grid.png`
/// next to it with the detected slots outlined.
fn analyze_screenshot(path: &Path, config: &ScannerConfig) -> Result<()> {
    let screenshot = image::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .to_rgba8();
    let (width, height) = screenshot.dimensions();
    log(&format!("Analyzing {} ({}x{})", path.display(), width, height));

    let grid = infer_grid(&screenshot, &config.grid_params(width, height))?;
    log(&format!(
        "{} columns x {} rows, {} slots",
        grid.columns,
        grid.rows,
        grid.rectangles.len()
    ));

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "screenshot".to_string());
    let overlay_path = path.with_file_name(format!("{}_grid.png", stem));
    draw_overlay(&screenshot, &grid)
        .save(&overlay_path)
        .with_context(|| format!("Failed to write {}", overlay_path.display()))?;
    log(&format!("Overlay written to {}", overlay_path.display()));
    Ok(())
}

/// Loads name catalogs and the OCR engine.
fn load_resources(config: &ScannerConfig) -> Result<ScanResources> {
    let catalog_path = paths::resolve_resource(&config.catalog_path);
    let catalogs = Catalogs::load(&catalog_path)?;
    log(&format!(
        "Catalogs loaded: {} weapons, {} characters, {} materials",
        catalogs.weapons.len(),
        catalogs.characters.len(),
        catalogs.materials.len()
    ));

    let tesseract = ensure_tesseract().context("Tesseract is required for scanning")?;

    Ok(ScanResources {
        recognizer: Arc::new(TesseractEngine::new(tesseract)),
        catalogs: Arc::new(catalogs),
        config: config.clone(),
        diagnostics_dir: config.save_diagnostics.then(paths::get_diagnostics_dir),
    })
}

#[cfg(windows)]
fn run_live_scan(config: &ScannerConfig) -> Result<()> {
    use inventory_scanner::capture::WindowsDriver;
    use inventory_scanner::scanner::runner::{get_current_session_path, get_progress, is_scan_running};
    use inventory_scanner::scanner::{start_scan, StopFlag};
    use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetMessageW, KillTimer, PostThreadMessageW, SetTimer, MSG, WM_HOTKEY, WM_QUIT, WM_TIMER,
    };

    const HOTKEY_STOP: i32 = 1;
    const PROGRESS_INTERVAL_MS: u32 = 2000;

    unsafe {
        windows::Win32::System::WinRT::RoInitialize(
            windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
        )?
    };

    let resources = load_resources(config)?;

    // Thread hotkey: WM_HOTKEY lands in this thread's queue
    unsafe {
        RegisterHotKey(
            HWND::default(),
            HOTKEY_STOP,
            MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT,
            'Q' as u32,
        )?;
    }
    log("Hotkey: Ctrl+Shift+Q (stop scan)");

    let stop = StopFlag::new();
    let main_thread = unsafe { GetCurrentThreadId() };
    let driver_config = config.clone();
    let handle = start_scan(
        move || WindowsDriver::attach(driver_config),
        resources,
        stop.clone(),
        move || unsafe {
            let _ = PostThreadMessageW(main_thread, WM_QUIT, WPARAM(0), LPARAM(0));
        },
    )?;

    let timer = unsafe { SetTimer(HWND::default(), 0, PROGRESS_INTERVAL_MS, None) };
    let mut last_progress = None;
    let mut msg = MSG::default();
    unsafe {
        while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
            match msg.message {
                WM_HOTKEY if msg.wParam.0 == HOTKEY_STOP as usize => {
                    log("Stop hotkey pressed");
                    stop.request();
                }
                WM_TIMER => {
                    if !is_scan_running() {
                        break;
                    }
                    let progress = get_progress();
                    if last_progress.as_ref() != Some(&progress) {
                        log(&format!(
                            "Progress: {}/{} ({})",
                            progress.queued, progress.target, progress.phase
                        ));
                        last_progress = Some(progress);
                    }
                }
                _ => {}
            }
        }
        let _ = KillTimer(HWND::default(), timer);
        let _ = UnregisterHotKey(HWND::default(), HOTKEY_STOP);
    }

    let summary = match handle.join().map_err(|_| anyhow!("Scan thread panicked"))? {
        Ok(summary) => summary,
        Err(e) => {
            if let Some(dir) = get_current_session_path() {
                log(&format!("Partial results kept in {}", dir.display()));
            }
            return Err(e);
        }
    };
    log(&format!(
        "{}: {} weapons saved to {}",
        summary.phase,
        summary.records.len(),
        summary.session_dir.display()
    ));
    Ok(())
}

#[cfg(not(windows))]
fn run_live_scan(config: &ScannerConfig) -> Result<()> {
    // Validate resources so configuration problems surface on any platform
    load_resources(config)?;
    Err(anyhow!(
        "Live scanning needs the Windows game client; pass a screenshot path to analyze it offline"
    ))
}
