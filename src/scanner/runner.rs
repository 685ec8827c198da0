//! Scan runner: ties the orchestrator to the worker pool and session output.
//!
//! A session writes into `output/YYYYMMDD_HHMMSS/`: `weapons.csv` is appended
//! as records arrive, `weapons.json` and the final summary are written once
//! every worker has finished.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::config::ScannerConfig;
use super::csv_writer::init_csv;
use super::driver::ScreenDriver;
use super::export::{export_to_json, ScanExport};
use super::layout::ScanLayout;
use super::queue::create_work_queue;
use super::record::WeaponRecord;
use super::state::{ScanContext, ScanPhase, ScanState, StopFlag};
use super::worker::{join_workers, spawn_workers, ExtractionContext};
use crate::catalog::Catalogs;
use crate::ocr::TextRecognizer;

/// Set while a scan thread started by `start_scan` is alive.
static SCAN_RUNNING: AtomicBool = AtomicBool::new(false);

/// Items queued so far (for progress display).
static ITEMS_QUEUED: AtomicU32 = AtomicU32::new(0);

/// Queue target of the current scan (for progress display).
static ITEMS_TARGET: AtomicU32 = AtomicU32::new(0);

/// Current phase description (for progress display).
static CURRENT_PHASE_DESC: Mutex<String> = Mutex::new(String::new());

/// Current session folder path.
static CURRENT_SESSION_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Shared, read-only inputs of a scan.
#[derive(Clone)]
pub struct ScanResources {
    pub recognizer: Arc<dyn TextRecognizer>,
    pub catalogs: Arc<Catalogs>,
    pub config: ScannerConfig,
    /// Where failed detections and cards are dumped; `None` disables dumps
    pub diagnostics_dir: Option<PathBuf>,
}

/// Snapshot of scan progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    pub queued: u32,
    pub target: u32,
    pub phase: String,
}

/// Result of a finished session.
#[derive(Debug)]
pub struct ScanSummary {
    pub phase: ScanPhase,
    pub state: ScanState,
    pub records: Vec<WeaponRecord>,
    pub session_dir: PathBuf,
}

pub fn is_scan_running() -> bool {
    SCAN_RUNNING.load(Ordering::SeqCst)
}

pub fn get_progress() -> ScanProgress {
    ScanProgress {
        queued: ITEMS_QUEUED.load(Ordering::SeqCst),
        target: ITEMS_TARGET.load(Ordering::SeqCst),
        phase: CURRENT_PHASE_DESC
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| "Unknown".to_string()),
    }
}

fn update_progress(phase: &ScanPhase, state: &ScanState) {
    ITEMS_QUEUED.store(state.queued, Ordering::SeqCst);
    ITEMS_TARGET.store(state.target_count, Ordering::SeqCst);
    if let Ok(mut desc) = CURRENT_PHASE_DESC.lock() {
        *desc = phase.to_string();
    }
}

pub fn get_current_session_path() -> Option<PathBuf> {
    CURRENT_SESSION_PATH.lock().ok().and_then(|p| p.clone())
}

fn set_current_session_path(path: PathBuf) {
    if let Ok(mut p) = CURRENT_SESSION_PATH.lock() {
        *p = Some(path);
    }
}

/// Creates a timestamped session folder under the output directory.
pub fn create_session_dir() -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let session_dir = crate::paths::get_output_dir().join(timestamp);
    fs::create_dir_all(&session_dir).context("Failed to create session directory")?;
    Ok(session_dir)
}

/// Runs a whole scan session on the calling thread.
///
/// Records already extracted are written out even when the session fails;
/// the failure is then returned.
pub fn run_scan<D>(
    driver: &mut D,
    resources: &ScanResources,
    session_dir: &Path,
    stop: StopFlag,
) -> Result<ScanSummary>
where
    D: ScreenDriver + ?Sized,
{
    let csv_path = session_dir.join("weapons.csv");
    let json_path = session_dir.join("weapons.json");
    init_csv(&csv_path)?;

    crate::set_session_log(Some(session_dir.join("session.log")));
    set_current_session_path(session_dir.to_path_buf());
    crate::log(&format!("Session folder: {}", session_dir.display()));

    let (width, height) = driver.window_size();
    let extraction = ExtractionContext::new(
        Arc::clone(&resources.recognizer),
        Arc::clone(&resources.catalogs),
        ScanLayout::new(width, height),
        resources.config.clone(),
    )
    .with_csv(csv_path)
    .with_diagnostics_dir(resources.diagnostics_dir.clone());

    let (sender, receiver) = create_work_queue();
    let workers = spawn_workers(
        receiver,
        Arc::new(extraction),
        resources.config.worker_count,
    );

    let mut ctx = ScanContext::new(
        driver,
        resources.recognizer.as_ref(),
        &resources.config,
        sender,
        stop,
    );
    if let Some(dir) = &resources.diagnostics_dir {
        ctx = ctx.with_diagnostics_dir(dir.clone());
    }

    let outcome = loop {
        update_progress(&ctx.phase, &ctx.state);
        match ctx.step() {
            Ok(true) => {}
            Ok(false) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    update_progress(&ctx.phase, &ctx.state);

    let phase = ctx.phase.clone();
    let state = ctx.state.clone();
    // Dropping the context closes the queue so the workers can drain and exit
    drop(ctx);

    crate::log("Waiting for extraction workers to finish...");
    let records = join_workers(workers);

    let export = ScanExport {
        scanned_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        item_count: state.item_count,
        weapons: &records,
    };
    if let Err(e) = export_to_json(&export, &json_path) {
        crate::log(&format!("Failed to write {}: {:#}", json_path.display(), e));
    }

    crate::log(&format!(
        "Scan {}: {} queued, {} records written",
        phase,
        state.queued,
        records.len()
    ));
    crate::set_session_log(None);

    outcome.map(|()| ScanSummary {
        phase,
        state,
        records,
        session_dir: session_dir.to_path_buf(),
    })
}

/// Starts a scan on a background thread.
///
/// `connect` builds the driver on the scan thread (window handles stay on
/// the thread that uses them). `on_finish` runs after the session ends,
/// whatever the outcome.
pub fn start_scan<D, C, F>(
    connect: C,
    resources: ScanResources,
    stop: StopFlag,
    on_finish: F,
) -> Result<JoinHandle<Result<ScanSummary>>>
where
    D: ScreenDriver,
    C: FnOnce() -> Result<D> + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    if SCAN_RUNNING.swap(true, Ordering::SeqCst) {
        return Err(anyhow!("A scan is already running"));
    }

    let session_dir = match create_session_dir() {
        Ok(dir) => dir,
        Err(e) => {
            SCAN_RUNNING.store(false, Ordering::SeqCst);
            return Err(e);
        }
    };

    ITEMS_QUEUED.store(0, Ordering::SeqCst);
    ITEMS_TARGET.store(0, Ordering::SeqCst);

    let handle = thread::spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            connect().and_then(|mut driver| run_scan(&mut driver, &resources, &session_dir, stop))
        }))
        .unwrap_or_else(|_| Err(anyhow!("Scan thread panicked")));
        if let Err(e) = &result {
            crate::log(&format!("Scan error: {:#}", e));
        }
        SCAN_RUNNING.store(false, Ordering::SeqCst);
        crate::log("Scan thread finished");
        on_finish();
        result
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::scanner::driver::WaitProfile;
    use crate::scanner::fields::RARITY_COLORS;
    use image::{GrayImage, Rgba, RgbaImage};
    use tempfile::tempdir;

    /// A 1280x720 inventory of 7x5 slots; every card is a five-star "The Catch".
    struct Inventory {
        cursor: (i32, i32),
    }

    fn inventory_screenshot() -> RgbaImage {
        let mut screenshot = RgbaImage::from_pixel(1280, 720, Rgba([30, 32, 40, 255]));
        for row in 0..5u32 {
            for col in 0..7u32 {
                let left = 60 + col * 105;
                let top = 80 + row * 120;
                for y in top..top + 105 {
                    for x in left..left + 85 {
                        screenshot.put_pixel(x, y, Rgba([200, 180, 150, 255]));
                    }
                }
            }
        }
        screenshot
    }

    impl ScreenDriver for Inventory {
        fn window_size(&self) -> (u32, u32) {
            (1280, 720)
        }
        fn capture_window(&mut self) -> Result<RgbaImage> {
            Ok(inventory_screenshot())
        }
        fn capture_region(&mut self, region: Rect) -> Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(
                region.width as u32,
                region.height as u32,
                RARITY_COLORS[0].1,
            ))
        }
        fn set_cursor_pos(&mut self, x: i32, y: i32) -> Result<()> {
            self.cursor = (x, y);
            Ok(())
        }
        fn click(&mut self) -> Result<()> {
            Ok(())
        }
        fn scroll(&mut self, _delta: i32) -> Result<()> {
            Ok(())
        }
        fn random_wait(&mut self, _profile: WaitProfile) {}
    }

    struct CardText;

    impl TextRecognizer for CardText {
        fn recognize_text(&self, img: &GrayImage) -> Result<String> {
            Ok(match img.dimensions() {
                (327, 38) => "The Catch".to_string(),
                (88, 19) => "90/90".to_string(),
                (40, 38) => "5".to_string(),
                _ => String::new(),
            })
        }
    }

    fn resources(target_count: u32) -> ScanResources {
        ScanResources {
            recognizer: Arc::new(CardText),
            catalogs: Arc::new(
                Catalogs::from_json(r#"{"weapons": {"The Catch": "TheCatch"}}"#).unwrap(),
            ),
            config: ScannerConfig {
                target_count,
                ..ScannerConfig::default()
            },
            diagnostics_dir: None,
        }
    }

    #[test]
    fn test_run_scan_writes_session_output() {
        let dir = tempdir().unwrap();
        let mut driver = Inventory { cursor: (0, 0) };

        let summary = run_scan(&mut driver, &resources(5), dir.path(), StopFlag::new()).unwrap();

        assert_eq!(summary.phase, ScanPhase::Done);
        assert_eq!(summary.state.queued, 8);
        assert_eq!(summary.records.len(), 8);
        assert!(summary
            .records
            .iter()
            .all(|r| r.name.as_deref() == Some("TheCatch") && r.refinement == Some(5)));

        let csv = fs::read_to_string(dir.path().join("weapons.csv")).unwrap();
        assert_eq!(csv.lines().count(), 9);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("weapons.json")).unwrap())
                .unwrap();
        assert_eq!(json["item_count"], 5);
        assert_eq!(json["weapons"].as_array().unwrap().len(), 8);
        assert_eq!(json["weapons"][0]["id"], 1);
    }

    #[test]
    fn test_run_scan_reports_grid_failure() {
        struct Blank;
        impl ScreenDriver for Blank {
            fn window_size(&self) -> (u32, u32) {
                (640, 360)
            }
            fn capture_window(&mut self) -> Result<RgbaImage> {
                Ok(RgbaImage::new(640, 360))
            }
            fn capture_region(&mut self, region: Rect) -> Result<RgbaImage> {
                Ok(RgbaImage::new(region.width as u32, region.height as u32))
            }
            fn set_cursor_pos(&mut self, _x: i32, _y: i32) -> Result<()> {
                Ok(())
            }
            fn click(&mut self) -> Result<()> {
                Ok(())
            }
            fn scroll(&mut self, _delta: i32) -> Result<()> {
                Ok(())
            }
            fn random_wait(&mut self, _profile: WaitProfile) {}
        }

        let dir = tempdir().unwrap();
        let result = run_scan(&mut Blank, &resources(5), dir.path(), StopFlag::new());
        assert!(result.is_err());
        // Output files exist even though nothing was scanned
        assert!(dir.path().join("weapons.csv").exists());
        assert!(dir.path().join("weapons.json").exists());
    }
}
