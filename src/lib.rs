//! Inventory Scanner
//!
//! Pages through an on-screen grid inventory, clicking each item slot and
//! reading the item card that appears into a structured record.
//!
//! - `vision`: image filters, blob detection and grid inference
//! - `ocr`: text recognition backed by Tesseract
//! - `catalog`: fuzzy lookup of recognized names
//! - `scanner`: card extraction, field pipeline, scan state machine and workers
//! - `capture`: Windows screen capture and input injection

pub mod catalog;
#[cfg(windows)]
pub mod capture;
pub mod geometry;
pub mod ocr;
pub mod paths;
pub mod scanner;
pub mod vision;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Extra log file for the currently running scan session, if any.
static SESSION_LOG: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Logs a message to console, the main log file and the session log (if active).
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);

    append_line(&paths::get_logs_dir().join("inventory_scanner.log"), &line);

    if let Ok(session) = SESSION_LOG.lock() {
        if let Some(path) = session.as_ref() {
            append_line(path, &line);
        }
    }
}

/// Activates (or with `None`, deactivates) mirroring of log lines into a session file.
pub fn set_session_log(path: Option<PathBuf>) {
    if let Ok(mut session) = SESSION_LOG.lock() {
        *session = path;
    }
}

fn append_line(path: &Path, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = file.write_all(line.as_bytes());
    }
}
