//! Extraction worker pool.
//!
//! Workers take jobs from the shared queue until it closes, turn each card
//! into a record and append it to the session CSV. A card that fails is
//! logged and dropped; it never takes down the worker.

use anyhow::{anyhow, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::config::ScannerConfig;
use super::csv_writer::append_record;
use super::diagnostics::save_image;
use super::fields::{extract_fields, scan_material_name, FieldContext};
use super::layout::ScanLayout;
use super::queue::{next_job, ScanJob, SharedReceiver};
use super::record::WeaponRecord;
use crate::catalog::Catalogs;
use crate::ocr::TextRecognizer;

/// Everything a worker needs, shared across the pool.
pub struct ExtractionContext {
    pub recognizer: Arc<dyn TextRecognizer>,
    pub catalogs: Arc<Catalogs>,
    pub layout: ScanLayout,
    pub config: ScannerConfig,
    pub csv_path: Option<PathBuf>,
    pub diagnostics_dir: Option<PathBuf>,
    csv_lock: Mutex<()>,
}

impl ExtractionContext {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        catalogs: Arc<Catalogs>,
        layout: ScanLayout,
        config: ScannerConfig,
    ) -> Self {
        Self {
            recognizer,
            catalogs,
            layout,
            config,
            csv_path: None,
            diagnostics_dir: None,
            csv_lock: Mutex::new(()),
        }
    }

    pub fn with_csv(mut self, path: PathBuf) -> Self {
        self.csv_path = Some(path);
        self
    }

    pub fn with_diagnostics_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.diagnostics_dir = dir;
        self
    }

    fn field_context(&self) -> FieldContext<'_> {
        FieldContext {
            recognizer: self.recognizer.as_ref(),
            catalogs: &self.catalogs,
            layout: &self.layout,
            config: &self.config,
        }
    }

    fn write_row(&self, record: &WeaponRecord) {
        let Some(path) = &self.csv_path else {
            return;
        };
        let _guard = self.csv_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = append_record(path, record) {
            crate::log(&format!("Failed to write CSV row for item {}: {}", record.id, e));
        }
    }
}

/// Extracts one job. `Ok(None)` means the card was an enhancement material
/// mixed into the weapon list.
pub fn process_job(job: &ScanJob, ctx: &ExtractionContext) -> Result<Option<WeaponRecord>> {
    let record = extract_fields(&job.images, job.id, &ctx.field_context())?;

    if record.name.is_none() {
        let material = scan_material_name(
            &job.images.name,
            ctx.recognizer.as_ref(),
            &ctx.catalogs.materials,
            ctx.config.material_match_distance,
        )?;
        if let Some(material) = material {
            crate::log(&format!("Item {} is {}, skipping", job.id, material));
            return Ok(None);
        }
    }
    Ok(Some(record))
}

/// Runs `process_job`, turning a panic into an error.
fn process_job_guarded(job: &ScanJob, ctx: &ExtractionContext) -> Result<Option<WeaponRecord>> {
    catch_unwind(AssertUnwindSafe(|| process_job(job, ctx)))
        .map_err(|_| anyhow!("extraction panicked"))?
}

/// Worker loop; returns the records it produced once the queue is closed.
pub fn run_extraction_worker(
    index: usize,
    receiver: SharedReceiver,
    ctx: Arc<ExtractionContext>,
) -> Vec<WeaponRecord> {
    crate::log(&format!("Extraction worker {} started", index));
    let mut records = Vec::new();

    while let Some(job) = next_job(&receiver) {
        match process_job_guarded(&job, &ctx) {
            Ok(Some(record)) => {
                crate::log(&format!(
                    "Item {}: {} lv {} r{} {} ({}*)",
                    record.id,
                    record.name.as_deref().unwrap_or("?"),
                    record.level.map_or("?".to_string(), |l| l.to_string()),
                    record.refinement.map_or("?".to_string(), |r| r.to_string()),
                    record.equipped_owner.as_deref().unwrap_or("-"),
                    record.rarity.map_or("?".to_string(), |r| r.to_string()),
                ));
                ctx.write_row(&record);
                records.push(record);
            }
            Ok(None) => {}
            Err(e) => {
                crate::log(&format!("Failed to extract item {}: {:#}", job.id, e));
                save_image(
                    ctx.diagnostics_dir.as_deref(),
                    &format!("weapon{}.png", job.id),
                    &job.images.card,
                );
            }
        }
    }

    crate::log(&format!(
        "Extraction worker {} finished ({} records)",
        index,
        records.len()
    ));
    records
}

/// Starts `count` workers (at least one) on the shared queue.
pub fn spawn_workers(
    receiver: SharedReceiver,
    ctx: Arc<ExtractionContext>,
    count: usize,
) -> Vec<JoinHandle<Vec<WeaponRecord>>> {
    (0..count.max(1))
        .map(|index| {
            let receiver = Arc::clone(&receiver);
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || run_extraction_worker(index, receiver, ctx))
        })
        .collect()
}

/// Waits for every worker and returns all records ordered by id.
pub fn join_workers(handles: Vec<JoinHandle<Vec<WeaponRecord>>>) -> Vec<WeaponRecord> {
    let mut records = Vec::new();
    for handle in handles {
        match handle.join() {
            Ok(mut produced) => records.append(&mut produced),
            Err(e) => crate::log(&format!("Extraction worker panicked: {:?}", e)),
        }
    }
    records.sort_by_key(|r| r.id);
    records
}
