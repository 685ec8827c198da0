//! Work queue between the scan orchestrator and the extraction workers.
//!
//! The orchestrator is the only producer. Workers share the receiving end,
//! so each job is taken by exactly one of them.

use chrono::{DateTime, Local};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::card::CardImageSet;

/// One captured card waiting for field extraction.
#[derive(Debug, Clone)]
pub struct ScanJob {
    /// Scan-order id (1-based)
    pub id: u32,
    pub images: CardImageSet,
    pub captured_at: DateTime<Local>,
}

impl ScanJob {
    pub fn new(id: u32, images: CardImageSet) -> Self {
        Self {
            id,
            images,
            captured_at: Local::now(),
        }
    }
}

/// Receiving end shared by the worker pool.
pub type SharedReceiver = Arc<Mutex<Receiver<ScanJob>>>;

/// Creates a new unbounded work queue. Jobs pile up if extraction is slower
/// than capture; dropping the sender lets workers drain and exit.
pub fn create_work_queue() -> (Sender<ScanJob>, SharedReceiver) {
    let (sender, receiver) = channel();
    (sender, Arc::new(Mutex::new(receiver)))
}

/// Takes the next job, or `None` once the queue is closed and empty.
pub fn next_job(receiver: &SharedReceiver) -> Option<ScanJob> {
    // A poisoned lock only means another worker panicked mid-recv
    let guard = receiver.lock().unwrap_or_else(|e| e.into_inner());
    guard.recv().ok()
}
