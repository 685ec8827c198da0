//! Inventory scanning.
//!
//! The orchestrator (`state`) drives a `ScreenDriver` through the inventory,
//! cutting each item card into a `CardImageSet` (`card`) and queueing it.
//! Workers (`worker`) run the field pipeline (`fields`) on queued cards and
//! write records through `csv_writer` and `export`. `runner` wires a whole
//! session together.

pub mod card;
pub mod config;
pub mod count;
pub mod csv_writer;
pub mod diagnostics;
pub mod driver;
pub mod export;
pub mod fields;
pub mod layout;
pub mod pagination;
pub mod queue;
pub mod record;
pub mod runner;
pub mod state;
pub mod worker;

pub use config::{get_config, init_config, ScannerConfig};
pub use driver::{ScreenDriver, WaitProfile};
pub use record::WeaponRecord;
pub use runner::{run_scan, start_scan, ScanResources, ScanSummary};
pub use state::{ScanContext, ScanPhase, StopFlag};
