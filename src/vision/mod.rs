//! Image processing for locating item slots.
//!
//! - `preprocess`: stateless pixel filters shared with the OCR pipeline
//! - `blobs`: connected-component detection
//! - `grid`: slot lattice reconstruction

pub mod blobs;
pub mod grid;
pub mod preprocess;

pub use grid::{draw_overlay, infer_grid, infer_grid_from_blobs, Grid, GridError, GridParams};
