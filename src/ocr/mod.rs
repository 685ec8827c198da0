pub mod engine;
pub mod setup;

pub use engine::TesseractEngine;
pub use setup::{ensure_tesseract, TesseractPaths};

use anyhow::Result;
use image::GrayImage;

/// Turns a preprocessed image into text.
///
/// Recognition is best effort: an empty or garbled string is a normal result,
/// an `Err` means the engine itself could not run.
pub trait TextRecognizer: Send + Sync {
    fn recognize_text(&self, img: &GrayImage) -> Result<String>;
}
