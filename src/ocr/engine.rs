use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;
use super::TextRecognizer;

/// Page segmentation mode 7: treat the image as a single text line.
const SINGLE_LINE: u8 = 7;

/// Text recognition through the Tesseract command line tool.
#[derive(Clone, Debug)]
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: PathBuf,
    language: String,
    page_segmentation: u8,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            language: "eng".to_string(),
            page_segmentation: SINGLE_LINE,
        }
    }

    pub fn with_page_segmentation(mut self, mode: u8) -> Self {
        self.page_segmentation = mode;
        self
    }

    fn command(&self, input: &std::path::Path) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg(input)
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_segmentation.to_string());
        command
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize_text(&self, img: &GrayImage) -> Result<String> {
        // Tesseract reads from disk, so every call gets its own temp file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let output = self
            .command(temp_input.path())
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
