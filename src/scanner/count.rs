//! Reads the "items / capacity" counter in the inventory header.

use anyhow::Result;
use image::RgbaImage;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::card::crop;
use super::diagnostics::save_image;
use super::driver::ScreenDriver;
use super::layout::ScanLayout;
use crate::ocr::TextRecognizer;
use crate::vision::preprocess::{boost_contrast, invert, to_grayscale};

const COUNT_CONTRAST: f32 = 60.0;
/// Inventory capacity printed after the count; OCR sometimes drops the slash.
const CAPACITY_SUFFIX: &str = "2000";

static NOT_COUNT_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9/]").expect("valid regex"));

/// Parses counter text such as "123/2000". Returns `None` when the count
/// can't be isolated.
pub fn parse_item_count(text: &str) -> Option<u32> {
    let cleaned = NOT_COUNT_CHAR.replace_all(text, "");
    if let Some((count, _)) = cleaned.split_once('/') {
        return count.parse().ok();
    }
    if cleaned.matches(CAPACITY_SUFFIX).count() == 1 {
        return cleaned.replacen(CAPACITY_SUFFIX, "", 1).parse().ok();
    }
    None
}

fn prepare(label: &RgbaImage) -> image::GrayImage {
    invert(boost_contrast(&to_grayscale(label), COUNT_CONTRAST))
}

/// Captures and reads the item counter. Unreadable text degrades to
/// `fallback` (the inventory capacity) instead of failing the scan.
pub fn read_item_count<D>(
    driver: &mut D,
    layout: &ScanLayout,
    recognizer: &dyn TextRecognizer,
    fallback: u32,
    diagnostics: Option<&Path>,
) -> Result<u32>
where
    D: ScreenDriver + ?Sized,
{
    let window = driver.capture_window()?;
    let label = crop(&window, &layout.count_region);
    let text = recognizer.recognize_text(&prepare(&label))?;

    if let Some(count) = parse_item_count(&text) {
        crate::log(&format!("Inventory count: {}", count));
        return Ok(count);
    }

    crate::log(&format!(
        "Could not read item count from {:?}, assuming {}",
        text.trim(),
        fallback
    ));
    save_image(diagnostics, "count_label.png", &label);
    save_image(diagnostics, "count_window.png", &window);
    Ok(fallback)
}
