//! Diagnostic image dumps. Failures to write are logged, never propagated.

use image::RgbaImage;
use std::path::Path;

/// Saves `img` as `<dir>/<name>` when a diagnostics directory is configured.
pub fn save_image(dir: Option<&Path>, name: &str, img: &RgbaImage) {
    let Some(dir) = dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(dir) {
        crate::log(&format!("Failed to create diagnostics dir {}: {}", dir.display(), e));
        return;
    }
    let path = dir.join(name);
    match img.save(&path) {
        Ok(()) => crate::log(&format!("Saved diagnostic image {}", path.display())),
        Err(e) => crate::log(&format!("Failed to save {}: {}", path.display(), e)),
    }
}
