//! Configuration types for scanning.
//!
//! Loads settings from config.json at startup. Provides the rarity threshold,
//! target counts, detection tolerances and input pacing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::vision::GridParams;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<ScannerConfig> = OnceLock::new();

/// Inclusive range of a randomized wait in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitRange {
    pub min: u64,
    pub max: u64,
}

impl WaitRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

/// Complete scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Stop scanning at the first item below this rarity (1-5)
    #[serde(default = "default_min_rarity")]
    pub min_rarity: u8,
    /// Number of items to scan; 0 reads the count from the inventory header
    #[serde(default)]
    pub target_count: u32,
    /// Extra items added to the target for non-weapon entries in the same list
    #[serde(default = "default_count_inflation")]
    pub count_inflation: u32,
    /// Inventory capacity, used when the count label can't be read
    #[serde(default = "default_max_inventory")]
    pub max_inventory: u32,
    /// Minimum detected slots for a page to be trusted
    #[serde(default = "default_min_blobs")]
    pub min_blobs: usize,
    /// Pixel tolerance for slot centers on the same column/row
    #[serde(default = "default_cluster_tolerance")]
    pub cluster_tolerance: i32,
    /// Intersection width (fraction of own width) treated as a duplicate slot
    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: f32,
    /// Accepted slot size deviation in pixels
    #[serde(default = "default_blob_size_tolerance")]
    pub blob_size_tolerance: i32,
    /// Per-channel tolerance for rarity/equipped color checks
    #[serde(default = "default_color_tolerance")]
    pub color_tolerance: u8,
    /// Number of extraction worker threads
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_weapon_match_distance")]
    pub weapon_match_distance: usize,
    #[serde(default = "default_character_match_distance")]
    pub character_match_distance: usize,
    #[serde(default = "default_material_match_distance")]
    pub material_match_distance: usize,
    /// Mouse wheel ticks that scroll the inventory by one row
    #[serde(default = "default_ticks_per_row")]
    pub ticks_per_row: u32,
    /// Scroll back one tick every this many rows to counter scroll drift
    #[serde(default = "default_drift_interval_rows")]
    pub drift_interval_rows: usize,
    /// Wait after clicking an item before capturing its card
    #[serde(default = "default_select_item_wait")]
    pub select_item_wait_ms: WaitRange,
    /// Wait after scrolling
    #[serde(default = "default_fast_wait")]
    pub fast_wait_ms: WaitRange,
    #[serde(default = "default_normal_wait")]
    pub normal_wait_ms: WaitRange,
    /// Name catalog file, relative to the executable directory
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    /// Save screenshots when detection or extraction fails
    #[serde(default = "default_save_diagnostics")]
    pub save_diagnostics: bool,
}

fn default_min_rarity() -> u8 {
    3
}

fn default_count_inflation() -> u32 {
    3
}

fn default_max_inventory() -> u32 {
    2000
}

fn default_min_blobs() -> usize {
    7
}

fn default_cluster_tolerance() -> i32 {
    10
}

fn default_overlap_ratio() -> f32 {
    0.2
}

fn default_blob_size_tolerance() -> i32 {
    10
}

fn default_color_tolerance() -> u8 {
    10
}

fn default_worker_count() -> usize {
    2
}

fn default_weapon_match_distance() -> usize {
    5
}

fn default_character_match_distance() -> usize {
    3
}

fn default_material_match_distance() -> usize {
    3
}

fn default_ticks_per_row() -> u32 {
    10
}

fn default_drift_interval_rows() -> usize {
    15
}

fn default_select_item_wait() -> WaitRange {
    WaitRange::new(80, 150)
}

fn default_fast_wait() -> WaitRange {
    WaitRange::new(50, 100)
}

fn default_normal_wait() -> WaitRange {
    WaitRange::new(150, 250)
}

fn default_catalog_path() -> String {
    "resources/catalogs.json".to_string()
}

fn default_save_diagnostics() -> bool {
    true
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_rarity: default_min_rarity(),
            target_count: 0,
            count_inflation: default_count_inflation(),
            max_inventory: default_max_inventory(),
            min_blobs: default_min_blobs(),
            cluster_tolerance: default_cluster_tolerance(),
            overlap_ratio: default_overlap_ratio(),
            blob_size_tolerance: default_blob_size_tolerance(),
            color_tolerance: default_color_tolerance(),
            worker_count: default_worker_count(),
            weapon_match_distance: default_weapon_match_distance(),
            character_match_distance: default_character_match_distance(),
            material_match_distance: default_material_match_distance(),
            ticks_per_row: default_ticks_per_row(),
            drift_interval_rows: default_drift_interval_rows(),
            select_item_wait_ms: default_select_item_wait(),
            fast_wait_ms: default_fast_wait(),
            normal_wait_ms: default_normal_wait(),
            catalog_path: default_catalog_path(),
            save_diagnostics: default_save_diagnostics(),
        }
    }
}

impl ScannerConfig {
    /// Grid inference parameters for a window of the given size.
    pub fn grid_params(&self, window_width: u32, window_height: u32) -> GridParams {
        GridParams {
            size_tolerance: self.blob_size_tolerance,
            min_blobs: self.min_blobs,
            cluster_tolerance: self.cluster_tolerance,
            overlap_ratio: self.overlap_ratio,
            ..GridParams::for_window(window_width, window_height)
        }
    }
}

/// Reads a config file, falling back to defaults (with a logged reason) when
/// the file is missing or invalid.
pub fn load_config_from(config_path: &Path) -> ScannerConfig {
    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    ScannerConfig::default()
}

/// Initializes the global configuration from config.json next to the
/// executable. Call once at startup.
pub fn init_config() {
    let config_path = crate::paths::get_exe_dir().join("config.json");
    let _ = CONFIG.set(load_config_from(&config_path));
}

/// Returns the global configuration, or defaults if `init_config()` was never called.
pub fn get_config() -> &'static ScannerConfig {
    CONFIG.get_or_init(ScannerConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{"min_rarity": 4, "target_count": 120}"#).unwrap();
        assert_eq!(config.min_rarity, 4);
        assert_eq!(config.target_count, 120);
        assert_eq!(config.count_inflation, 3);
        assert_eq!(config.select_item_wait_ms, WaitRange::new(80, 150));
        assert!(config.save_diagnostics);
    }

    #[test]
    fn test_load_config_invalid_json_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let config = load_config_from(&path);
        assert_eq!(config.min_rarity, 3);
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.json"));
        assert_eq!(config.max_inventory, 2000);
    }

    #[test]
    fn test_grid_params_follow_config() {
        let config = ScannerConfig {
            min_blobs: 9,
            cluster_tolerance: 12,
            ..ScannerConfig::default()
        };
        let params = config.grid_params(1280, 720);
        assert_eq!(params.card_width, 85);
        assert_eq!(params.card_height, 105);
        assert_eq!(params.min_blobs, 9);
        assert_eq!(params.cluster_tolerance, 12);
    }
}
