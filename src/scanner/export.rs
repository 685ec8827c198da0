//! JSON export of a finished scan.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::record::WeaponRecord;

/// Everything written to `weapons.json`.
#[derive(Debug, Serialize)]
pub struct ScanExport<'a> {
    pub scanned_at: String,
    pub item_count: u32,
    pub weapons: &'a [WeaponRecord],
}

/// Writes the records as pretty-printed JSON.
pub fn export_to_json(export: &ScanExport<'_>, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(export).context("Failed to serialize weapons to JSON")?;

    let mut file = File::create(output_path)
        .context(format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_export_to_json() {
        let weapons = vec![WeaponRecord {
            id: 1,
            name: Some("TheCatch".to_string()),
            level: Some(50),
            ascended: true,
            refinement: Some(5),
            equipped_owner: None,
            rarity: Some(4),
        }];
        let export = ScanExport {
            scanned_at: "2024-01-01T00:00:00".to_string(),
            item_count: 120,
            weapons: &weapons,
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("weapons.json");
        export_to_json(&export, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"item_count\": 120"));
        assert!(content.contains("\"name\": \"TheCatch\""));
        assert!(content.contains("\"equipped_owner\": null"));

        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["weapons"][0]["level"], 50);
    }
}
