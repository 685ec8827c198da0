//! CSV output of scanned weapons.
//!
//! Rows are appended one at a time so a crash leaves the finished rows on disk.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use super::record::WeaponRecord;

const CSV_HEADER: &str = "id,name,level,ascended,refinement,equipped,rarity";

/// Writes the header unless the file already has content.
pub fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing CSV")?;
        if BufReader::new(file).lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create CSV file")?;
    writeln!(file, "{}", CSV_HEADER).context("Failed to write CSV header")?;
    Ok(())
}

/// Quotes a field if it contains a separator or quote.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Formats one record as a CSV line. Unknown values are empty cells.
pub fn format_record(record: &WeaponRecord) -> String {
    format!(
        "{},{},{},{},{},{},{}",
        record.id,
        escape(&optional(&record.name)),
        optional(&record.level),
        record.ascended,
        optional(&record.refinement),
        escape(&optional(&record.equipped_owner)),
        optional(&record.rarity),
    )
}

pub fn append_record(path: &Path, record: &WeaponRecord) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open CSV for append")?;

    writeln!(file, "{}", format_record(record)).context("Failed to write CSV row")?;
    Ok(())
}
