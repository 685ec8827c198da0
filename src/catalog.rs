//! Fuzzy lookup of OCR output against known names.
//!
//! Catalog entries are keyed by their normalized form (lowercase,
//! alphanumerics only) so recognized text can be compared directly.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\W_]").expect("valid regex"));

/// Lowercases `text` and strips everything except letters and digits.
pub fn normalize_name(text: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&text.to_lowercase(), "")
        .to_string()
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}

/// A set of names, each stored as (normalized key, output name).
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Vec<(String, String)>,
}

impl Catalog {
    /// Builds a catalog from (display name, output name) pairs.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (normalize_name(k.as_ref()), v.into()))
                .filter(|(k, _)| !k.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the output name whose key is nearest to `candidate`, if it is
    /// within `max_distance` edits. Ties keep the first entry.
    pub fn closest_match(&self, candidate: &str, max_distance: usize) -> Option<String> {
        let candidate = normalize_name(candidate);
        if candidate.is_empty() {
            return None;
        }

        if let Some((_, name)) = self.entries.iter().find(|(key, _)| *key == candidate) {
            return Some(name.clone());
        }

        self.entries
            .iter()
            .map(|(key, name)| (edit_distance(&candidate, key), name))
            .filter(|(distance, _)| *distance <= max_distance)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, name)| name.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    weapons: BTreeMap<String, String>,
    #[serde(default)]
    characters: BTreeMap<String, String>,
    #[serde(default)]
    materials: Vec<String>,
}

/// All name catalogs used while scanning.
#[derive(Clone, Debug, Default)]
pub struct Catalogs {
    pub weapons: Catalog,
    pub characters: Catalog,
    pub materials: Catalog,
}

impl Catalogs {
    /// Loads catalogs from a JSON file of the form
    /// `{"weapons": {"Display Name": "Key"}, "characters": {...}, "materials": ["..."]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self {
            weapons: Catalog::new(file.weapons),
            characters: Catalog::new(file.characters),
            materials: Catalog::new(file.materials.iter().map(|m| (m.as_str(), m.as_str()))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "weapons": {"Skyward Harp": "SkywardHarp", "The Catch": "TheCatch"},
        "characters": {"Lisa": "Lisa", "Kamisato Ayaka": "KamisatoAyaka"},
        "materials": ["Mystic Enhancement Ore", "Fine Enhancement Ore"]
    }"#;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Skyward Harp!\n"), "skywardharp");
        assert_eq!(normalize_name("The_Catch"), "thecatch");
        assert_eq!(normalize_name("---"), "");
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("lisa", "lisa"), 0);
    }

    #[test]
    fn test_closest_match_exact_and_fuzzy() {
        let catalogs = Catalogs::from_json(SAMPLE).unwrap();
        assert_eq!(
            catalogs.weapons.closest_match("skywardharp", 5),
            Some("SkywardHarp".to_string())
        );
        assert_eq!(
            catalogs.weapons.closest_match("skyvvardhap", 5),
            Some("SkywardHarp".to_string())
        );
        assert_eq!(catalogs.characters.closest_match("lisa", 3), Some("Lisa".to_string()));
    }

    #[test]
    fn test_closest_match_rejects_distant_text() {
        let catalogs = Catalogs::from_json(SAMPLE).unwrap();
        assert_eq!(catalogs.characters.closest_match("zzzzzz", 3), None);
        assert_eq!(catalogs.characters.closest_match("", 3), None);
    }

    #[test]
    fn test_materials_map_to_themselves() {
        let catalogs = Catalogs::from_json(SAMPLE).unwrap();
        assert_eq!(catalogs.materials.len(), 2);
        assert_eq!(
            catalogs.materials.closest_match("mysticenhancementore", 3),
            Some("Mystic Enhancement Ore".to_string())
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalogs.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let catalogs = Catalogs::load(&path).unwrap();
        assert_eq!(catalogs.weapons.len(), 2);
        assert!(Catalogs::load(&dir.path().join("missing.json")).is_err());
    }
}
