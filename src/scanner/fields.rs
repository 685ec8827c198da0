//! Field Extraction Pipeline: turns a sliced card into a `WeaponRecord`.
//!
//! Rarity and the equipped marker are read from single pixels. Name, level,
//! refinement and (for equipped items) owner go through preprocessing, text
//! recognition and normalization, each on its own scoped thread.

use anyhow::{anyhow, Result};
use image::{GrayImage, Rgba, RgbaImage};
use regex::Regex;
use std::sync::LazyLock;
use std::thread::{self, ScopedJoinHandle};

use super::card::CardImageSet;
use super::config::ScannerConfig;
use super::layout::ScanLayout;
use super::record::{LevelReading, WeaponRecord};
use crate::catalog::{normalize_name, Catalog, Catalogs};
use crate::geometry::Point;
use crate::ocr::TextRecognizer;
use crate::vision::preprocess::{adjust_gamma, boost_contrast, invert, to_grayscale, upscale};

/// Name-bar colors by star count, best first.
pub const RARITY_COLORS: [(u8, Rgba<u8>); 5] = [
    (5, Rgba([188, 105, 50, 255])),
    (4, Rgba([161, 86, 224, 255])),
    (3, Rgba([81, 127, 203, 255])),
    (2, Rgba([42, 143, 114, 255])),
    (1, Rgba([114, 119, 138, 255])),
];

/// Background of the "Equipped: <name>" strip.
pub const EQUIPPED_COLOR: Rgba<u8> = Rgba([255, 231, 187, 255]);

const NAME_GAMMA: f32 = 0.2;
const OWNER_CONTRAST: f32 = 60.0;
const EQUIPPED_LABEL: &str = "Equipped:";
/// Levels below this can't have been ascended yet.
const FIRST_ASCENSION_LEVEL: u32 = 20;

static NOT_LEVEL_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9/]").expect("valid regex"));
static NOT_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9]").expect("valid regex"));

/// Shared inputs for extracting the fields of one card.
pub struct FieldContext<'a> {
    pub recognizer: &'a dyn TextRecognizer,
    pub catalogs: &'a Catalogs,
    pub layout: &'a ScanLayout,
    pub config: &'a ScannerConfig,
}

/// True when every RGB channel differs by at most `tolerance`.
pub fn colors_match(a: Rgba<u8>, b: Rgba<u8>, tolerance: u8) -> bool {
    (0..3).all(|c| a[c].abs_diff(b[c]) <= tolerance)
}

fn color_distance(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
    (0..3).map(|c| a[c].abs_diff(b[c]) as u32).sum()
}

/// Classifies a name-bar pixel as a star rarity: the nearest reference color
/// that lies within `tolerance`, or `None`.
pub fn classify_rarity(pixel: Rgba<u8>, tolerance: u8) -> Option<u8> {
    RARITY_COLORS
        .iter()
        .filter(|(_, color)| colors_match(*color, pixel, tolerance))
        .min_by_key(|(_, color)| color_distance(*color, pixel))
        .map(|(stars, _)| *stars)
}

fn sample(img: &RgbaImage, at: Point) -> Option<Rgba<u8>> {
    if at.x < 0 || at.y < 0 || at.x as u32 >= img.width() || at.y as u32 >= img.height() {
        return None;
    }
    Some(*img.get_pixel(at.x as u32, at.y as u32))
}

/// Reads the rarity from the name image.
pub fn rarity_of(name: &RgbaImage, at: Point, tolerance: u8) -> Option<u8> {
    sample(name, at).and_then(|pixel| classify_rarity(pixel, tolerance))
}

/// Checks the equipped strip for the "equipped" background color.
pub fn is_equipped(equipped: &RgbaImage, at: Point, tolerance: u8) -> bool {
    sample(equipped, at).is_some_and(|pixel| colors_match(EQUIPPED_COLOR, pixel, tolerance))
}

/// Rarity gate: a known rarity under the configured minimum stops the scan.
pub fn below_min_rarity(rarity: Option<u8>, min_rarity: u8) -> bool {
    matches!(rarity, Some(stars) if stars < min_rarity)
}

/// Parses "current/max" level text. `None` if the text isn't in that shape.
pub fn parse_level(text: &str) -> Option<LevelReading> {
    let cleaned = NOT_LEVEL_CHAR.replace_all(text.trim(), "");
    let (current, max) = cleaned.split_once('/')?;
    let level: u32 = current.parse().ok()?;
    let max: u32 = max.parse().ok()?;

    let max_level = (max + 5) / 10 * 10;
    Some(LevelReading {
        level,
        max_level,
        ascended: FIRST_ASCENSION_LEVEL <= level && level < max_level,
    })
}

/// Parses refinement text, keeping digits only.
pub fn parse_refinement(text: &str) -> Option<u32> {
    NOT_DIGIT.replace_all(text.trim(), "").parse().ok()
}

/// Extracts the owner name from "Equipped: <name>" text.
pub fn parse_equipped_owner(text: &str, characters: &Catalog, max_distance: usize) -> Option<String> {
    if !text.contains(EQUIPPED_LABEL) {
        return None;
    }
    let owner = normalize_name(text.split(':').nth(1)?);
    characters.closest_match(&owner, max_distance)
}

fn name_image(name: &RgbaImage) -> GrayImage {
    invert(to_grayscale(&adjust_gamma(name, NAME_GAMMA)))
}

/// Recognizes the weapon name and matches it against the weapon catalog.
pub fn scan_name(
    name: &RgbaImage,
    recognizer: &dyn TextRecognizer,
    weapons: &Catalog,
    max_distance: usize,
) -> Result<Option<String>> {
    let text = recognizer.recognize_text(&name_image(name))?;
    Ok(weapons.closest_match(&normalize_name(&text), max_distance))
}

/// Recognizes the name strip as an enhancement material, for cards that
/// aren't weapons.
pub fn scan_material_name(
    name: &RgbaImage,
    recognizer: &dyn TextRecognizer,
    materials: &Catalog,
    max_distance: usize,
) -> Result<Option<String>> {
    let text = recognizer.recognize_text(&name_image(name))?;
    Ok(materials.closest_match(&normalize_name(&text), max_distance))
}

pub fn scan_level(level: &RgbaImage, recognizer: &dyn TextRecognizer) -> Result<Option<LevelReading>> {
    let text = recognizer.recognize_text(&invert(to_grayscale(level)))?;
    Ok(parse_level(&text))
}

pub fn scan_refinement(refinement: &RgbaImage, recognizer: &dyn TextRecognizer) -> Result<Option<u32>> {
    // The refinement digit is tiny; recognition is more reliable at 2x
    let enlarged = upscale(refinement, 2);
    let text = recognizer.recognize_text(&invert(to_grayscale(&enlarged)))?;
    Ok(parse_refinement(&text))
}

pub fn scan_equipped_owner(
    equipped: &RgbaImage,
    recognizer: &dyn TextRecognizer,
    characters: &Catalog,
    max_distance: usize,
) -> Result<Option<String>> {
    let prepared = boost_contrast(&to_grayscale(equipped), OWNER_CONTRAST);
    let text = recognizer.recognize_text(&prepared)?;
    Ok(parse_equipped_owner(&text, characters, max_distance))
}

fn join<T>(handle: ScopedJoinHandle<'_, Result<T>>, field: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("{} extraction panicked", field))?
}

/// Extracts every field of one card. Text fields run in parallel and are all
/// joined before the record is built.
pub fn extract_fields(images: &CardImageSet, id: u32, ctx: &FieldContext<'_>) -> Result<WeaponRecord> {
    let tolerance = ctx.config.color_tolerance;
    let rarity = rarity_of(&images.name, ctx.layout.rarity_sample, tolerance);
    let equipped = is_equipped(&images.equipped, ctx.layout.equipped_sample, tolerance);

    let recognizer = ctx.recognizer;
    let catalogs = ctx.catalogs;
    let config = ctx.config;

    let (name, level, refinement, owner) = thread::scope(|s| {
        let name = s.spawn(|| {
            scan_name(
                &images.name,
                recognizer,
                &catalogs.weapons,
                config.weapon_match_distance,
            )
        });
        let level = s.spawn(|| scan_level(&images.level, recognizer));
        let refinement = s.spawn(|| scan_refinement(&images.refinement, recognizer));
        let owner = equipped.then(|| {
            s.spawn(|| {
                scan_equipped_owner(
                    &images.equipped,
                    recognizer,
                    &catalogs.characters,
                    config.character_match_distance,
                )
            })
        });

        (
            join(name, "name"),
            join(level, "level"),
            join(refinement, "refinement"),
            owner.map(|handle| join(handle, "equipped owner")),
        )
    });

    let level = level?;
    Ok(WeaponRecord {
        id,
        name: name?,
        level: level.map(|l| l.level),
        ascended: level.is_some_and(|l| l.ascended),
        refinement: refinement?,
        equipped_owner: owner.transpose()?.flatten(),
        rarity,
    })
}
