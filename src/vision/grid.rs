//! Grid inference: turns an inventory screenshot into ordered slot rectangles.
//!
//! Edge detection on the inventory background only finds some of the item
//! slots, so detected blobs are treated as samples of a regular lattice. Their
//! centers are clustered into column and row lines and the full lattice is
//! rebuilt from the cross product. Missed slots are recovered this way; a
//! synthesized slot where no item exists only costs an empty click.

use image::{GrayImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use thiserror::Error;

use super::blobs::{find_blobs, BlobFilter};
use super::preprocess::{boost_contrast, detect_edges, fill_holes, sobel, threshold, to_grayscale};
use crate::geometry::{Point, Rect};

/// Item card size at the 1280x720 reference resolution.
const REFERENCE_CARD_WIDTH: f64 = 85.0;
const REFERENCE_CARD_HEIGHT: f64 = 105.0;

const EDGE_CONTRAST: f32 = 85.0;
const EDGE_THRESHOLD: u8 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("Insufficient items found in inventory: {found} detected, at least {required} required")]
    InsufficientDetection { found: usize, required: usize },
}

/// Tunables for grid inference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridParams {
    /// Expected slot width in pixels
    pub card_width: i32,
    /// Expected slot height in pixels
    pub card_height: i32,
    /// Accepted deviation from the expected slot size
    pub size_tolerance: i32,
    /// Fewer blobs than this and the page is not trusted
    pub min_blobs: usize,
    /// Centers within this distance belong to the same column/row
    pub cluster_tolerance: i32,
    /// Overlap (fraction of own width) above which a rectangle is a duplicate
    pub overlap_ratio: f32,
}

impl GridParams {
    pub fn new(card_width: i32, card_height: i32) -> Self {
        Self {
            card_width,
            card_height,
            size_tolerance: 10,
            min_blobs: 7,
            cluster_tolerance: 10,
            overlap_ratio: 0.2,
        }
    }

    /// Card size is a fixed fraction of the window, identical for 16:9 and 16:10.
    pub fn for_window(width: u32, height: u32) -> Self {
        Self::new(
            (REFERENCE_CARD_WIDTH / 1280.0 * width as f64) as i32,
            (REFERENCE_CARD_HEIGHT / 720.0 * height as f64) as i32,
        )
    }

    fn blob_filter(&self) -> BlobFilter {
        BlobFilter::around(self.card_width, self.card_height, self.size_tolerance)
    }
}

/// Inferred slot layout of one inventory page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grid {
    /// Slot rectangles sorted top-to-bottom, then left-to-right
    pub rectangles: Vec<Rect>,
    pub columns: usize,
    pub rows: usize,
}

impl Grid {
    /// Number of slots on a full page.
    pub fn page_size(&self) -> usize {
        self.columns * self.rows
    }
}

/// Scalar positions deduplicated by a pixel tolerance. The first position seen
/// for a line is the one kept.
#[derive(Clone, Debug)]
pub struct CoordinateClusters {
    tolerance: i32,
    positions: Vec<i32>,
}

impl CoordinateClusters {
    pub fn new(tolerance: i32) -> Self {
        Self {
            tolerance,
            positions: Vec::new(),
        }
    }

    /// Adds `position` unless an existing line is within tolerance.
    /// Returns whether a new line was created.
    pub fn insert(&mut self, position: i32) -> bool {
        let known = self
            .positions
            .iter()
            .any(|p| (p - self.tolerance..=p + self.tolerance).contains(&position));
        if !known {
            self.positions.push(position);
        }
        !known
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Line positions in ascending order.
    pub fn sorted(&self) -> Vec<i32> {
        let mut sorted = self.positions.clone();
        sorted.sort_unstable();
        sorted
    }
}

/// Runs the card-border enhancement chain and returns a binary-ish edge map.
///
/// A single edge pass only finds part of the card borders against the textured
/// background; the threshold + Sobel + hole-fill + Sobel sequence recovers the
/// rest and suppresses detail inside the cards.
pub fn enhance_edges(screenshot: &RgbaImage, params: &GridParams) -> GrayImage {
    let contrasted = boost_contrast(screenshot, EDGE_CONTRAST);
    let edges = detect_edges(&contrasted);
    let gray = to_grayscale(&edges);
    let binary = threshold(&gray, EDGE_THRESHOLD);

    let outlined = sobel(&binary);
    let filled = fill_holes(
        &outlined,
        (params.card_width + params.size_tolerance).max(0) as u32,
        (params.card_height + params.size_tolerance).max(0) as u32,
    );
    sobel(&filled)
}

/// Infers the slot grid from a full-window screenshot.
pub fn infer_grid(screenshot: &RgbaImage, params: &GridParams) -> Result<Grid, GridError> {
    let edges = enhance_edges(screenshot, params);
    let blobs = find_blobs(&edges, &params.blob_filter());
    infer_grid_from_blobs(&blobs, params)
}

/// Rebuilds the lattice from detected blob rectangles (in detection order).
pub fn infer_grid_from_blobs(blobs: &[Rect], params: &GridParams) -> Result<Grid, GridError> {
    if blobs.len() < params.min_blobs {
        return Err(GridError::InsufficientDetection {
            found: blobs.len(),
            required: params.min_blobs,
        });
    }

    let kept = prune_overlaps(blobs, params.overlap_ratio);

    let mut columns = CoordinateClusters::new(params.cluster_tolerance);
    let mut rows = CoordinateClusters::new(params.cluster_tolerance);
    let mut slot_width = i32::MAX;
    let mut slot_height = i32::MAX;

    for rect in &kept {
        let center = rect.center();
        columns.insert(center.x);
        rows.insert(center.y);
        slot_width = slot_width.min(rect.width);
        slot_height = slot_height.min(rect.height);
    }

    let column_lines = columns.sorted();
    let row_lines = rows.sorted();

    let mut synthesized = Vec::with_capacity(column_lines.len() * row_lines.len());
    for &y in &row_lines {
        for &x in &column_lines {
            synthesized.push(Rect::centered_at(Point::new(x, y), slot_width, slot_height));
        }
    }

    let mut rectangles = prune_overlaps(&synthesized, params.overlap_ratio);
    rectangles.sort_by_key(|r| (r.top(), r.left()));

    crate::log(&format!(
        "Grid inferred: {} blobs ({} kept), {} columns x {} rows, {} slots of {}x{}",
        blobs.len(),
        kept.len(),
        column_lines.len(),
        row_lines.len(),
        rectangles.len(),
        slot_width,
        slot_height
    ));

    Ok(Grid {
        rectangles,
        columns: column_lines.len(),
        rows: row_lines.len(),
    })
}

/// Greedy overlap removal: a rectangle is dropped when its intersection width
/// with any already-kept rectangle exceeds `ratio` of its own width.
pub fn prune_overlaps(rects: &[Rect], ratio: f32) -> Vec<Rect> {
    let mut kept: Vec<Rect> = Vec::with_capacity(rects.len());
    for rect in rects {
        let limit = rect.width as f32 * ratio;
        let overlaps = kept
            .iter()
            .any(|other| rect.intersection_width(other) as f32 > limit);
        if !overlaps {
            kept.push(*rect);
        }
    }
    kept
}

/// Draws the grid's rectangles onto a copy of the screenshot for diagnostics.
pub fn draw_overlay(screenshot: &RgbaImage, grid: &Grid) -> RgbaImage {
    let mut output = screenshot.clone();
    for rect in &grid.rectangles {
        let marker = imageproc::rect::Rect::at(rect.x, rect.y)
            .of_size(rect.width.max(1) as u32, rect.height.max(1) as u32);
        draw_hollow_rect_mut(&mut output, marker, Rgba([0, 255, 0, 255]));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GridParams {
        GridParams::new(40, 50)
    }

    /// Blob rectangles for a `cols` x `rows` lattice, skipping `missing` (col, row) cells.
    fn lattice(cols: i32, rows: i32, missing: &[(i32, i32)]) -> Vec<Rect> {
        let mut blobs = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                if missing.contains(&(col, row)) {
                    continue;
                }
                blobs.push(Rect::new(20 + col * 60, 30 + row * 70, 40, 50));
            }
        }
        blobs
    }

    fn assert_sorted(rects: &[Rect]) {
        for pair in rects.windows(2) {
            assert!(
                (pair[0].top(), pair[0].left()) <= (pair[1].top(), pair[1].left()),
                "{} should come before {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_insufficient_detection() {
        let blobs = lattice(3, 2, &[]);
        let result = infer_grid_from_blobs(&blobs, &params());
        assert_eq!(
            result,
            Err(GridError::InsufficientDetection {
                found: 6,
                required: 7
            })
        );
    }

    #[test]
    fn test_full_lattice() {
        let grid = infer_grid_from_blobs(&lattice(7, 5, &[]), &params()).unwrap();
        assert_eq!(grid.columns, 7);
        assert_eq!(grid.rows, 5);
        assert_eq!(grid.rectangles.len(), 35);
        assert_sorted(&grid.rectangles);
        assert_eq!(grid.rectangles[0], Rect::new(20, 30, 40, 50));
        assert_eq!(grid.rectangles[34], Rect::new(380, 310, 40, 50));
    }

    #[test]
    fn test_missing_slots_are_synthesized() {
        let missing = [(1, 0), (3, 1), (3, 2), (6, 4), (0, 3), (2, 2)];
        let grid = infer_grid_from_blobs(&lattice(7, 5, &missing), &params()).unwrap();
        assert_eq!(grid.rectangles.len(), 35);
        assert!(grid.rectangles.contains(&Rect::new(80, 30, 40, 50)));
        assert!(grid.rectangles.contains(&Rect::new(380, 310, 40, 50)));
    }

    #[test]
    fn test_duplicate_blobs_are_ignored() {
        let mut blobs = lattice(4, 2, &[]);
        blobs.insert(1, Rect::new(23, 32, 42, 50));
        let grid = infer_grid_from_blobs(&blobs, &params()).unwrap();
        assert_eq!(grid.columns, 4);
        assert_eq!(grid.rows, 2);
        assert_eq!(grid.rectangles.len(), 8);
    }

    #[test]
    fn test_jittered_centers_cluster_together() {
        let blobs = vec![
            Rect::new(20, 30, 40, 50),
            Rect::new(84, 36, 40, 50),
            Rect::new(141, 27, 40, 50),
            Rect::new(200, 30, 40, 50),
            Rect::new(16, 100, 40, 50),
            Rect::new(80, 108, 40, 50),
            Rect::new(143, 96, 40, 50),
        ];
        let grid = infer_grid_from_blobs(&blobs, &params()).unwrap();
        assert_eq!(grid.columns, 4);
        assert_eq!(grid.rows, 2);
        assert_sorted(&grid.rectangles);
    }

    #[test]
    fn test_canonical_size_is_smallest_blob() {
        let mut blobs = lattice(4, 2, &[]);
        blobs[3] = Rect::new(200, 30, 37, 48);
        blobs[5] = Rect::new(80, 100, 44, 46);
        let grid = infer_grid_from_blobs(&blobs, &params()).unwrap();
        assert!(grid.rectangles.iter().all(|r| r.width == 37 && r.height == 46));
    }

    #[test]
    fn test_counts_match_distinct_clusters_when_rows_are_ragged() {
        // Last row only has two detected items; lattice still spans all columns
        let mut blobs = lattice(5, 2, &[]);
        blobs.push(Rect::new(20, 170, 40, 50));
        blobs.push(Rect::new(80, 170, 40, 50));
        let grid = infer_grid_from_blobs(&blobs, &params()).unwrap();
        assert_eq!(grid.columns, 5);
        assert_eq!(grid.rows, 3);
        assert_eq!(grid.page_size(), 15);
        assert_sorted(&grid.rectangles);
    }

    #[test]
    fn test_prune_overlaps_is_idempotent() {
        let rects = vec![
            Rect::new(0, 0, 40, 50),
            Rect::new(5, 0, 40, 50),
            Rect::new(35, 0, 40, 50),
            Rect::new(60, 0, 40, 50),
            Rect::new(90, 10, 40, 50),
        ];
        let once = prune_overlaps(&rects, 0.2);
        let twice = prune_overlaps(&once, 0.2);
        assert_eq!(once, twice);
        assert_eq!(
            once,
            vec![
                Rect::new(0, 0, 40, 50),
                Rect::new(35, 0, 40, 50),
                Rect::new(90, 10, 40, 50)
            ]
        );
    }

    #[test]
    fn test_coordinate_clusters_first_seen_wins() {
        let mut clusters = CoordinateClusters::new(10);
        assert!(clusters.insert(100));
        assert!(!clusters.insert(110));
        assert!(!clusters.insert(91));
        assert!(clusters.insert(89));
        assert!(clusters.insert(50));
        assert_eq!(clusters.sorted(), vec![50, 89, 100]);
    }

    #[test]
    fn test_for_window_scales_card_size() {
        let params = GridParams::for_window(1920, 1080);
        assert_eq!(params.card_width, 127);
        assert_eq!(params.card_height, 157);
    }

    #[test]
    fn test_infer_grid_on_synthetic_inventory() {
        let background = Rgba([30, 32, 40, 255]);
        let card = Rgba([200, 180, 150, 255]);
        let mut screenshot = RgbaImage::from_pixel(440, 380, background);
        for row in 0..5u32 {
            for col in 0..7u32 {
                let left = 20 + col * 58;
                let top = 20 + row * 70;
                for y in top..top + 50 {
                    for x in left..left + 40 {
                        screenshot.put_pixel(x, y, card);
                    }
                }
            }
        }

        let grid = infer_grid(&screenshot, &params()).unwrap();
        assert_eq!(grid.columns, 7);
        assert_eq!(grid.rows, 5);
        assert_eq!(grid.rectangles.len(), 35);
        assert_sorted(&grid.rectangles);

        let first = grid.rectangles[0].center();
        assert!((first.x - 40).abs() <= 2, "first column center at {}", first.x);
        assert!((first.y - 45).abs() <= 2, "first row center at {}", first.y);
    }

    #[test]
    fn test_draw_overlay_marks_rectangles() {
        let screenshot = RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 255]));
        let grid = Grid {
            rectangles: vec![Rect::new(10, 10, 20, 20)],
            columns: 1,
            rows: 1,
        };
        let overlay = draw_overlay(&screenshot, &grid);
        assert_eq!(*overlay.get_pixel(10, 10), Rgba([0, 255, 0, 255]));
        assert_eq!(*overlay.get_pixel(20, 20), Rgba([0, 0, 0, 255]));
    }
}
