//! Resolution-dependent screen geometry.
//!
//! Positions are authored in 1280-wide reference pixels (1280x720 for 16:9,
//! 1280x800 for 16:10) and scaled to the current window size.

use crate::geometry::{Point, Rect};

const REFERENCE_WIDTH: f64 = 1280.0;
/// Reference height used by positions that are identical for both layouts.
const SHARED_REFERENCE_HEIGHT: f64 = 720.0;

/// The two supported window layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectRatio {
    /// 16:9
    Wide,
    /// 16:10
    Narrow,
}

impl AspectRatio {
    /// Classifies a window size; sizes that are neither exact 16:9 nor 16:10
    /// use whichever layout is closer.
    pub fn from_size(width: u32, height: u32) -> Self {
        let (w, h) = (width as u64, height as u64);
        if w * 9 == h * 16 {
            return AspectRatio::Wide;
        }
        if w * 10 == h * 16 {
            return AspectRatio::Narrow;
        }
        let ratio = width as f64 / height.max(1) as f64;
        if (ratio - 16.0 / 9.0).abs() <= (ratio - 1.6).abs() {
            AspectRatio::Wide
        } else {
            AspectRatio::Narrow
        }
    }

    fn reference_height(self) -> f64 {
        match self {
            AspectRatio::Wide => 720.0,
            AspectRatio::Narrow => 800.0,
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AspectRatio::Wide => write!(f, "16:9"),
            AspectRatio::Narrow => write!(f, "16:10"),
        }
    }
}

/// Item card template in reference pixels.
struct CardTemplate {
    card: Rect,
    equipped_top: i32,
}

const WIDE_CARD: CardTemplate = CardTemplate {
    card: Rect::new(862, 80, 327, 560),
    equipped_top: 522,
};

const NARROW_CARD: CardTemplate = CardTemplate {
    card: Rect::new(862, 80, 328, 640),
    equipped_top: 602,
};

/// Sub-regions inside the card, in card reference pixels (left, top, right, bottom).
const NAME_BOTTOM: f64 = 38.0;
const LEVEL_EDGES: [f64; 4] = [19.0, 206.0, 107.0, 225.0];
const REFINEMENT_EDGES: [f64; 4] = [20.0, 235.0, 40.0, 254.0];
const EQUIPPED_LEFT: f64 = 52.0;

/// Nearest-integer rounding, halves away from zero.
fn round(value: f64) -> i32 {
    value.round() as i32
}

/// Where the card panel is in the window and how to slice it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardLayout {
    /// Card panel in window coordinates
    pub card: Rect,
    reference_width: f64,
    reference_height: f64,
    equipped_top: f64,
}

/// Sub-rectangles of a captured card image, relative to the card's top-left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardRegions {
    pub name: Rect,
    pub level: Rect,
    pub refinement: Rect,
    pub equipped: Rect,
}

impl CardLayout {
    pub fn new(aspect: AspectRatio, window_width: u32, window_height: u32) -> Self {
        let template = match aspect {
            AspectRatio::Wide => WIDE_CARD,
            AspectRatio::Narrow => NARROW_CARD,
        };
        let sx = window_width as f64 / REFERENCE_WIDTH;
        let sy = window_height as f64 / aspect.reference_height();

        let card = Rect::from_edges(
            round(template.card.left() as f64 * sx),
            round(template.card.top() as f64 * sy),
            round(template.card.right() as f64 * sx),
            round(template.card.bottom() as f64 * sy),
        );

        Self {
            card,
            reference_width: template.card.width as f64,
            reference_height: template.card.height as f64,
            equipped_top: template.equipped_top as f64,
        }
    }

    /// Slices a captured card of `width` x `height` proportionally.
    pub fn regions(&self, width: u32, height: u32) -> CardRegions {
        let fx = width as f64 / self.reference_width;
        let fy = height as f64 / self.reference_height;
        let scaled = |edges: [f64; 4]| {
            Rect::from_edges(
                round(edges[0] * fx),
                round(edges[1] * fy),
                round(edges[2] * fx),
                round(edges[3] * fy),
            )
        };

        CardRegions {
            name: Rect::from_edges(0, 0, width as i32, round(NAME_BOTTOM * fy)),
            level: scaled(LEVEL_EDGES),
            refinement: scaled(REFINEMENT_EDGES),
            equipped: Rect::from_edges(
                round(EQUIPPED_LEFT * fx),
                round(self.equipped_top * fy),
                width as i32,
                height as i32,
            ),
        }
    }
}

/// All window geometry needed during one scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanLayout {
    pub aspect: AspectRatio,
    pub window_width: u32,
    pub window_height: u32,
    pub card: CardLayout,
    /// Item count label ("123/2000") in the inventory header
    pub count_region: Rect,
    /// Pixel on the name image whose color encodes rarity
    pub rarity_sample: Point,
    /// Pixel on the equipped image showing the "equipped" background
    pub equipped_sample: Point,
    /// Vertical click correction after the final partial scroll
    pub final_page_click_offset: i32,
}

impl ScanLayout {
    pub fn new(window_width: u32, window_height: u32) -> Self {
        let aspect = AspectRatio::from_size(window_width, window_height);
        let sx = window_width as f64 / REFERENCE_WIDTH;
        let sy = window_height as f64 / SHARED_REFERENCE_HEIGHT;

        let final_page_click_offset = match aspect {
            AspectRatio::Wide => 0,
            AspectRatio::Narrow => round(35.0 * window_height as f64 / 800.0),
        };

        Self {
            aspect,
            window_width,
            window_height,
            card: CardLayout::new(aspect, window_width, window_height),
            count_region: Rect::new(
                (1030.0 * sx) as i32,
                (20.0 * sy) as i32,
                (175.0 * sx) as i32,
                (25.0 * sy) as i32,
            ),
            rarity_sample: Point::new((10.0 * sx) as i32, (10.0 * sy) as i32),
            equipped_sample: Point::new(5, 5),
            final_page_click_offset,
        }
    }
}
