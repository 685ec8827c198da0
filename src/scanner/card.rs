//! Card Region Extractor: captures the item card and slices it into the
//! sub-images the field pipeline reads.

use anyhow::{anyhow, Result};
use image::RgbaImage;

use super::driver::ScreenDriver;
use super::layout::CardLayout;
use crate::geometry::Rect;

/// The five images cut from one captured card. Dropping the set releases all of them.
#[derive(Clone, Debug)]
pub struct CardImageSet {
    pub card: RgbaImage,
    pub name: RgbaImage,
    pub level: RgbaImage,
    pub refinement: RgbaImage,
    pub equipped: RgbaImage,
}

impl CardImageSet {
    /// Slices a full card image according to `layout`.
    pub fn from_card(card: RgbaImage, layout: &CardLayout) -> Self {
        let regions = layout.regions(card.width(), card.height());
        Self {
            name: crop(&card, &regions.name),
            level: crop(&card, &regions.level),
            refinement: crop(&card, &regions.refinement),
            equipped: crop(&card, &regions.equipped),
            card,
        }
    }
}

/// Crops `region` out of `img`, clamped to the image bounds.
pub fn crop(img: &RgbaImage, region: &Rect) -> RgbaImage {
    let (x, y, width, height) = region.clamp_to(img.width(), img.height());
    image::imageops::crop_imm(img, x, y, width, height).to_image()
}

/// Captures the card panel shown for the item in `slot` and slices it.
pub fn extract_card<D>(driver: &mut D, layout: &CardLayout, slot: &Rect) -> Result<CardImageSet>
where
    D: ScreenDriver + ?Sized,
{
    let card = driver.capture_region(layout.card)?;
    if card.width() == 0 || card.height() == 0 {
        return Err(anyhow!("Empty card capture for slot {}", slot));
    }
    Ok(CardImageSet::from_card(card, layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::layout::ScanLayout;
    use image::Rgba;

    #[test]
    fn test_from_card_slices_regions() {
        let layout = ScanLayout::new(1280, 720);
        let card = RgbaImage::from_fn(327, 560, |x, y| Rgba([x as u8, (y % 256) as u8, 0, 255]));
        let set = CardImageSet::from_card(card, &layout.card);

        assert_eq!(set.card.dimensions(), (327, 560));
        assert_eq!(set.name.dimensions(), (327, 38));
        assert_eq!(set.level.dimensions(), (88, 19));
        assert_eq!(set.refinement.dimensions(), (20, 19));
        assert_eq!(set.equipped.dimensions(), (275, 38));

        // Level crop starts at (19, 206) of the card
        assert_eq!(set.level.get_pixel(0, 0)[0], 19);
        assert_eq!(set.level.get_pixel(0, 0)[1], 206);
    }

    #[test]
    fn test_crop_clamps_to_image() {
        let img = RgbaImage::new(50, 50);
        let cropped = crop(&img, &Rect::new(40, 45, 20, 20));
        assert_eq!(cropped.dimensions(), (10, 5));
    }
}
