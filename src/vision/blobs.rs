//! Size-filtered connected-component detection.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::geometry::Rect;

/// Accepted blob bounding-box sizes (inclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlobFilter {
    pub min_width: i32,
    pub max_width: i32,
    pub min_height: i32,
    pub max_height: i32,
}

impl BlobFilter {
    /// A window of `width` x `height` give or take `tolerance` pixels.
    pub fn around(width: i32, height: i32, tolerance: i32) -> Self {
        Self {
            min_width: width - tolerance,
            max_width: width + tolerance,
            min_height: height - tolerance,
            max_height: height + tolerance,
        }
    }

    pub fn accepts(&self, rect: &Rect) -> bool {
        (self.min_width..=self.max_width).contains(&rect.width)
            && (self.min_height..=self.max_height).contains(&rect.height)
    }
}

/// Finds the bounding boxes of 8-connected foreground (non-black) regions that
/// pass `filter`.
///
/// Blobs are returned in detection order: the raster position of each
/// region's first pixel.
pub fn find_blobs(binary: &GrayImage, filter: &BlobFilter) -> Vec<Rect> {
    let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));

    // (min_x, min_y, max_x, max_y) per label, index = label
    let mut bounds: Vec<Option<(u32, u32, u32, u32)>> = Vec::new();
    let mut order: Vec<usize> = Vec::new();

    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel[0] as usize;
        if label == 0 {
            continue;
        }
        if bounds.len() <= label {
            bounds.resize(label + 1, None);
        }
        match bounds[label].as_mut() {
            Some(b) => {
                b.0 = b.0.min(x);
                b.1 = b.1.min(y);
                b.2 = b.2.max(x);
                b.3 = b.3.max(y);
            }
            None => {
                bounds[label] = Some((x, y, x, y));
                order.push(label);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|label| bounds[label])
        .map(|(min_x, min_y, max_x, max_y)| {
            Rect::new(
                min_x as i32,
                min_y as i32,
                (max_x - min_x + 1) as i32,
                (max_y - min_y + 1) as i32,
            )
        })
        .filter(|rect| filter.accepts(rect))
        .collect()
}
