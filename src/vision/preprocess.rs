use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgba, RgbaImage};
use imageproc::region_labelling::{connected_components, Connectivity};

/// Converts an RGBA image to 8-bit luma.
pub fn to_grayscale(img: &RgbaImage) -> GrayImage {
    imageops::grayscale(img)
}

/// Applies gamma correction to the color channels: `out = 255 * (in / 255)^gamma`.
///
/// Values below 1.0 brighten the image. Alpha is left untouched.
pub fn adjust_gamma(img: &RgbaImage, gamma: f32) -> RgbaImage {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let normalized = i as f32 / 255.0;
        *entry = (normalized.powf(gamma) * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    let mut output = img.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = table[pixel[0] as usize];
        pixel[1] = table[pixel[1] as usize];
        pixel[2] = table[pixel[2] as usize];
    }
    output
}

/// Raises contrast by `percent` (negative values reduce it).
pub fn boost_contrast<P>(img: &ImageBuffer<P, Vec<u8>>, percent: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    imageops::contrast(img, percent)
}

/// Returns the negative of a grayscale image.
pub fn invert(mut img: GrayImage) -> GrayImage {
    imageops::invert(&mut img);
    img
}

/// Binarizes an image: pixels at or above `level` become white, the rest black.
pub fn threshold(img: &GrayImage, level: u8) -> GrayImage {
    let mut output = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] >= level { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }
    output
}

/// Scales an image by an integer factor with bicubic filtering.
pub fn upscale(img: &RgbaImage, factor: u32) -> RgbaImage {
    imageops::resize(
        img,
        img.width() * factor,
        img.height() * factor,
        FilterType::CatmullRom,
    )
}

/// Simple 3x3 edge detector (Laplacian kernel) applied to each color channel.
///
/// Edge pixels are clamped to the image, so a uniform image produces all zeros.
pub fn detect_edges(img: &RgbaImage) -> RgbaImage {
    const KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 4, -1], [0, -1, 0]];

    let (width, height) = img.dimensions();
    let mut output = RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return output;
    }

    for y in 0..height {
        for x in 0..width {
            let mut sums = [0i32; 3];
            for (ky, row) in KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    if *weight == 0 {
                        continue;
                    }
                    let sx = (x as i64 + kx as i64 - 1).clamp(0, width as i64 - 1) as u32;
                    let sy = (y as i64 + ky as i64 - 1).clamp(0, height as i64 - 1) as u32;
                    let sample = img.get_pixel(sx, sy);
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += weight * sample[c] as i32;
                    }
                }
            }
            let alpha = img.get_pixel(x, y)[3];
            output.put_pixel(
                x,
                y,
                Rgba([
                    sums[0].clamp(0, 255) as u8,
                    sums[1].clamp(0, 255) as u8,
                    sums[2].clamp(0, 255) as u8,
                    alpha,
                ]),
            );
        }
    }
    output
}

/// Sobel gradient magnitude, saturated to 8 bits.
pub fn sobel(img: &GrayImage) -> GrayImage {
    let gradients = imageproc::gradients::sobel_gradients(img);
    let mut output = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in gradients.enumerate_pixels() {
        output.put_pixel(x, y, Luma([pixel[0].min(255) as u8]));
    }
    output
}

/// Fills enclosed background regions ("holes") of a binary image.
///
/// A hole is a 4-connected region of black pixels that does not touch the
/// image border. Only holes whose bounding box fits inside
/// `max_width` x `max_height` are filled, so large background areas between
/// shapes are preserved.
pub fn fill_holes(img: &GrayImage, max_width: u32, max_height: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = img.clone();
    if width == 0 || height == 0 {
        return output;
    }

    // Background becomes foreground so the labeller finds the holes
    let mut background = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[0] == 0 {
            background.put_pixel(x, y, Luma([255]));
        }
    }

    let labels = connected_components(&background, Connectivity::Four, Luma([0u8]));
    let label_count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    if label_count == 0 {
        return output;
    }

    struct Extent {
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
        touches_border: bool,
    }

    let mut extents: Vec<Option<Extent>> = (0..=label_count).map(|_| None).collect();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel[0] as usize;
        if label == 0 {
            continue;
        }
        let on_border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
        let extent = extents[label].get_or_insert(Extent {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            touches_border: false,
        });
        extent.min_x = extent.min_x.min(x);
        extent.min_y = extent.min_y.min(y);
        extent.max_x = extent.max_x.max(x);
        extent.max_y = extent.max_y.max(y);
        extent.touches_border |= on_border;
    }

    let fillable: Vec<bool> = extents
        .iter()
        .map(|extent| match extent {
            Some(e) => {
                !e.touches_border
                    && e.max_x - e.min_x + 1 <= max_width
                    && e.max_y - e.min_y + 1 <= max_height
            }
            None => false,
        })
        .collect();

    for (x, y, pixel) in labels.enumerate_pixels() {
        if fillable[pixel[0] as usize] {
            output.put_pixel(x, y, Luma([255]));
        }
    }
    output
}
