//! Binarization: edge maps, adaptive thresholds, and morphological closing.
//!
//! Every function here takes a grayscale image and returns a binary image
//! where white pixels (255) are foreground and black pixels (0) are
//! background, ready for contour tracing.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero causes every pixel with any gradient to be
/// treated as a potential edge, producing an extremely dense edge map.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Detect edges using the Canny algorithm.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge.
///
/// Both thresholds are clamped to a minimum of [`MIN_THRESHOLD`] and
/// `low_threshold` is clamped to be at most `high_threshold`, which
/// `imageproc` would otherwise assert on.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Gaussian sigma matching a square smoothing window of `block_size`
/// pixels.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_block(block_size: u32) -> f32 {
    let size = block_size.max(3) as f32;
    0.3f32.mul_add((size - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Inverted local adaptive threshold with a Gaussian-weighted mean.
///
/// A pixel becomes foreground (255) when it is at least `constant`
/// darker than the Gaussian-weighted mean of its `block_size` x
/// `block_size` neighbourhood. Dark ink on light paper therefore comes
/// out white.
#[must_use = "returns the binary threshold map"]
pub fn adaptive_threshold_inv(image: &GrayImage, block_size: u32, constant: f32) -> GrayImage {
    let mean = imageproc::filter::gaussian_blur_f32(image, sigma_for_block(block_size));
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let src = f32::from(image.get_pixel(x, y).0[0]);
        let local = f32::from(mean.get_pixel(x, y).0[0]);
        Luma([if src <= local - constant { 255 } else { 0 }])
    })
}

/// Morphological closing with a square structuring element of side
/// `2 * radius + 1`.
///
/// Bridges gaps in foreground lines up to roughly `2 * radius` pixels
/// wide. A radius of zero returns the image unchanged.
#[must_use = "returns the closed image"]
pub fn close(binary: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binary.clone();
    }
    imageproc::morphology::close(binary, Norm::LInf, radius)
}

/// Keep pixels whose gray value lies in `low..=high`.
#[must_use = "returns the band mask"]
pub fn gray_band(image: &GrayImage, low: u8, high: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        Luma([if (low..=high).contains(&v) { 255 } else { 0 }])
    })
}
