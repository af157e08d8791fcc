//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! full-color floor image; [`to_gray`] gives the single-channel image the
//! binarizing stages work on.
//!
//! Alpha is ignored: a transparent pixel converts from its color channels,
//! so the black-transparent backgrounds of normalized floors stay black.

use image::{DynamicImage, GrayImage, RgbaImage};

use crate::types::{Dimensions, PipelineError};

/// Decode raw image bytes into a [`DynamicImage`].
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::EmptyImage`] if the decoded image has a zero
/// dimension.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::EmptyImage(Dimensions {
            width: img.width(),
            height: img.height(),
        }));
    }
    Ok(img)
}

/// Decode raw image bytes into an RGBA floor image.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    decode(bytes).map(|img| img.to_rgba8())
}

/// Convert an in-memory RGBA image to grayscale using the `image` crate's
/// luminance weights.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbaImage) -> GrayImage {
    // Drop alpha first so fully transparent pixels keep their color value.
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    DynamicImage::ImageRgb8(rgb).to_luma8()
}
