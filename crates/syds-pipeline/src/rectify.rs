//! Raster normalization: from a photographed floor plan to a canonical
//! top-down floor image.
//!
//! A photograph shows the plan sheet at an angle on some background.
//! [`rectify`] finds the sheet as the largest quadrilateral outline,
//! warps it onto an axis-aligned rectangle, then masks and crops the
//! largest plausible plan region drawn on it. [`rectify_batch`] does this
//! for every floor of a building and brings the results to a common
//! scale.
//!
//! Not finding a sheet or a plan region is not an error: the floor is
//! reported as `None` and the rest of the batch carries on.

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, warn};

use crate::contour::{bounding_box, convex_hull_area, external_contours, ring_area};
use crate::edge::{adaptive_threshold_inv, canny, close, sigma_for_block};
use crate::grayscale::to_gray;
use crate::mask::polygon_mask;
use crate::simplify::{approximate_ring, ring_perimeter};
use crate::types::{PipelineConfig, PipelineError, Point};

/// Smoothing window applied before edge detection.
const SHEET_BLUR_BLOCK: u32 = 5;
/// Canny hysteresis thresholds for sheet detection.
const SHEET_CANNY_LOW: f32 = 50.0;
const SHEET_CANNY_HIGH: f32 = 200.0;

/// Smallest plan region, as a fraction of the image area.
const MIN_PLAN_AREA_FRACTION: f64 = 0.01;
/// Open interval of accepted bounding-box aspect ratios (width / height).
const PLAN_ASPECT_RANGE: (f64, f64) = (0.3, 3.5);
/// Smallest accepted ratio of region area to convex hull area.
const MIN_PLAN_SOLIDITY: f64 = 0.6;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Locate the plan sheet: the largest contour that approximates to
/// exactly four vertices.
///
/// Returns the corners ordered by [`order_corners`], or `None` if no
/// quadrilateral is found.
#[must_use]
pub fn find_sheet(gray: &GrayImage, config: &PipelineConfig) -> Option<[Point; 4]> {
    let blurred = imageproc::filter::gaussian_blur_f32(gray, sigma_for_block(SHEET_BLUR_BLOCK));
    let edges = canny(&blurred, SHEET_CANNY_LOW, SHEET_CANNY_HIGH);
    drop(blurred);
    let closed = close(&edges, config.wall_closing_radius);
    drop(edges);

    let mut best: Option<([Point; 4], f64)> = None;
    for contour in external_contours(&closed) {
        let tolerance = config.quad_approx_fraction * ring_perimeter(&contour.points);
        let approx = approximate_ring(&contour.points, tolerance);
        let Ok(quad) = <[Point; 4]>::try_from(approx) else {
            continue;
        };
        let area = ring_area(&quad);
        if area > best.map_or(0.0, |(_, a)| a) {
            best = Some((quad, area));
        }
    }
    best.map(|(quad, area)| {
        debug!(area, ?quad, "sheet quadrilateral found");
        order_corners(quad)
    })
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y` and bottom-right the largest;
/// top-right has the smallest `y - x` and bottom-left the largest. Ties
/// go to the earlier corner in the input.
#[must_use]
pub fn order_corners(corners: [Point; 4]) -> [Point; 4] {
    let sum = |p: &Point| i64::from(p.x) + i64::from(p.y);
    let diff = |p: &Point| i64::from(p.y) - i64::from(p.x);
    let pick = |key: &dyn Fn(&Point) -> i64, largest: bool| {
        corners
            .iter()
            .copied()
            .reduce(|best, p| {
                let better = if largest {
                    key(&p) > key(&best)
                } else {
                    key(&p) < key(&best)
                };
                if better { p } else { best }
            })
            .unwrap_or(corners[0])
    };
    [
        pick(&sum, false),
        pick(&diff, false),
        pick(&sum, true),
        pick(&diff, true),
    ]
}

/// Warp the quadrilateral `corners` (ordered top-left, top-right,
/// bottom-right, bottom-left) of `image` onto an axis-aligned rectangle.
///
/// The rectangle is as wide as the longer of the top and bottom sides
/// and as tall as the longer of the left and right sides. Returns `None`
/// for a quadrilateral too small or too degenerate to warp.
#[must_use = "returns the warped image"]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn warp_sheet(image: &RgbaImage, corners: &[Point; 4]) -> Option<RgbaImage> {
    let [tl, tr, br, bl] = *corners;
    let width = br.distance(bl).max(tr.distance(tl)) as u32;
    let height = tr.distance(br).max(tl.distance(bl)) as u32;
    if width < 2 || height < 2 {
        return None;
    }

    let (w, h) = ((width - 1) as f32, (height - 1) as f32);
    let src = corners.map(|p| (p.x as f32, p.y as f32));
    let dst = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let projection = Projection::from_control_points(src, dst)?;

    let mut out = RgbaImage::new(width, height);
    warp_into(image, &projection, Interpolation::Bilinear, BACKGROUND, &mut out);
    Some(out)
}

/// Mask and crop the largest plausible plan region of a rectified sheet.
///
/// Ink is isolated with the outer-wall threshold settings; external
/// contours are kept when they cover at least 1% of the image, have a
/// bounding-box aspect ratio strictly between 0.3 and 3.5, and fill at
/// least 60% of their convex hull. Pixels outside the largest survivor
/// are set to black and the image is cropped to its bounding box.
#[must_use = "returns the cropped plan region"]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn extract_plan_region(image: &RgbaImage, config: &PipelineConfig) -> Option<RgbaImage> {
    let gray = to_gray(image);
    let binary = adaptive_threshold_inv(
        &gray,
        config.wall_block_size,
        config.wall_threshold_constant,
    );
    drop(gray);
    let closed = close(&binary, config.wall_closing_radius);
    drop(binary);

    let image_area = f64::from(image.width()) * f64::from(image.height());
    let contours = external_contours(&closed);
    let candidates = contours.len();
    let region = contours
        .into_iter()
        .filter(|c| c.area >= image_area * MIN_PLAN_AREA_FRACTION)
        .filter_map(|c| {
            let (lo, hi) = bounding_box(&c.points)?;
            let aspect = f64::from(hi.x - lo.x + 1) / f64::from(hi.y - lo.y + 1);
            let (min_aspect, max_aspect) = PLAN_ASPECT_RANGE;
            if aspect <= min_aspect || aspect >= max_aspect {
                return None;
            }
            let hull = convex_hull_area(&c.points);
            let solidity = if hull > 0.0 { c.area / hull } else { 0.0 };
            (solidity >= MIN_PLAN_SOLIDITY).then_some((c, lo, hi))
        })
        .max_by(|a, b| a.0.area.total_cmp(&b.0.area));

    let Some((contour, lo, hi)) = region else {
        debug!(candidates, "no plan region passed the filters");
        return None;
    };

    let mask = polygon_mask(image.width(), image.height(), &contour.points);
    let mut masked = image.clone();
    for (x, y, pixel) in masked.enumerate_pixels_mut() {
        if !mask.get(Point::new(x as i32, y as i32)) {
            *pixel = BACKGROUND;
        }
    }

    let (x, y) = (lo.x.max(0) as u32, lo.y.max(0) as u32);
    let (w, h) = ((hi.x - lo.x + 1) as u32, (hi.y - lo.y + 1) as u32);
    debug!(x, y, w, h, area = contour.area, "plan region cropped");
    Some(imageops::crop_imm(&masked, x, y, w, h).to_image())
}

/// Rectify one photographed floor.
///
/// Returns `None` if the sheet or the plan region cannot be found.
#[must_use = "returns the rectified floor image"]
pub fn rectify(photo: &RgbaImage, config: &PipelineConfig) -> Option<RgbaImage> {
    let gray = to_gray(photo);
    let Some(corners) = find_sheet(&gray, config) else {
        warn!(
            width = photo.width(),
            height = photo.height(),
            "no sheet quadrilateral in photograph"
        );
        return None;
    };
    drop(gray);

    let sheet = warp_sheet(photo, &corners)?;
    let region = extract_plan_region(&sheet, config);
    if region.is_none() {
        warn!(
            width = sheet.width(),
            height = sheet.height(),
            "no plan region on rectified sheet"
        );
    }
    region
}

/// Rectify every floor of a building and bring them to a common scale.
///
/// Results are per floor, in input order. See [`fit_to_reference`] for
/// the scaling rule.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
pub fn rectify_batch(
    photos: &[RgbaImage],
    config: &PipelineConfig,
) -> Result<Vec<Option<RgbaImage>>, PipelineError> {
    config.validate()?;
    let floors = photos.iter().map(|photo| rectify(photo, config)).collect();
    Ok(fit_to_reference(floors, config.reference_width))
}

/// Scale a batch of floor images to a common reference.
///
/// The first present floor is resized to `reference_width`, keeping its
/// aspect ratio; it becomes the reference. Every later floor taller than
/// the reference is scaled down to the reference height. Missing floors
/// stay missing.
#[must_use = "returns the scaled floors"]
pub fn fit_to_reference(floors: Vec<Option<RgbaImage>>, reference_width: u32) -> Vec<Option<RgbaImage>> {
    let mut reference_height: Option<u32> = None;
    floors
        .into_iter()
        .map(|floor| {
            let floor = floor?;
            let (w, h) = floor.dimensions();
            match reference_height {
                None => {
                    let new_h = scaled(h, reference_width, w);
                    reference_height = Some(new_h);
                    Some(imageops::resize(&floor, reference_width, new_h, FilterType::Triangle))
                }
                Some(ref_h) if h > ref_h => {
                    let new_w = scaled(w, ref_h, h);
                    Some(imageops::resize(&floor, new_w, ref_h, FilterType::Triangle))
                }
                Some(_) => Some(floor),
            }
        })
        .collect()
}

/// `value * numerator / denominator`, truncated, at least 1.
fn scaled(value: u32, numerator: u32, denominator: u32) -> u32 {
    let result = u64::from(value) * u64::from(numerator) / u64::from(denominator.max(1));
    u32::try_from(result).unwrap_or(u32::MAX).max(1)
}

/// Make pure black pixels fully transparent.
///
/// Masked-out background of a rectified floor is black; this turns it
/// into transparency for overlay display.
#[must_use = "returns the image with a transparent background"]
pub fn transparent_background(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        if pixel.0[..3] == [0, 0, 0] {
            pixel.0[3] = 0;
        }
    }
    out
}
