//! Walkway skeletonization.
//!
//! Turns a floor image into a one-pixel-wide walkway network:
//!
//! 1. keep gray values inside the walkway band,
//! 2. thin the band mask to medial curves (Zhang-Suen),
//! 3. label 8-connected components of the thinned mask,
//! 4. drop speckle components and components whose size falls in the
//!    label band, bounds excluded (text and legend marks are typically
//!    that size).
//!
//! An image without any walkway ink yields an all-false skeleton.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::edge::gray_band;
use crate::mask::{BinaryMask, Skeleton};
use crate::types::{PipelineConfig, Point};

/// Counts gathered while extracting a skeleton.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonStats {
    /// Pixels inside the walkway gray band.
    pub band_pixels: usize,
    /// Pixels left after thinning.
    pub thinned_pixels: usize,
    /// 8-connected components in the thinned mask.
    pub components: usize,
    /// Components dropped for being smaller than the minimum size.
    pub removed_small: usize,
    /// Components dropped for falling strictly inside the label band.
    pub removed_label_band: usize,
    /// Pixels in the final skeleton.
    pub skeleton_pixels: usize,
}

/// Extract the walkway skeleton from a grayscale floor image.
#[must_use = "returns the walkway skeleton"]
pub fn extract(gray: &GrayImage, config: &PipelineConfig) -> Skeleton {
    extract_with_stats(gray, config).0
}

/// [`extract`], also returning per-step counts.
#[must_use = "returns the walkway skeleton and its statistics"]
pub fn extract_with_stats(gray: &GrayImage, config: &PipelineConfig) -> (Skeleton, SkeletonStats) {
    let band = BinaryMask::from_gray(&gray_band(
        gray,
        config.walkway_gray_low,
        config.walkway_gray_high,
    ));
    let band_pixels = band.count();

    let thinned = thin(&band);
    drop(band);
    let thinned_pixels = thinned.count();

    let (skeleton, prune) = prune_components(
        &thinned,
        config.min_component_pixels,
        (config.label_band_min, config.label_band_max),
    );

    let stats = SkeletonStats {
        band_pixels,
        thinned_pixels,
        components: prune.components,
        removed_small: prune.removed_small,
        removed_label_band: prune.removed_label_band,
        skeleton_pixels: skeleton.count(),
    };
    debug!(
        band_pixels,
        thinned_pixels,
        components = stats.components,
        skeleton_pixels = stats.skeleton_pixels,
        "walkway skeleton extracted"
    );
    (skeleton, stats)
}

/// Zhang-Suen thinning.
///
/// Repeatedly peels boundary pixels in two alternating sub-passes until
/// nothing changes. The result is one pixel wide and keeps the
/// connectivity of the input. Cells outside the mask count as background.
#[must_use = "returns the thinned mask"]
pub fn thin(mask: &BinaryMask) -> BinaryMask {
    let mut current = mask.clone();
    let width = i32::try_from(mask.width()).unwrap_or(i32::MAX);
    let height = i32::try_from(mask.height()).unwrap_or(i32::MAX);

    loop {
        let mut changed = false;
        for pass in 0..2 {
            let mut removals = Vec::new();
            for y in 0..height {
                for x in 0..width {
                    let p = Point::new(x, y);
                    if current.get(p) && should_remove(&current, p, pass) {
                        removals.push(p);
                    }
                }
            }
            changed |= !removals.is_empty();
            for p in removals {
                current.set(p, false);
            }
        }
        if !changed {
            return current;
        }
    }
}

/// Zhang-Suen deletion test for one pixel in sub-pass `pass` (0 or 1).
fn should_remove(mask: &BinaryMask, p: Point, pass: u8) -> bool {
    // Neighbours P2..P9, clockwise starting north.
    let n = [
        mask.get(p.offset(0, -1)),
        mask.get(p.offset(1, -1)),
        mask.get(p.offset(1, 0)),
        mask.get(p.offset(1, 1)),
        mask.get(p.offset(0, 1)),
        mask.get(p.offset(-1, 1)),
        mask.get(p.offset(-1, 0)),
        mask.get(p.offset(-1, -1)),
    ];
    let [p2, _, p4, _, p6, _, p8, _] = n;

    let neighbours = n.iter().filter(|&&v| v).count();
    if !(2..=6).contains(&neighbours) {
        return false;
    }

    let transitions = (0..8).filter(|&i| !n[i] && n[(i + 1) % 8]).count();
    if transitions != 1 {
        return false;
    }

    if pass == 0 {
        !(p2 && p4 && p6) && !(p4 && p6 && p8)
    } else {
        !(p2 && p4 && p8) && !(p2 && p6 && p8)
    }
}

/// Counts from [`prune_components`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Components found.
    pub components: usize,
    /// Components smaller than the minimum size.
    pub removed_small: usize,
    /// Components whose size lies strictly inside the removal band.
    pub removed_label_band: usize,
}

/// Drop 8-connected components with fewer than `min_pixels` pixels, then
/// components whose pixel count lies strictly between the two bounds of
/// `band`. Components exactly at either bound are kept.
#[must_use = "returns the pruned mask and counts"]
pub fn prune_components(
    mask: &BinaryMask,
    min_pixels: usize,
    band: (usize, usize),
) -> (BinaryMask, PruneStats) {
    let (band_min, band_max) = band;
    let labels = connected_components(&mask.to_gray(), Connectivity::Eight, Luma([0u8]));

    // Label 0 is background; labels are dense from 1.
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut sizes = vec![0usize; max_label + 1];
    for p in labels.pixels() {
        sizes[p.0[0] as usize] += 1;
    }

    let mut stats = PruneStats::default();
    let mut keep = vec![false; max_label + 1];
    for (label, &size) in sizes.iter().enumerate().skip(1) {
        if size == 0 {
            continue;
        }
        stats.components += 1;
        if size < min_pixels {
            stats.removed_small += 1;
        } else if band_min < size && size < band_max {
            stats.removed_label_band += 1;
        } else {
            keep[label] = true;
        }
    }

    let pruned = BinaryMask::from_fn(mask.width(), mask.height(), |x, y| {
        keep[labels.get_pixel(x, y).0[0] as usize]
    });
    (pruned, stats)
}
