//! Outer wall extraction.
//!
//! Finds the building outline in a floor image and returns it as a closed
//! orthogonal polygon:
//!
//! 1. inverted adaptive threshold so wall ink becomes foreground,
//! 2. morphological closing to bridge broken wall lines,
//! 3. the external contour enclosing the largest area,
//! 4. polygon approximation relative to the contour perimeter,
//! 5. axis snapping, each vertex relative to the previous snapped vertex.
//!
//! A floor without any contour, or whose largest contour collapses to a
//! point or a line, has no outer wall: the result is `None`, never an
//! empty or degenerate polygon.

use image::GrayImage;
use tracing::debug;

use crate::contour::{largest_external_contour, ring_area};
use crate::edge::{adaptive_threshold_inv, close};
use crate::simplify::{approximate_ring, ring_perimeter};
use crate::snap::{close_ring, closing_elbow, snap_to_axis};
use crate::types::{PipelineConfig, Point, Polygon};

/// Extract the outer wall of a grayscale floor image.
#[must_use = "returns the outer wall polygon, if any"]
pub fn extract(gray: &GrayImage, config: &PipelineConfig) -> Option<Polygon> {
    let binary = adaptive_threshold_inv(
        gray,
        config.wall_block_size,
        config.wall_threshold_constant,
    );
    let closed = close(&binary, config.wall_closing_radius);
    drop(binary);

    let Some(contour) = largest_external_contour(&closed) else {
        debug!("no outer wall contour found");
        return None;
    };

    let tolerance = config.wall_approx_fraction * ring_perimeter(&contour.points);
    let approx = approximate_ring(&contour.points, tolerance);
    let wall = snap_outline(&approx);
    debug!(
        contour_points = contour.points.len(),
        approx_vertices = approx.len(),
        wall_vertices = wall.as_ref().map_or(0, Polygon::len),
        "outer wall extracted"
    );
    wall
}

/// Axis-snap an approximated outline into a closed orthogonal polygon.
///
/// The first vertex is kept. Each later vertex is snapped onto the
/// dominant axis through the previously *snapped* vertex, so corrections
/// accumulate around the ring. Consecutive duplicates created by snapping
/// are dropped, a corner is inserted if the closing edge would be
/// diagonal, and the first point is repeated at the end.
///
/// Returns `None` when the snapped ring encloses no area.
#[must_use = "returns the snapped polygon"]
pub fn snap_outline(vertices: &[Point]) -> Option<Polygon> {
    let (&first, rest) = vertices.split_first()?;

    let mut snapped = Vec::with_capacity(vertices.len() + 2);
    snapped.push(first);
    let mut previous = first;
    for &vertex in rest {
        previous = snap_to_axis(previous, vertex);
        snapped.push(previous);
    }
    if let Some(elbow) = closing_elbow(previous, first) {
        snapped.push(elbow);
    }

    let ring = close_ring(snapped);
    // Integer vertices: any enclosed area is at least half a pixel.
    if ring_area(&ring) < 0.5 {
        debug!(vertices = ring.len(), "outer wall outline is degenerate");
        return None;
    }
    Some(Polygon::new(ring))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Luma;

    /// White sheet with a dark rectangular wall outline of `thickness`.
    fn walled_floor(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32, thickness: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let inside_outer = (x0..=x1).contains(&x) && (y0..=y1).contains(&y);
            let inside_inner = (x0 + thickness..=x1 - thickness).contains(&x)
                && (y0 + thickness..=y1 - thickness).contains(&y);
            if inside_outer && !inside_inner { Luma([0]) } else { Luma([255]) }
        })
    }

    #[test]
    fn blank_floor_has_no_outer_wall() {
        let gray = GrayImage::from_pixel(60, 60, Luma([255]));
        assert!(extract(&gray, &PipelineConfig::default()).is_none());
    }

    #[test]
    fn rectangular_wall_becomes_closed_orthogonal_polygon() {
        let gray = walled_floor(120, 100, 10, 12, 105, 85, 3);
        let wall = extract(&gray, &PipelineConfig::default()).unwrap();
        assert!(wall.is_closed());
        assert!(wall.is_orthogonal(), "{wall:?}");

        let xs: Vec<i32> = wall.points().iter().map(|p| p.x).collect();
        let ys: Vec<i32> = wall.points().iter().map(|p| p.y).collect();
        let (min_x, max_x) = (*xs.iter().min().unwrap(), *xs.iter().max().unwrap());
        let (min_y, max_y) = (*ys.iter().min().unwrap(), *ys.iter().max().unwrap());
        assert!((min_x - 10).abs() <= 3 && (max_x - 105).abs() <= 3);
        assert!((min_y - 12).abs() <= 3 && (max_y - 85).abs() <= 3);
    }

    #[test]
    fn snapping_chains_from_previous_corrected_point() {
        // Second vertex is pulled down to y = 0; the third must snap
        // against (10, 0), not against the raw (10, 2).
        let raw = [
            Point::new(0, 0),
            Point::new(10, 2),
            Point::new(11, 10),
            Point::new(1, 11),
        ];
        let wall = snap_outline(&raw).unwrap();
        assert_eq!(
            wall.points(),
            &[
                Point::new(0, 0),
                Point::new(10, 0),
                Point::new(10, 10),
                Point::new(1, 10),
                Point::new(1, 0),
                Point::new(0, 0),
            ]
        );
        assert!(wall.is_orthogonal());
    }

    #[test]
    fn already_orthogonal_outline_is_unchanged() {
        let raw = [
            Point::new(5, 5),
            Point::new(40, 5),
            Point::new(40, 20),
            Point::new(25, 20),
            Point::new(25, 30),
            Point::new(5, 30),
        ];
        let wall = snap_outline(&raw).unwrap();
        let mut expected = raw.to_vec();
        expected.push(raw[0]);
        assert_eq!(wall.points(), expected.as_slice());
    }

    #[test]
    fn degenerate_outlines_have_no_wall() {
        assert!(snap_outline(&[]).is_none());
        assert!(snap_outline(&[Point::new(3, 4)]).is_none());
        assert!(snap_outline(&[Point::new(3, 4), Point::new(3, 4), Point::new(3, 4)]).is_none());
        assert!(snap_outline(&[Point::new(0, 0), Point::new(10, 1), Point::new(20, 0)]).is_none());
    }

    #[test]
    fn lone_ink_dot_has_no_outer_wall() {
        let mut gray = GrayImage::from_pixel(60, 60, Luma([255]));
        gray.put_pixel(30, 30, Luma([0]));
        assert!(extract(&gray, &PipelineConfig::default()).is_none());
    }
}
