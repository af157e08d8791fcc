//! Contour tracing: extract outer boundaries from a binary raster.
//!
//! Wraps Suzuki-Abe border following
//! ([`imageproc::contours::find_contours`]) and keeps only *external*
//! contours, the outer borders that no other foreground region encloses.
//! The outer-wall extractor and the sheet detector both pick the largest
//! external contour by enclosed area.

use image::GrayImage;
use imageproc::contours::BorderType;

use crate::types::Point;

/// An external contour traced around an 8-connected foreground region.
///
/// `points` lists every boundary pixel once, in tracing order, without a
/// closing duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedContour {
    /// Boundary pixels.
    pub points: Vec<Point>,
    /// Area enclosed by the boundary (shoelace formula).
    pub area: f64,
}

impl TracedContour {
    fn new(points: Vec<Point>) -> Self {
        let area = ring_area(&points);
        Self { points, area }
    }
}

/// Trace the external contours of all non-zero regions in `binary`.
///
/// The image is padded by one background pixel before tracing so that
/// regions touching the image border are traced like any other.
#[must_use = "returns the traced contours"]
pub fn external_contours(binary: &GrayImage) -> Vec<TracedContour> {
    let padded = GrayImage::from_fn(binary.width() + 2, binary.height() + 2, |x, y| {
        if x == 0 || y == 0 || x > binary.width() || y > binary.height() {
            image::Luma([0])
        } else {
            *binary.get_pixel(x - 1, y - 1)
        }
    });

    imageproc::contours::find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            TracedContour::new(
                c.points
                    .into_iter()
                    .map(|p| Point::new(p.x - 1, p.y - 1))
                    .collect(),
            )
        })
        .collect()
}

/// The external contour enclosing the largest area, if any.
///
/// Single-pixel and line-shaped contours have zero area but are still
/// candidates when nothing larger exists.
#[must_use]
pub fn largest_external_contour(binary: &GrayImage) -> Option<TracedContour> {
    external_contours(binary)
        .into_iter()
        .max_by(|a, b| a.area.total_cmp(&b.area))
}

/// Area enclosed by a ring of points (shoelace formula, unsigned).
#[must_use]
pub fn ring_area(ring: &[Point]) -> f64 {
    let pts: Vec<imageproc::point::Point<i32>> = ring
        .iter()
        .map(|p| imageproc::point::Point::new(p.x, p.y))
        .collect();
    imageproc::geometry::contour_area(&pts)
}

/// Area of the convex hull of a ring of points.
#[must_use]
pub fn convex_hull_area(ring: &[Point]) -> f64 {
    let pts: Vec<imageproc::point::Point<i32>> = ring
        .iter()
        .map(|p| imageproc::point::Point::new(p.x, p.y))
        .collect();
    if pts.len() < 3 {
        return 0.0;
    }
    imageproc::geometry::contour_area(&imageproc::geometry::convex_hull(pts))
}

/// Axis-aligned bounding box `(min, max)` of a set of points, inclusive.
#[must_use]
pub fn bounding_box(points: &[Point]) -> Option<(Point, Point)> {
    let first = *points.first()?;
    Some(points.iter().fold((first, first), |(lo, hi), p| {
        (
            Point::new(lo.x.min(p.x), lo.y.min(p.y)),
            Point::new(hi.x.max(p.x), hi.y.max(p.y)),
        )
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (x0..=x1).contains(&x) && (y0..=y1).contains(&y) {
                image::Luma([255])
            } else {
                image::Luma([0])
            }
        })
    }

    #[test]
    fn blank_image_has_no_contours() {
        let img = GrayImage::new(10, 10);
        assert!(external_contours(&img).is_empty());
        assert!(largest_external_contour(&img).is_none());
    }

    #[test]
    fn filled_rectangle_traces_its_border() {
        let img = filled_rect(20, 20, 4, 5, 13, 11);
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        let bbox = bounding_box(&contours[0].points).unwrap();
        assert_eq!(bbox, (Point::new(4, 5), Point::new(13, 11)));
        assert!((contours[0].area - 54.0).abs() < 1e-9);
    }

    #[test]
    fn region_touching_image_border_is_traced() {
        let img = filled_rect(10, 10, 0, 0, 9, 9);
        let contour = largest_external_contour(&img).unwrap();
        let bbox = bounding_box(&contour.points).unwrap();
        assert_eq!(bbox, (Point::new(0, 0), Point::new(9, 9)));
    }

    #[test]
    fn nested_region_is_not_external() {
        // A hollow square with a dot inside: only the outer square counts.
        let img = GrayImage::from_fn(20, 20, |x, y| {
            let ring = (2..=17).contains(&x)
                && (2..=17).contains(&y)
                && !((4..=15).contains(&x) && (4..=15).contains(&y));
            let dot = (9..=10).contains(&x) && (9..=10).contains(&y);
            image::Luma([if ring || dot { 255 } else { 0 }])
        });
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
    }

    #[test]
    fn largest_contour_wins() {
        let mut img = filled_rect(40, 20, 1, 1, 5, 5);
        for y in 8..18 {
            for x in 10..35 {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
        let contour = largest_external_contour(&img).unwrap();
        let bbox = bounding_box(&contour.points).unwrap();
        assert_eq!(bbox, (Point::new(10, 8), Point::new(34, 17)));
    }

    #[test]
    fn convex_hull_of_l_shape_is_larger() {
        let l_shape = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 4),
            Point::new(4, 4),
            Point::new(4, 10),
            Point::new(0, 10),
        ];
        let area = ring_area(&l_shape);
        let hull = convex_hull_area(&l_shape);
        assert!((area - 64.0).abs() < 1e-9);
        assert!(hull > area);
    }
}
