//! Axis snapping: forcing edges to be purely horizontal or vertical.
//!
//! An edge is horizontal when its horizontal displacement is at least as
//! large as its vertical one (`|dx| >= |dy|`), vertical otherwise. Ties
//! snap horizontally. Both the outer-wall extractor and the region
//! normalizer use these helpers so they agree on every edge.

use crate::types::Point;

/// The axis an edge is snapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Constant `y`.
    Horizontal,
    /// Constant `x`.
    Vertical,
}

/// Dominant axis of the displacement `from -> to`.
#[must_use]
pub const fn dominant_axis(from: Point, to: Point) -> Axis {
    let dx = (to.x as i64 - from.x as i64).abs();
    let dy = (to.y as i64 - from.y as i64).abs();
    if dx >= dy {
        Axis::Horizontal
    } else {
        Axis::Vertical
    }
}

/// Move `to` onto the dominant axis through `from`.
///
/// `(0,0) -> (5,2)` snaps to `(5,0)`; `(0,0) -> (2,5)` snaps to `(0,5)`.
#[must_use]
pub const fn snap_to_axis(from: Point, to: Point) -> Point {
    match dominant_axis(from, to) {
        Axis::Horizontal => Point::new(to.x, from.y),
        Axis::Vertical => Point::new(from.x, to.y),
    }
}

/// Corner that joins `last` back to `first` with one horizontal and one
/// vertical edge, chosen so the longer displacement is travelled first.
///
/// Returns `None` when the two points already share a row or column.
#[must_use]
pub const fn closing_elbow(last: Point, first: Point) -> Option<Point> {
    if last.x == first.x || last.y == first.y {
        return None;
    }
    Some(match dominant_axis(last, first) {
        Axis::Horizontal => Point::new(first.x, last.y),
        Axis::Vertical => Point::new(last.x, first.y),
    })
}

/// Drop consecutive duplicates and close the ring by repeating the first
/// point.
///
/// An input that already ends on its first point is not closed twice.
/// Returns an empty vector for empty input.
#[must_use]
pub fn close_ring(mut points: Vec<Point>) -> Vec<Point> {
    points.dedup();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if let Some(&first) = points.first() {
        points.push(first);
    }
    points
}
