//! Wall breach insertion.
//!
//! Where a region edge crosses the walkway skeleton there is a doorway.
//! For every axis-aligned edge the first skeleton pixel along the edge
//! (scanning in ascending coordinate order) is located and a gap of up to
//! `2 * spacer` pixels is carved around it: two new vertices are inserted
//! on the edge and the span between them is tagged as breached so it is
//! not drawn as a wall.
//!
//! Gap vertices follow the edge's own direction, so the winding of the
//! outline is preserved. Edges without a skeleton hit are left as they
//! are. Each edge is breached at most once.

use tracing::debug;

use crate::mask::Skeleton;
use crate::region::{Outline, OutlineVertex, RegionSet};
use crate::snap::Axis;
use crate::types::Point;

/// Carve doorway gaps into every outline of `regions`, in place.
///
/// Returns the number of edges breached.
pub fn insert_breaches(regions: &mut RegionSet, skeleton: &Skeleton, spacer: i32) -> usize {
    let mut total = 0;
    for outline in regions.outlines_mut() {
        let before = outline.breach_count();
        *outline = breach_outline(outline, skeleton, spacer);
        total += outline.breach_count() - before;
    }
    debug!(breaches = total, spacer, "wall breaches inserted");
    total
}

/// Carve doorway gaps into one outline, returning the new outline.
///
/// Edges that are already breached, have zero length, or are not
/// axis-aligned are copied unchanged.
#[must_use = "returns the breached outline"]
pub fn breach_outline(outline: &Outline, skeleton: &Skeleton, spacer: i32) -> Outline {
    let vertices = outline.vertices();
    let mut out: Vec<OutlineVertex> = Vec::with_capacity(vertices.len() + 4);

    for (i, &vertex) in vertices.iter().enumerate() {
        out.push(vertex);
        let Some(&next) = vertices.get(i + 1) else {
            break;
        };
        if vertex.breached {
            continue;
        }
        let Some((gap_start, gap_end)) = find_gap(vertex.point, next.point, skeleton, spacer)
        else {
            continue;
        };

        if gap_start == vertex.point {
            if let Some(last) = out.last_mut() {
                last.breached = true;
            }
        } else {
            out.push(OutlineVertex {
                point: gap_start,
                breached: true,
            });
        }
        if gap_end != next.point {
            out.push(OutlineVertex {
                point: gap_end,
                breached: false,
            });
        }
    }

    Outline::from_vertices(out)
}

/// Locate the doorway gap on the edge `from -> to`.
///
/// Returns the two gap endpoints in edge order, or `None` if the edge is
/// not axis-aligned or never meets the skeleton.
#[must_use]
pub fn find_gap(from: Point, to: Point, skeleton: &Skeleton, spacer: i32) -> Option<(Point, Point)> {
    let axis = match (from.x == to.x, from.y == to.y) {
        (true, false) => Axis::Vertical,
        (false, true) => Axis::Horizontal,
        _ => return None,
    };

    // Position along the edge, and the fixed coordinate.
    let (start, end, fixed, extent) = match axis {
        Axis::Horizontal => (from.x, to.x, from.y, skeleton.width()),
        Axis::Vertical => (from.y, to.y, from.x, skeleton.height()),
    };
    let at = |c: i32| match axis {
        Axis::Horizontal => Point::new(c, fixed),
        Axis::Vertical => Point::new(fixed, c),
    };

    let lo = start.min(end);
    let hi = start.max(end);
    let last_cell = i32::try_from(extent).unwrap_or(i32::MAX).saturating_sub(1);
    let hit = (lo.max(0)..=hi.min(last_cell)).find(|&c| skeleton.get(at(c)))?;

    let gap_lo = hit.saturating_sub(spacer).max(lo);
    let gap_hi = hit.saturating_add(spacer).min(hi);
    if start <= end {
        Some((at(gap_lo), at(gap_hi)))
    } else {
        Some((at(gap_hi), at(gap_lo)))
    }
}
