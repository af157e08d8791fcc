//! Polygon approximation using the Ramer-Douglas-Peucker algorithm.
//!
//! Contours traced from a raster are closed rings with one vertex per
//! boundary pixel. [`approximate_ring`] reduces such a ring to its corners
//! by splitting it at the vertex farthest from the first one and running
//! RDP on both halves. Works on integer points; a zero tolerance keeps
//! every non-collinear vertex and an empty ring stays empty.

use crate::types::Point;

/// Perimeter of a closed ring (the closing edge is included).
#[must_use]
pub fn ring_perimeter(ring: &[Point]) -> f64 {
    match ring {
        [] | [_] => 0.0,
        [first, .., last] => {
            let open: f64 = ring.windows(2).map(|w| w[0].distance(w[1])).sum();
            open + last.distance(*first)
        }
    }
}

/// Approximate a closed ring with fewer vertices.
///
/// `ring` lists each vertex once (no closing duplicate). Vertices within
/// `tolerance` pixels of the chord between their retained neighbors are
/// removed. The result is also an open ring and keeps the orientation of
/// the input. Rings with fewer than 3 vertices are returned unchanged.
#[must_use = "returns the approximated ring"]
pub fn approximate_ring(ring: &[Point], tolerance: f64) -> Vec<Point> {
    let mut ring = ring.to_vec();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return ring;
    }

    // Split at the vertex farthest from the start so both halves are
    // open curves with distinct endpoints.
    let split = (1..ring.len())
        .max_by_key(|&i| ring[0].distance_squared(ring[i]))
        .unwrap_or(1);

    // Walk 0..=split, then split..=len with index `len` standing for 0.
    let mut path: Vec<Point> = ring.clone();
    path.push(ring[0]);
    let mut kept = vec![false; path.len()];
    kept[0] = true;
    kept[split] = true;
    rdp_recurse(&path, 0, split, tolerance, &mut kept);
    rdp_recurse(&path, split, path.len() - 1, tolerance, &mut kept);

    ring.iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
#[allow(clippy::cast_precision_loss)]
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let length_sq = a.distance_squared(b);
    if length_sq == 0 {
        return p.distance(a);
    }

    let dx = i64::from(b.x) - i64::from(a.x);
    let dy = i64::from(b.y) - i64::from(a.y);
    let cross = dx * (i64::from(a.y) - i64::from(p.y)) - dy * (i64::from(a.x) - i64::from(p.x));
    cross.unsigned_abs() as f64 / (length_sq as f64).sqrt()
}
