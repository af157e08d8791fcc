//! Path stitching: connecting points of interest to the walkway skeleton.
//!
//! Tenant doorways and bins rarely sit exactly on the skeleton. The
//! stitcher looks outward from a point along the four cardinal directions
//! (left, right, up, down, in that order) for the nearest skeleton pixel
//! and draws a straight connector to it on a copy of the skeleton.
//!
//! In tenant-connection mode a small standing platform is drawn as well:
//! a stub across the connector at the point itself, and a second one a
//! stub-spacing further along, so a routing agent can approach the door
//! from either side.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mask::Skeleton;
use crate::types::Point;

/// A cardinal scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Decreasing `x`.
    Left,
    /// Increasing `x`.
    Right,
    /// Decreasing `y`.
    Up,
    /// Increasing `y`.
    Down,
}

impl Direction {
    /// Scan order. Ties between equally distant hits go to the earlier
    /// direction.
    pub const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Up, Self::Down];

    /// Unit step `(dx, dy)`.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }

    /// Unit step rotated a quarter turn.
    #[must_use]
    pub const fn perpendicular(self) -> (i32, i32) {
        let (dx, dy) = self.delta();
        (-dy, dx)
    }
}

/// How a point is attached to the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum StitchMode {
    /// Connector line only.
    #[default]
    Plain,
    /// Connector plus a standing platform of stubs `2 * spacing` long.
    TenantConnection {
        /// Half-length of each stub, and the distance between the stubs.
        spacing: i32,
    },
}

/// Where a point was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// The skeleton pixel the connector ends on.
    pub point: Point,
    /// Direction from the origin to `point`.
    pub direction: Direction,
    /// Steps from the origin to `point`.
    pub distance: u32,
}

/// Result of stitching one point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stitch {
    /// The skeleton with the connector drawn in. Identical to the input
    /// when no connection was found.
    pub skeleton: Skeleton,
    /// The chosen connection, if any skeleton pixel was within reach.
    pub connection: Option<Connection>,
}

/// Find the nearest skeleton pixel from `origin` along the four cardinal
/// directions, looking at most `radius` steps out.
///
/// Each direction stops at the first skeleton pixel or at the skeleton
/// edge. The origin itself is not considered.
#[must_use]
pub fn nearest_skeleton_point(origin: Point, skeleton: &Skeleton, radius: u32) -> Option<Connection> {
    let mut best: Option<Connection> = None;
    for direction in Direction::ALL {
        let (dx, dy) = direction.delta();
        for step in 1..=radius {
            let Ok(s) = i32::try_from(step) else {
                break;
            };
            let p = origin.offset(dx.saturating_mul(s), dy.saturating_mul(s));
            if !skeleton.contains(p) {
                break;
            }
            if skeleton.get(p) {
                if best.is_none_or(|b| step < b.distance) {
                    best = Some(Connection {
                        point: p,
                        direction,
                        distance: step,
                    });
                }
                break;
            }
        }
    }
    best
}

/// Attach `origin` to the nearest skeleton pixel within `radius`.
///
/// The input skeleton is never modified. When nothing is in reach the
/// returned skeleton is an unmodified copy and `connection` is `None`.
#[must_use = "returns the stitched skeleton"]
pub fn stitch(origin: Point, skeleton: &Skeleton, radius: u32, mode: StitchMode) -> Stitch {
    let mut out = skeleton.clone();
    let connection = stitch_into(&mut out, origin, radius, mode);
    Stitch {
        skeleton: out,
        connection,
    }
}

/// Stitch several points in turn, each seeing the connectors drawn for
/// the points before it.
///
/// Returns the final skeleton and one optional connection per anchor, in
/// input order.
#[must_use = "returns the stitched skeleton and connections"]
pub fn stitch_all(
    anchors: &[Point],
    skeleton: &Skeleton,
    radius: u32,
    mode: StitchMode,
) -> (Skeleton, Vec<Option<Connection>>) {
    let mut out = skeleton.clone();
    let connections: Vec<Option<Connection>> = anchors
        .iter()
        .map(|&anchor| stitch_into(&mut out, anchor, radius, mode))
        .collect();
    debug!(
        anchors = anchors.len(),
        connected = connections.iter().flatten().count(),
        "anchors stitched to skeleton"
    );
    (out, connections)
}

fn stitch_into(
    skeleton: &mut Skeleton,
    origin: Point,
    radius: u32,
    mode: StitchMode,
) -> Option<Connection> {
    let Some(connection) = nearest_skeleton_point(origin, skeleton, radius) else {
        debug!(x = origin.x, y = origin.y, radius, "no skeleton pixel in reach");
        return None;
    };

    skeleton.draw_line(origin, connection.point);
    if let StitchMode::TenantConnection { spacing } = mode {
        draw_platform(skeleton, origin, connection, spacing);
    }
    Some(connection)
}

/// Stub across the connector at the origin, plus a parallel stub one
/// `spacing` along the connector when the connector is longer than that.
fn draw_platform(skeleton: &mut Skeleton, origin: Point, connection: Connection, spacing: i32) {
    if spacing <= 0 {
        return;
    }
    let (px, py) = connection.direction.perpendicular();
    let mut stub = |center: Point| {
        skeleton.draw_line(
            center.offset(px.saturating_mul(-spacing), py.saturating_mul(-spacing)),
            center.offset(px.saturating_mul(spacing), py.saturating_mul(spacing)),
        );
    };
    stub(origin);

    if i64::from(connection.distance) > i64::from(spacing) {
        let (dx, dy) = connection.direction.delta();
        stub(origin.offset(dx.saturating_mul(spacing), dy.saturating_mul(spacing)));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask::BinaryMask;

    /// 40x40 skeleton with a horizontal walkway along row `y`.
    fn horizontal_walkway(y: i32) -> Skeleton {
        BinaryMask::from_fn(40, 40, |_, cy| i32::try_from(cy).unwrap() == y)
    }

    #[test]
    fn no_hit_returns_identical_skeleton() {
        let skeleton = horizontal_walkway(35);
        let result = stitch(Point::new(20, 5), &skeleton, 10, StitchMode::Plain);
        assert!(result.connection.is_none());
        assert_eq!(result.skeleton, skeleton);
    }

    #[test]
    fn connector_reaches_nearest_pixel() {
        let skeleton = horizontal_walkway(30);
        let result = stitch(Point::new(20, 22), &skeleton, 10, StitchMode::Plain);
        let connection = result.connection.unwrap();
        assert_eq!(connection.point, Point::new(20, 30));
        assert_eq!(connection.direction, Direction::Down);
        assert_eq!(connection.distance, 8);
        for y in 22..=30 {
            assert!(result.skeleton.get(Point::new(20, y)), "missing y = {y}");
        }
        assert_eq!(result.skeleton.count(), skeleton.count() + 8);
        // Input untouched.
        assert!(!skeleton.get(Point::new(20, 22)));
    }

    #[test]
    fn closest_direction_wins() {
        let mut skeleton = BinaryMask::new(40, 40);
        skeleton.set(Point::new(10, 20), true); // 10 left
        skeleton.set(Point::new(20, 14), true); // 6 up
        let c = nearest_skeleton_point(Point::new(20, 20), &skeleton, 15).unwrap();
        assert_eq!(c.direction, Direction::Up);
        assert_eq!(c.point, Point::new(20, 14));
    }

    #[test]
    fn ties_follow_scan_order() {
        let mut skeleton = BinaryMask::new(40, 40);
        skeleton.set(Point::new(25, 20), true); // right
        skeleton.set(Point::new(20, 15), true); // up
        skeleton.set(Point::new(15, 20), true); // left
        let c = nearest_skeleton_point(Point::new(20, 20), &skeleton, 10).unwrap();
        assert_eq!(c.direction, Direction::Left);

        skeleton.set(Point::new(15, 20), false);
        let c = nearest_skeleton_point(Point::new(20, 20), &skeleton, 10).unwrap();
        assert_eq!(c.direction, Direction::Right);
    }

    #[test]
    fn radius_bounds_the_search() {
        let skeleton = horizontal_walkway(30);
        assert!(nearest_skeleton_point(Point::new(20, 20), &skeleton, 9).is_none());
        assert!(nearest_skeleton_point(Point::new(20, 20), &skeleton, 10).is_some());
    }

    #[test]
    fn scan_stops_at_skeleton_edge() {
        let skeleton = horizontal_walkway(0);
        // Origin outside the skeleton: the first step in every direction
        // is already out of bounds.
        assert!(nearest_skeleton_point(Point::new(41, 0), &skeleton, 5).is_none());
        let c = nearest_skeleton_point(Point::new(3, 3), &skeleton, 5).unwrap();
        assert_eq!(c.point, Point::new(3, 0));
    }

    #[test]
    fn tenant_connection_draws_platform() {
        let skeleton = horizontal_walkway(30);
        let result = stitch(
            Point::new(20, 20),
            &skeleton,
            15,
            StitchMode::TenantConnection { spacing: 3 },
        );
        let c = result.connection.unwrap();
        assert_eq!(c.distance, 10);
        // Stub across the connector at the door.
        for x in 17..=23 {
            assert!(result.skeleton.get(Point::new(x, 20)), "door stub x = {x}");
        }
        // Second stub one spacing toward the walkway.
        for x in 17..=23 {
            assert!(result.skeleton.get(Point::new(x, 23)), "offset stub x = {x}");
        }
        assert!(!result.skeleton.get(Point::new(17, 22)));
    }

    #[test]
    fn short_connection_skips_offset_stub() {
        let skeleton = horizontal_walkway(22);
        let result = stitch(
            Point::new(20, 20),
            &skeleton,
            15,
            StitchMode::TenantConnection { spacing: 3 },
        );
        assert_eq!(result.connection.unwrap().distance, 2);
        // Door stub (7) + connector interior (1).
        assert_eq!(result.skeleton.count(), skeleton.count() + 8);
    }

    #[test]
    fn stitch_all_accumulates_connectors() {
        let skeleton = horizontal_walkway(30);
        let anchors = [Point::new(5, 25), Point::new(10, 25), Point::new(35, 2)];
        let (out, connections) = stitch_all(&anchors, &skeleton, 20, StitchMode::Plain);
        assert_eq!(connections.len(), 3);
        assert_eq!(connections[0].unwrap().point, Point::new(5, 30));
        // The first connector is as close as the walkway and comes first
        // in scan order.
        let second = connections[1].unwrap();
        assert_eq!(second.direction, Direction::Left);
        assert_eq!(second.point, Point::new(5, 25));
        assert!(connections[2].is_none());
        assert!(out.get(Point::new(7, 25)));
    }
}
