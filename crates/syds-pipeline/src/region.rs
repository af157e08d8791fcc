//! Region normalization and grouping.
//!
//! Users trace tenant units, toilets, and staircases by hand, so their
//! outlines wobble. [`normalize_region`] turns such an outline into a
//! closed orthogonal polygon; [`group_regions`] classifies a floor's
//! outlines by type into a [`RegionSet`].
//!
//! Each polygon lives in an [`Outline`] together with its breach markers,
//! so that doorway gaps carved later by the breach inserter can never
//! drift out of sync with the vertices they refer to.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::contour::ring_area;
use crate::snap::{Axis, dominant_axis, snap_to_axis};
use crate::types::{PipelineError, Point, Polygon, RawPoint};

/// Classification of a user-drawn region.
///
/// Serialized in lowercase. `unknown` is accepted as an alias of
/// `unclassified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// A rentable unit that produces waste.
    Tenant,
    /// A toilet block.
    Toilet,
    /// A staircase.
    Staircase,
    /// An empty unit.
    Empty,
    /// A region without a (valid) type code.
    #[serde(alias = "unknown")]
    Unclassified,
}

impl RegionKind {
    /// Map a front-end type code to a kind.
    ///
    /// `0` empty, `1` tenant, `2` toilet, `3` staircase. Any other code is
    /// unclassified.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Empty,
            1 => Self::Tenant,
            2 => Self::Toilet,
            3 => Self::Staircase,
            _ => Self::Unclassified,
        }
    }

    /// Lowercase tag used in serialized output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Toilet => "toilet",
            Self::Staircase => "staircase",
            Self::Empty => "empty",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One vertex of an [`Outline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineVertex {
    /// Position.
    pub point: Point,
    /// `true` if the edge leaving this vertex is a doorway gap rather than
    /// a solid wall.
    pub breached: bool,
}

/// A closed polygon whose edges are individually tagged as wall or gap.
///
/// Vertex `i` owns the edge `i -> i + 1`. The last vertex repeats the
/// first, so it owns no edge and is never breached.
///
/// Serializes as `{ "points": [...], "skip": [...] }` where `skip` lists
/// the indices of breached edges, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outline {
    vertices: Vec<OutlineVertex>,
}

impl Outline {
    /// Wrap a polygon with every edge solid.
    #[must_use]
    pub fn from_polygon(polygon: Polygon) -> Self {
        Self {
            vertices: polygon
                .into_points()
                .into_iter()
                .map(|point| OutlineVertex {
                    point,
                    breached: false,
                })
                .collect(),
        }
    }

    /// Build an outline from tagged vertices.
    #[must_use]
    pub const fn from_vertices(vertices: Vec<OutlineVertex>) -> Self {
        Self { vertices }
    }

    /// Tagged vertices.
    #[must_use]
    pub fn vertices(&self) -> &[OutlineVertex] {
        &self.vertices
    }

    /// Untagged polygon.
    #[must_use]
    pub fn polygon(&self) -> Polygon {
        Polygon::new(self.points().collect())
    }

    /// Vertex positions in order.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.vertices.iter().map(|v| v.point)
    }

    /// Indices of breached edges, ascending.
    #[must_use]
    pub fn skip_indices(&self) -> Vec<usize> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.breached)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of breached edges.
    #[must_use]
    pub fn breach_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.breached).count()
    }

    /// Solid wall segments: every non-breached, non-degenerate edge as a
    /// `(from, to)` pair.
    #[must_use]
    pub fn wall_segments(&self) -> Vec<(Point, Point)> {
        self.vertices
            .windows(2)
            .filter(|w| !w[0].breached && w[0].point != w[1].point)
            .map(|w| (w[0].point, w[1].point))
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
struct OutlineProxy {
    points: Vec<Point>,
    #[serde(default)]
    skip: Vec<usize>,
}

impl Serialize for Outline {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OutlineProxy {
            points: self.points().collect(),
            skip: self.skip_indices(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Outline {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = OutlineProxy::deserialize(deserializer)?;
        let edges = proxy.points.len().saturating_sub(1);
        if let Some(&bad) = proxy.skip.iter().find(|&&i| i >= edges) {
            return Err(serde::de::Error::custom(format!(
                "skip index {bad} out of range for {edges} edge(s)"
            )));
        }
        let mut vertices: Vec<OutlineVertex> = proxy
            .points
            .into_iter()
            .map(|point| OutlineVertex {
                point,
                breached: false,
            })
            .collect();
        for i in proxy.skip {
            vertices[i].breached = true;
        }
        Ok(Self { vertices })
    }
}

/// Normalized regions of one floor, grouped by kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionSet(BTreeMap<RegionKind, Vec<Outline>>);

impl RegionSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outline under `kind`.
    pub fn push(&mut self, kind: RegionKind, outline: Outline) {
        self.0.entry(kind).or_default().push(outline);
    }

    /// Outlines of one kind (empty if none).
    #[must_use]
    pub fn get(&self, kind: RegionKind) -> &[Outline] {
        self.0.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Iterate over `(kind, outlines)` in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (RegionKind, &[Outline])> {
        self.0.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Iterate mutably over every outline of every kind.
    pub fn outlines_mut(&mut self) -> impl Iterator<Item = &mut Outline> {
        self.0.values_mut().flatten()
    }

    /// Iterate over every outline of every kind.
    pub fn outlines(&self) -> impl Iterator<Item = &Outline> {
        self.0.values().flatten()
    }

    /// Total number of outlines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// `true` if no outline is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize one hand-drawn outline into a closed orthogonal polygon.
///
/// Vertices are truncated onto the pixel grid. The first is kept; each
/// later vertex is snapped onto the dominant axis through the previous
/// normalized vertex. The final vertex is placed against the *first*
/// vertex instead: its dominant axis relative to the first vertex decides
/// which edge of the closing corner it becomes, and it keeps the other
/// coordinate of the previous vertex, so both closing edges stay
/// orthogonal. Consecutive duplicates are dropped and the ring is closed
/// by repeating the first vertex (an input that already ends on its first
/// vertex is not closed twice).
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateRegion`] for fewer than three
/// vertices, or when the normalized ring encloses no area (all clicks on
/// one pixel or along one line).
pub fn normalize_region(raw: &[RawPoint]) -> Result<Polygon, PipelineError> {
    if raw.len() < 3 {
        return Err(PipelineError::DegenerateRegion { points: raw.len() });
    }
    let points: Vec<Point> = raw.iter().copied().map(RawPoint::truncate).collect();
    let first = points[0];
    let last_index = points.len() - 1;

    let mut ring = Vec::with_capacity(points.len() + 1);
    ring.push(first);
    let mut previous = first;
    for (i, &p) in points.iter().enumerate().skip(1) {
        let next = if i == last_index {
            if p == first {
                // Already closed by the caller.
                break;
            }
            match dominant_axis(first, p) {
                Axis::Horizontal => Point::new(previous.x, first.y),
                Axis::Vertical => Point::new(first.x, previous.y),
            }
        } else {
            snap_to_axis(previous, p)
        };
        ring.push(next);
        previous = next;
    }

    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    // The final placement may coincide with the start of a closing edge
    // that is still diagonal when the caller closed the ring themselves.
    let last = ring.last().copied().unwrap_or(first);
    if last.x != first.x && last.y != first.y {
        ring.push(match dominant_axis(first, last) {
            Axis::Horizontal => Point::new(last.x, first.y),
            Axis::Vertical => Point::new(first.x, last.y),
        });
    }
    // Integer vertices: any enclosed area is at least half a pixel.
    if ring_area(&ring) < 0.5 {
        return Err(PipelineError::DegenerateRegion { points: ring.len() });
    }
    ring.push(first);
    Ok(Polygon::new(ring))
}

/// Normalize and classify every region drawn on a floor.
///
/// `labels` maps the stringified region index to its type code; a missing
/// label leaves the region unclassified. Degenerate regions are skipped
/// with a warning so the rest of the floor still processes.
#[must_use = "returns the grouped regions"]
pub fn group_regions(regions: &[Vec<RawPoint>], labels: &BTreeMap<String, i64>) -> RegionSet {
    let mut set = RegionSet::new();
    for (index, raw) in regions.iter().enumerate() {
        let kind = match labels.get(&index.to_string()) {
            Some(&code) => {
                let kind = RegionKind::from_code(code);
                if kind == RegionKind::Unclassified {
                    warn!(index, code, "unknown region type code, leaving unclassified");
                }
                kind
            }
            None => RegionKind::Unclassified,
        };
        match normalize_region(raw) {
            Ok(polygon) => set.push(kind, Outline::from_polygon(polygon)),
            Err(e) => warn!(index, %kind, error = %e, "skipping region"),
        }
    }
    set
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(points: &[(f64, f64)]) -> Vec<RawPoint> {
        points.iter().map(|&(x, y)| RawPoint::new(x, y)).collect()
    }

    fn pts(points: &[(i32, i32)]) -> Vec<Point> {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    // --- normalize_region ---

    #[test]
    fn wobbly_rectangle_becomes_orthogonal() {
        let polygon =
            normalize_region(&raw(&[(10.0, 10.0), (50.4, 12.0), (52.0, 40.9), (11.0, 38.0)]))
                .unwrap();
        assert_eq!(
            polygon.points(),
            pts(&[(10, 10), (50, 10), (50, 40), (10, 40), (10, 10)]).as_slice()
        );
        assert!(polygon.is_closed());
        assert!(polygon.is_orthogonal());
    }

    #[test]
    fn final_vertex_snaps_against_first() {
        // Last raw vertex is mostly vertical from the first vertex.
        let polygon =
            normalize_region(&raw(&[(0.0, 0.0), (20.0, 1.0), (21.0, 30.0), (3.0, 28.0)])).unwrap();
        assert_eq!(
            polygon.points(),
            pts(&[(0, 0), (20, 0), (20, 30), (0, 30), (0, 0)]).as_slice()
        );
    }

    #[test]
    fn orthogonal_input_is_unchanged() {
        let input = [(0.0, 0.0), (30.0, 0.0), (30.0, 10.0), (15.0, 10.0), (15.0, 20.0), (0.0, 20.0)];
        let polygon = normalize_region(&raw(&input)).unwrap();
        assert_eq!(
            polygon.points(),
            pts(&[(0, 0), (30, 0), (30, 10), (15, 10), (15, 20), (0, 20), (0, 0)]).as_slice()
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let first =
            normalize_region(&raw(&[(3.0, 4.0), (40.0, 6.0), (41.0, 33.0), (2.0, 31.0)])).unwrap();
        let again: Vec<RawPoint> = first
            .points()
            .iter()
            .map(|p| RawPoint::new(f64::from(p.x), f64::from(p.y)))
            .collect();
        assert_eq!(normalize_region(&again).unwrap(), first);
    }

    #[test]
    fn closed_input_is_not_closed_twice() {
        let polygon =
            normalize_region(&raw(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]))
                .unwrap();
        assert_eq!(polygon.len(), 5);
        assert!(polygon.is_orthogonal());
    }

    #[test]
    fn too_few_points_is_degenerate() {
        let result = normalize_region(&raw(&[(0.0, 0.0), (5.0, 5.0)]));
        assert!(matches!(
            result,
            Err(PipelineError::DegenerateRegion { points: 2 })
        ));
    }

    #[test]
    fn coincident_vertices_are_degenerate() {
        let result = normalize_region(&raw(&[(5.2, 5.1), (5.7, 5.9), (5.4, 5.3)]));
        assert!(matches!(
            result,
            Err(PipelineError::DegenerateRegion { points: 1 })
        ));
    }

    #[test]
    fn collinear_vertices_are_degenerate() {
        let result = normalize_region(&raw(&[(0.0, 0.0), (10.0, 0.0), (20.0, 1.0)]));
        assert!(matches!(result, Err(PipelineError::DegenerateRegion { .. })));
    }

    #[test]
    fn fractional_coordinates_truncate() {
        let polygon =
            normalize_region(&raw(&[(0.9, 0.9), (10.7, 0.2), (10.1, 10.99), (0.5, 10.5)])).unwrap();
        assert_eq!(polygon.first(), Some(&Point::new(0, 0)));
        assert!(polygon.points().contains(&Point::new(10, 10)));
    }

    // --- Outline ---

    #[test]
    fn outline_serializes_points_and_skip() {
        let polygon = Polygon::new(pts(&[(0, 0), (4, 0), (4, 4), (0, 0)]));
        let mut vertices = Outline::from_polygon(polygon).vertices().to_vec();
        vertices[1].breached = true;
        let outline = Outline::from_vertices(vertices);

        let json = serde_json::to_value(&outline).unwrap();
        assert_eq!(json["skip"], serde_json::json!([1]));
        assert_eq!(json["points"][1], serde_json::json!({"x": 4, "y": 0}));

        let back: Outline = serde_json::from_value(json).unwrap();
        assert_eq!(back, outline);
    }

    #[test]
    fn out_of_range_skip_is_rejected() {
        let json = r#"{"points": [{"x":0,"y":0},{"x":1,"y":0}], "skip": [1]}"#;
        assert!(serde_json::from_str::<Outline>(json).is_err());
    }

    #[test]
    fn wall_segments_exclude_breached_edges() {
        let polygon = Polygon::new(pts(&[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]));
        let mut vertices = Outline::from_polygon(polygon).vertices().to_vec();
        vertices[2].breached = true;
        let outline = Outline::from_vertices(vertices);

        let segments = outline.wall_segments();
        assert_eq!(segments.len(), 3);
        assert!(!segments.contains(&(Point::new(10, 10), Point::new(0, 10))));
        assert_eq!(outline.skip_indices(), vec![2]);
        assert_eq!(outline.breach_count(), 1);
    }

    // --- grouping ---

    #[test]
    fn regions_group_by_label() {
        let square = raw(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let regions = vec![square.clone(), square.clone(), square.clone(), square];
        let labels: BTreeMap<String, i64> =
            [("0".to_string(), 1), ("1".to_string(), 2), ("2".to_string(), 1)]
                .into_iter()
                .collect();

        let set = group_regions(&regions, &labels);
        assert_eq!(set.get(RegionKind::Tenant).len(), 2);
        assert_eq!(set.get(RegionKind::Toilet).len(), 1);
        assert_eq!(set.get(RegionKind::Unclassified).len(), 1);
        assert!(set.get(RegionKind::Staircase).is_empty());
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn degenerate_region_is_skipped_not_fatal() {
        let regions = vec![
            raw(&[(0.0, 0.0), (1.0, 1.0)]),
            raw(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
        ];
        let labels: BTreeMap<String, i64> =
            [("0".to_string(), 1), ("1".to_string(), 3)].into_iter().collect();
        let set = group_regions(&regions, &labels);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(RegionKind::Staircase).len(), 1);
    }

    #[test]
    fn unknown_code_is_unclassified() {
        assert_eq!(RegionKind::from_code(7), RegionKind::Unclassified);
        assert_eq!(RegionKind::from_code(-1), RegionKind::Unclassified);
        assert_eq!(RegionKind::from_code(3), RegionKind::Staircase);
    }

    #[test]
    fn region_kind_accepts_unknown_alias() {
        let kind: RegionKind = serde_json::from_str(r#""unknown""#).unwrap();
        assert_eq!(kind, RegionKind::Unclassified);
        assert_eq!(serde_json::to_string(&RegionKind::Tenant).unwrap(), r#""tenant""#);
    }

    #[test]
    fn region_set_serializes_as_map() {
        let mut set = RegionSet::new();
        set.push(
            RegionKind::Toilet,
            Outline::from_polygon(Polygon::new(pts(&[(0, 0), (2, 0), (2, 2), (0, 0)]))),
        );
        let json = serde_json::to_value(&set).unwrap();
        assert!(json["toilet"].is_array());
        let back: RegionSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }
}
