//! Shared types for the floor-plan pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can hand decoded floor
/// images to the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// An integer point in image (pixel / grid cell) coordinates.
///
/// `x` grows to the right, `y` grows downward, matching raster layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Computed in `i64` so it cannot overflow for any pair of `i32` points.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn distance(self, other: Self) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    /// Offset this point by `(dx, dy)`, saturating at the `i32` range.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

/// A user-supplied vertex as it arrives from the drawing front end.
///
/// Coordinates may be fractional; [`RawPoint::truncate`] converts to the
/// integer pixel grid by truncating toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    /// Horizontal position in pixels.
    pub x: f64,
    /// Vertical position in pixels.
    pub y: f64,
}

impl RawPoint {
    /// Create a new raw point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Truncate toward zero onto the integer grid.
    ///
    /// Out-of-range and NaN values saturate (`as` cast semantics).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn truncate(self) -> Point {
        Point::new(self.x as i32, self.y as i32)
    }
}

/// An ordered sequence of integer points.
///
/// Polygons produced by the normalizers are *closed* (first point equals
/// last point) and *orthogonal* (every edge is purely horizontal or purely
/// vertical). Use [`Polygon::is_closed`] and [`Polygon::is_orthogonal`] to
/// check these invariants on arbitrary data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Create a new polygon from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polygon has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polygon (including the
    /// closing duplicate, if present).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polygon and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Iterate over consecutive `(from, to)` point pairs.
    ///
    /// For a closed polygon this visits every edge exactly once; no
    /// implicit wrap-around edge is added.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }

    /// `true` if the polygon is non-empty and its first point equals its
    /// last point.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!((self.0.first(), self.0.last()), (Some(a), Some(b)) if a == b)
    }

    /// `true` if every edge has exactly one of `dx == 0` or `dy == 0`.
    ///
    /// Zero-length edges fail this check.
    #[must_use]
    pub fn is_orthogonal(&self) -> bool {
        self.edges()
            .all(|(a, b)| (a.x == b.x) != (a.y == b.y))
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for the floor-plan pipeline.
///
/// All parameters have defaults matching the values the planning tool has
/// been tuned with. Deserialization fills missing fields from
/// [`PipelineConfig::default`], so partial JSON configs are accepted.
///
/// Call [`PipelineConfig::validate`] before use when the config comes from
/// an untrusted source; the top-level entry points do so.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lowest gray value (inclusive) treated as walkway ink.
    pub walkway_gray_low: u8,

    /// Highest gray value (inclusive) treated as walkway ink.
    pub walkway_gray_high: u8,

    /// Skeleton components with fewer pixels than this are dropped as
    /// speckle noise.
    pub min_component_pixels: usize,

    /// Lower bound (exclusive) of the component-area band that is removed
    /// from the skeleton. Components strictly inside the band are usually
    /// label text and legend marks.
    pub label_band_min: usize,

    /// Upper bound (exclusive) of the removed component-area band.
    pub label_band_max: usize,

    /// Neighbourhood size for the outer-wall adaptive threshold. Must be
    /// odd and at least 3.
    pub wall_block_size: u32,

    /// Constant subtracted from the local mean in the adaptive threshold.
    pub wall_threshold_constant: f32,

    /// Radius of the square structuring element used to close broken wall
    /// lines (radius 2 is a 5x5 square).
    pub wall_closing_radius: u8,

    /// Outer-wall polygon approximation tolerance as a fraction of the
    /// contour perimeter.
    pub wall_approx_fraction: f64,

    /// Half-width of the doorway gap carved where a region edge crosses
    /// the walkway skeleton.
    pub breach_spacer: i32,

    /// How many pixels the stitcher searches in each direction for the
    /// nearest skeleton pixel.
    pub stitch_radius: u32,

    /// Spacing of the standing platform drawn around tenant connections.
    pub stub_spacing: i32,

    /// Quadrilateral approximation tolerance (fraction of perimeter) used
    /// when locating the sheet in a photograph.
    pub quad_approx_fraction: f64,

    /// Width the first normalized floor is resized to; later floors are
    /// scaled to its height.
    pub reference_width: u32,
}

impl PipelineConfig {
    /// Default lower walkway gray bound.
    pub const DEFAULT_WALKWAY_GRAY_LOW: u8 = 50;
    /// Default upper walkway gray bound.
    pub const DEFAULT_WALKWAY_GRAY_HIGH: u8 = 150;
    /// Default minimum skeleton component size.
    pub const DEFAULT_MIN_COMPONENT_PIXELS: usize = 50;
    /// Default lower bound of the removed label band.
    pub const DEFAULT_LABEL_BAND_MIN: usize = 100;
    /// Default upper bound of the removed label band.
    pub const DEFAULT_LABEL_BAND_MAX: usize = 200;
    /// Default adaptive threshold block size.
    pub const DEFAULT_WALL_BLOCK_SIZE: u32 = 15;
    /// Default adaptive threshold constant.
    pub const DEFAULT_WALL_THRESHOLD_CONSTANT: f32 = 5.0;
    /// Default wall closing radius.
    pub const DEFAULT_WALL_CLOSING_RADIUS: u8 = 2;
    /// Default outer-wall approximation fraction (0.3% of perimeter).
    pub const DEFAULT_WALL_APPROX_FRACTION: f64 = 0.003;
    /// Default doorway half-width.
    pub const DEFAULT_BREACH_SPACER: i32 = 5;
    /// Default stitch search radius.
    pub const DEFAULT_STITCH_RADIUS: u32 = 30;
    /// Default standing platform spacing.
    pub const DEFAULT_STUB_SPACING: i32 = 5;
    /// Default quadrilateral approximation fraction (2% of perimeter).
    pub const DEFAULT_QUAD_APPROX_FRACTION: f64 = 0.02;
    /// Default reference width for batch normalization.
    pub const DEFAULT_REFERENCE_WIDTH: u32 = 600;

    /// Check the configuration for inconsistent values.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.walkway_gray_low > self.walkway_gray_high {
            return Err(PipelineError::InvalidConfig(format!(
                "walkway_gray_low ({}) > walkway_gray_high ({})",
                self.walkway_gray_low, self.walkway_gray_high,
            )));
        }
        if self.label_band_min > self.label_band_max {
            return Err(PipelineError::InvalidConfig(format!(
                "label_band_min ({}) > label_band_max ({})",
                self.label_band_min, self.label_band_max,
            )));
        }
        if self.wall_block_size < 3 || self.wall_block_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "wall_block_size must be odd and >= 3, got {}",
                self.wall_block_size,
            )));
        }
        if !self.wall_threshold_constant.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "wall_threshold_constant must be finite".to_string(),
            ));
        }
        for (name, value) in [
            ("wall_approx_fraction", self.wall_approx_fraction),
            ("quad_approx_fraction", self.quad_approx_fraction),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and > 0, got {value}",
                )));
            }
        }
        if self.breach_spacer < 1 {
            return Err(PipelineError::InvalidConfig(format!(
                "breach_spacer must be at least 1, got {}",
                self.breach_spacer,
            )));
        }
        if self.stub_spacing < 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "stub_spacing must be non-negative, got {}",
                self.stub_spacing,
            )));
        }
        if self.stitch_radius == 0 {
            return Err(PipelineError::InvalidConfig(
                "stitch_radius must be at least 1".to_string(),
            ));
        }
        if self.reference_width == 0 {
            return Err(PipelineError::InvalidConfig(
                "reference_width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            walkway_gray_low: Self::DEFAULT_WALKWAY_GRAY_LOW,
            walkway_gray_high: Self::DEFAULT_WALKWAY_GRAY_HIGH,
            min_component_pixels: Self::DEFAULT_MIN_COMPONENT_PIXELS,
            label_band_min: Self::DEFAULT_LABEL_BAND_MIN,
            label_band_max: Self::DEFAULT_LABEL_BAND_MAX,
            wall_block_size: Self::DEFAULT_WALL_BLOCK_SIZE,
            wall_threshold_constant: Self::DEFAULT_WALL_THRESHOLD_CONSTANT,
            wall_closing_radius: Self::DEFAULT_WALL_CLOSING_RADIUS,
            wall_approx_fraction: Self::DEFAULT_WALL_APPROX_FRACTION,
            breach_spacer: Self::DEFAULT_BREACH_SPACER,
            stitch_radius: Self::DEFAULT_STITCH_RADIUS,
            stub_spacing: Self::DEFAULT_STUB_SPACING,
            quad_approx_fraction: Self::DEFAULT_QUAD_APPROX_FRACTION,
            reference_width: Self::DEFAULT_REFERENCE_WIDTH,
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Only malformed input is an error. Missing features (no outer wall, no
/// skeleton pixel near an anchor, unreachable bins) are reported as empty
/// or absent results instead.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image has no pixels.
    #[error("image has no pixels ({0})")]
    EmptyImage(Dimensions),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// A region outline encloses no area once normalized.
    #[error("degenerate region: {points} distinct point(s), no enclosed area")]
    DegenerateRegion {
        /// Number of distinct vertices left.
        points: usize,
    },

    /// The occupancy grid has no cells.
    #[error("occupancy grid is empty")]
    EmptyGrid,

    /// An occupancy grid row differs in width from the first row.
    #[error("occupancy grid row {row} has {found} cells, expected {expected}")]
    RaggedGrid {
        /// Index of the offending row.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },

    /// An occupancy grid cell holds a code outside `0..=3`.
    #[error("occupancy grid cell ({x}, {y}) has unknown code {code}")]
    UnknownCellCode {
        /// Column of the offending cell.
        x: usize,
        /// Row of the offending cell.
        y: usize,
        /// The code found.
        code: i64,
    },
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    EmptyImage(Dimensions),
    InvalidConfig(String),
    DegenerateRegion { points: usize },
    EmptyGrid,
    RaggedGrid { row: usize, expected: usize, found: usize },
    UnknownCellCode { x: usize, y: usize, code: i64 },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::EmptyImage(d) => PipelineErrorProxy::EmptyImage(*d),
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
            Self::DegenerateRegion { points } => {
                PipelineErrorProxy::DegenerateRegion { points: *points }
            }
            Self::EmptyGrid => PipelineErrorProxy::EmptyGrid,
            Self::RaggedGrid {
                row,
                expected,
                found,
            } => PipelineErrorProxy::RaggedGrid {
                row: *row,
                expected: *expected,
                found: *found,
            },
            Self::UnknownCellCode { x, y, code } => PipelineErrorProxy::UnknownCellCode {
                x: *x,
                y: *y,
                code: *code,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The original image::ImageError cannot be reconstructed; keep
            // its message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::EmptyImage(d) => Self::EmptyImage(d),
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PipelineErrorProxy::DegenerateRegion { points } => Self::DegenerateRegion { points },
            PipelineErrorProxy::EmptyGrid => Self::EmptyGrid,
            PipelineErrorProxy::RaggedGrid {
                row,
                expected,
                found,
            } => Self::RaggedGrid {
                row,
                expected,
                found,
            },
            PipelineErrorProxy::UnknownCellCode { x, y, code } => {
                Self::UnknownCellCode { x, y, code }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance_squared() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert_eq!(a.distance_squared(b), 25);
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_distance_does_not_overflow() {
        let a = Point::new(i32::MIN, i32::MIN);
        let b = Point::new(i32::MAX, i32::MAX);
        assert!(a.distance_squared(b) > 0);
    }

    #[test]
    fn point_offset_saturates() {
        assert_eq!(Point::new(i32::MAX, 0).offset(1, -1), Point::new(i32::MAX, -1));
    }

    // --- RawPoint tests ---

    #[test]
    fn raw_point_truncates_toward_zero() {
        assert_eq!(RawPoint::new(3.9, 7.2).truncate(), Point::new(3, 7));
        assert_eq!(RawPoint::new(-0.5, -1.7).truncate(), Point::new(0, -1));
    }

    #[test]
    fn raw_point_accepts_integer_json() {
        let p: RawPoint = serde_json::from_str(r#"{"x": 12, "y": 4.5}"#).unwrap();
        assert_eq!(p.truncate(), Point::new(12, 4));
    }

    // --- Polygon tests ---

    #[test]
    fn polygon_closed_and_orthogonal() {
        let square = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(0, 0),
        ]);
        assert!(square.is_closed());
        assert!(square.is_orthogonal());
        assert_eq!(square.edges().count(), 4);
    }

    #[test]
    fn polygon_with_diagonal_is_not_orthogonal() {
        let tri = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(0, 10),
            Point::new(0, 0),
        ]);
        assert!(tri.is_closed());
        assert!(!tri.is_orthogonal());
    }

    #[test]
    fn zero_length_edge_is_not_orthogonal() {
        let pl = Polygon::new(vec![Point::new(1, 1), Point::new(1, 1)]);
        assert!(!pl.is_orthogonal());
    }

    #[test]
    fn empty_polygon_is_not_closed() {
        let pl = Polygon::new(vec![]);
        assert!(pl.is_empty());
        assert!(!pl.is_closed());
        assert!(pl.first().is_none());
    }

    // --- PipelineConfig tests ---

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.walkway_gray_low, 50);
        assert_eq!(config.walkway_gray_high, 150);
        assert_eq!(config.min_component_pixels, 50);
        assert_eq!(config.label_band_min, 100);
        assert_eq!(config.label_band_max, 200);
        assert_eq!(config.wall_block_size, 15);
        assert!((config.wall_approx_fraction - 0.003).abs() < f64::EPSILON);
        assert_eq!(config.breach_spacer, 5);
        assert_eq!(config.reference_width, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_gray_band_is_rejected() {
        let config = PipelineConfig {
            walkway_gray_low: 200,
            walkway_gray_high: 100,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(ref s)) if s.contains("walkway_gray_low")
        ));
    }

    #[test]
    fn even_block_size_is_rejected() {
        let config = PipelineConfig {
            wall_block_size: 14,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_approx_fraction_is_rejected() {
        let config = PipelineConfig {
            wall_approx_fraction: 0.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"breach_spacer": 8}"#).unwrap();
        assert_eq!(config.breach_spacer, 8);
        assert_eq!(config.stitch_radius, PipelineConfig::DEFAULT_STITCH_RADIUS);
    }

    // --- PipelineError tests ---

    #[test]
    fn error_display_messages() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            PipelineError::RaggedGrid {
                row: 2,
                expected: 5,
                found: 4
            }
            .to_string(),
            "occupancy grid row 2 has 4 cells, expected 5",
        );
        assert_eq!(
            PipelineError::EmptyImage(Dimensions {
                width: 0,
                height: 7
            })
            .to_string(),
            "image has no pixels (0x7)",
        );
    }

    #[test]
    fn pipeline_error_serde_round_trip() {
        let err = PipelineError::UnknownCellCode {
            x: 1,
            y: 2,
            code: 9,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            PipelineError::UnknownCellCode {
                x: 1,
                y: 2,
                code: 9
            }
        ));
    }

    #[test]
    fn pipeline_config_serde_round_trip() {
        let config = PipelineConfig {
            stitch_radius: 12,
            label_band_min: 80,
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
