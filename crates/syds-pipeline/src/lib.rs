//! syds-pipeline: floor-plan image to routable vector model (sans-IO).
//!
//! Turns a floor image plus the operator's annotations into:
//! an outer wall polygon, a walkway skeleton, classified region outlines
//! with doorway breaches, door and bin anchors stitched onto the
//! skeleton, and finally a waste route from every tenant door to its
//! nearest bin.
//!
//! ```text
//! photo --rectify--> floor image --+--> outer wall
//!                                  +--> regions --> breaches
//!                                  +--> walkway skeleton --> stitching --> routes
//! ```
//!
//! This crate has **no I/O dependencies**: it works on in-memory images
//! and byte slices and returns structured, serializable data. Reading
//! files and printing results lives in `syds-bench`.

pub mod breach;
pub mod contour;
pub mod diagnostics;
pub mod edge;
pub mod grayscale;
pub mod mask;
pub mod outer_wall;
pub mod rectify;
pub mod region;
pub mod route;
pub mod simplify;
pub mod skeleton;
pub mod snap;
pub mod stitch;
pub mod types;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use diagnostics::{Clock, NoClock, PipelineDiagnostics};
pub use mask::{BinaryMask, Skeleton};
pub use region::{Outline, RegionKind, RegionSet};
pub use route::{OccupancyGrid, RouteTable, TenantRoute};
pub use stitch::{Connection, StitchMode};
pub use types::{
    Dimensions, GrayImage, PipelineConfig, PipelineError, Point, Polygon, RawPoint, RgbaImage,
};

use diagnostics::{PipelineSummary, StageDiagnostics, StageMetrics, StageTimer};

/// What the operator drew on a floor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorAnnotations {
    /// Free-hand region outlines in image pixel coordinates.
    pub regions: Vec<Vec<RawPoint>>,
    /// Region type codes keyed by stringified region index.
    pub labels: BTreeMap<String, i64>,
    /// Tenant door positions.
    pub doors: Vec<Point>,
    /// Waste bin positions.
    pub bins: Vec<Point>,
}

/// One floor to process.
#[derive(Debug, Clone)]
pub struct FloorInput {
    /// The rectified floor image.
    pub image: RgbaImage,
    /// Operator annotations in the coordinates of `image`.
    pub annotations: FloorAnnotations,
}

impl FloorInput {
    /// Decode an encoded floor image (PNG, JPEG, BMP, WebP).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`], [`PipelineError::ImageDecode`]
    /// or [`PipelineError::EmptyImage`] if the bytes do not hold a usable
    /// image.
    pub fn decode(image_bytes: &[u8], annotations: FloorAnnotations) -> Result<Self, PipelineError> {
        Ok(Self {
            image: grayscale::decode_rgba(image_bytes)?,
            annotations,
        })
    }
}

/// Which kind of point an anchor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    /// A tenant door; stitched with a standing platform.
    Door,
    /// A waste bin; stitched with a plain connector.
    Bin,
}

/// An annotated point and where it joined the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// Door or bin.
    pub kind: AnchorKind,
    /// The annotated position.
    pub point: Point,
    /// The connection made, or `None` if no skeleton pixel was in reach.
    pub connection: Option<Connection>,
}

/// The vector model of one floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorModel {
    /// Floor image size.
    pub dimensions: Dimensions,
    /// Walkway skeleton with door and bin connectors drawn in.
    pub skeleton: Skeleton,
    /// Outer wall, absent when no wall contour was found.
    pub outer_wall: Option<Polygon>,
    /// Normalized, breached region outlines by kind.
    pub regions: RegionSet,
    /// Doors then bins, each in annotation order.
    pub anchors: Vec<Anchor>,
}

impl FloorModel {
    /// Positions of the anchors of `kind`.
    pub fn anchor_points(&self, kind: AnchorKind) -> impl Iterator<Item = Point> + '_ {
        self.anchors
            .iter()
            .filter(move |a| a.kind == kind)
            .map(|a| a.point)
    }

    /// The occupancy grid the floor is routed on.
    #[must_use]
    pub fn occupancy_grid(&self) -> OccupancyGrid {
        let doors: Vec<Point> = self.anchor_points(AnchorKind::Door).collect();
        let bins: Vec<Point> = self.anchor_points(AnchorKind::Bin).collect();
        OccupancyGrid::from_skeleton(&self.skeleton, &doors, &bins)
    }
}

/// Build the vector model of one floor.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid and
/// [`PipelineError::EmptyImage`] for a zero-sized image. Everything that
/// can merely be absent (outer wall, skeleton pixels, connections,
/// degenerate regions) is reported in the model instead.
pub fn process_floor(input: &FloorInput, config: &PipelineConfig) -> Result<FloorModel, PipelineError> {
    process_floor_with_diagnostics(input, config, &NoClock).map(|(model, _)| model)
}

/// [`process_floor`], also returning per-stage diagnostics timed with
/// `clock`.
///
/// # Pipeline steps
///
/// 1. Grayscale conversion
/// 2. Outer wall extraction
/// 3. Region normalization and grouping
/// 4. Walkway isolation (annotated regions blanked out)
/// 5. Skeletonization of the isolated walkway
/// 6. Wall breach insertion against the skeleton
/// 7. Stitching doors (with platforms) then bins onto the skeleton
///
/// # Errors
///
/// Same as [`process_floor`].
pub fn process_floor_with_diagnostics<C: Clock + ?Sized>(
    input: &FloorInput,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(FloorModel, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let image = &input.image;
    let annotations = &input.annotations;
    let dimensions = Dimensions {
        width: image.width(),
        height: image.height(),
    };
    if dimensions.pixel_count() == 0 {
        return Err(PipelineError::EmptyImage(dimensions));
    }

    let timer = StageTimer::start(clock);

    // 1. Grayscale.
    let (gray, grayscale_time) = timer.time(|| grayscale::to_gray(image));

    // 2. Outer wall.
    let (outer_wall, outer_wall_time) = timer.time(|| outer_wall::extract(&gray, config));
    drop(gray);

    // 3. Regions.
    let (mut regions, regions_time) =
        timer.time(|| region::group_regions(&annotations.regions, &annotations.labels));

    // 4. Walkway isolation, on the regions as drawn.
    let (walkway, isolation_time) = timer.time(|| {
        let rings: Vec<Vec<Point>> = annotations
            .regions
            .iter()
            .map(|r| r.iter().copied().map(RawPoint::truncate).collect())
            .collect();
        let isolated = mask::blank_regions(image, rings.iter().map(Vec::as_slice));
        grayscale::to_gray(&isolated)
    });

    // 5. Skeleton.
    let ((skeleton, skeleton_stats), skeleton_time) =
        timer.time(|| skeleton::extract_with_stats(&walkway, config));
    drop(walkway);

    // 6. Breaches.
    let (breach_count, breach_time) =
        timer.time(|| breach::insert_breaches(&mut regions, &skeleton, config.breach_spacer));

    // 7. Stitching.
    let ((skeleton, anchors), stitch_time) =
        timer.time(|| stitch_anchors(&skeleton, annotations, config));

    let connected = |kind: AnchorKind| {
        anchors
            .iter()
            .filter(|a| a.kind == kind && a.connection.is_some())
            .count()
    };
    let by_kind: BTreeMap<String, usize> = regions
        .iter()
        .map(|(kind, outlines)| (kind.as_str().to_string(), outlines.len()))
        .collect();
    let outer_wall_vertices = outer_wall.as_ref().map_or(0, Polygon::len);

    let diagnostics = PipelineDiagnostics {
        grayscale: StageDiagnostics {
            duration: grayscale_time,
            metrics: StageMetrics::Grayscale {
                width: dimensions.width,
                height: dimensions.height,
            },
        },
        outer_wall: StageDiagnostics {
            duration: outer_wall_time,
            metrics: StageMetrics::OuterWall {
                found: outer_wall.is_some(),
                vertex_count: outer_wall_vertices,
            },
        },
        regions: StageDiagnostics {
            duration: regions_time,
            metrics: StageMetrics::Regions {
                input_count: annotations.regions.len(),
                normalized_count: regions.len(),
                by_kind,
            },
        },
        walkway_isolation: StageDiagnostics {
            duration: isolation_time,
            metrics: StageMetrics::WalkwayIsolation {
                regions_blanked: annotations.regions.iter().filter(|r| r.len() >= 3).count(),
            },
        },
        skeleton: StageDiagnostics {
            duration: skeleton_time,
            metrics: StageMetrics::Skeleton(skeleton_stats),
        },
        breaches: StageDiagnostics {
            duration: breach_time,
            metrics: StageMetrics::Breaches {
                spacer: config.breach_spacer,
                outline_count: regions.len(),
                breach_count,
            },
        },
        stitching: StageDiagnostics {
            duration: stitch_time,
            metrics: StageMetrics::Stitching {
                radius: config.stitch_radius,
                doors: annotations.doors.len(),
                doors_connected: connected(AnchorKind::Door),
                bins: annotations.bins.len(),
                bins_connected: connected(AnchorKind::Bin),
            },
        },
        routes: None,
        total_duration: timer.total(),
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            skeleton_pixels: skeleton.count(),
            outer_wall_vertices,
            region_count: regions.len(),
            breach_count,
        },
    };

    debug!(
        %dimensions,
        skeleton_pixels = diagnostics.summary.skeleton_pixels,
        regions = regions.len(),
        breaches = breach_count,
        "floor processed"
    );

    let model = FloorModel {
        dimensions,
        skeleton,
        outer_wall,
        regions,
        anchors,
    };
    Ok((model, diagnostics))
}

/// Stitch doors in tenant-connection mode, then bins plainly, each
/// seeing the connectors drawn before it.
fn stitch_anchors(
    skeleton: &Skeleton,
    annotations: &FloorAnnotations,
    config: &PipelineConfig,
) -> (Skeleton, Vec<Anchor>) {
    let door_mode = StitchMode::TenantConnection {
        spacing: config.stub_spacing,
    };
    let (with_doors, door_connections) =
        stitch::stitch_all(&annotations.doors, skeleton, config.stitch_radius, door_mode);
    let (stitched, bin_connections) = stitch::stitch_all(
        &annotations.bins,
        &with_doors,
        config.stitch_radius,
        StitchMode::Plain,
    );

    let tag = |kind: AnchorKind, points: &[Point], connections: Vec<Option<Connection>>| {
        points
            .iter()
            .zip(connections)
            .map(move |(&point, connection)| Anchor {
                kind,
                point,
                connection,
            })
            .collect::<Vec<_>>()
    };
    let mut anchors = tag(AnchorKind::Door, &annotations.doors, door_connections);
    anchors.extend(tag(AnchorKind::Bin, &annotations.bins, bin_connections));
    (stitched, anchors)
}

/// Process several floors independently.
///
/// One result per input, in order; a failing floor does not affect the
/// others.
#[must_use = "returns one result per floor"]
pub fn process_floors(
    inputs: &[FloorInput],
    config: &PipelineConfig,
) -> Vec<Result<FloorModel, PipelineError>> {
    inputs
        .iter()
        .enumerate()
        .map(|(floor, input)| {
            let result = process_floor(input, config);
            if let Err(ref e) = result {
                warn!(floor, error = %e, "floor failed");
            }
            result
        })
        .collect()
}

/// Route every tenant door of a processed floor to its nearest bin
/// along the stitched skeleton.
#[must_use = "returns the route table"]
pub fn route_floor(model: &FloorModel) -> RouteTable {
    route::solve_routes(&model.occupancy_grid())
}

/// [`route_floor`], recording the routing stage in `diagnostics`.
pub fn route_floor_with_diagnostics<C: Clock + ?Sized>(
    model: &FloorModel,
    diagnostics: &mut PipelineDiagnostics,
    clock: &C,
) -> RouteTable {
    let timer = StageTimer::start(clock);
    let (table, duration) = timer.time(|| route_floor(model));
    let longest_path = table.routes.iter().map(|r| r.path.len()).max().unwrap_or(0);
    diagnostics.routes = Some(StageDiagnostics {
        duration,
        metrics: StageMetrics::Routes {
            tenants: table.routes.len(),
            reachable: table.reachable(),
            unreachable: table.unreachable(),
            longest_path,
        },
    });
    diagnostics.total_duration += duration;
    table
}
