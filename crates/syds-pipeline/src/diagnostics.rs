//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for parameter
//! tuning on real floor plans. [`process_floor_with_diagnostics`]
//! collects them alongside the floor model, and
//! [`route_floor_with_diagnostics`] adds the routing stage.
//!
//! The library does not read the system clock itself. Durations come from
//! a caller-supplied [`Clock`]; [`NoClock`] records zero durations when
//! only the counts are wanted.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.
//!
//! [`process_floor_with_diagnostics`]: crate::process_floor_with_diagnostics
//! [`route_floor_with_diagnostics`]: crate::route_floor_with_diagnostics

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::skeleton::SkeletonStats;

/// Source of monotonic timestamps.
///
/// `now` returns the time elapsed since an arbitrary fixed origin; only
/// differences between two readings are used.
pub trait Clock {
    /// Current reading.
    fn now(&self) -> Duration;
}

/// A clock that never advances. Every duration it measures is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    fn now(&self) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Runs closures and records how long each took.
pub(crate) struct StageTimer<'a, C: Clock + ?Sized> {
    clock: &'a C,
    start: Duration,
}

impl<'a, C: Clock + ?Sized> StageTimer<'a, C> {
    pub(crate) fn start(clock: &'a C) -> Self {
        Self {
            clock,
            start: clock.now(),
        }
    }

    /// Run `f`, returning its output and the time it took.
    pub(crate) fn time<T>(&self, f: impl FnOnce() -> T) -> (T, Duration) {
        let before = self.clock.now();
        let out = f();
        (out, self.clock.now().saturating_sub(before))
    }

    /// Time since [`StageTimer::start`].
    pub(crate) fn total(&self) -> Duration {
        self.clock.now().saturating_sub(self.start)
    }
}

/// Diagnostics collected from processing one floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: grayscale conversion of the floor image.
    pub grayscale: StageDiagnostics,
    /// Stage 2: outer wall extraction.
    pub outer_wall: StageDiagnostics,
    /// Stage 3: region normalization and grouping.
    pub regions: StageDiagnostics,
    /// Stage 4: blanking regions out of the floor image.
    pub walkway_isolation: StageDiagnostics,
    /// Stage 5: walkway skeletonization.
    pub skeleton: StageDiagnostics,
    /// Stage 6: wall breach insertion.
    pub breaches: StageDiagnostics,
    /// Stage 7: stitching doors and bins onto the skeleton.
    pub stitching: StageDiagnostics,
    /// Stage 8: route solving (only when the floor was routed).
    pub routes: Option<StageDiagnostics>,
    /// Total wall-clock duration of all recorded stages (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Outer wall metrics.
    OuterWall {
        /// Whether a wall contour was found.
        found: bool,
        /// Vertices of the closed wall polygon (closing point included).
        vertex_count: usize,
    },
    /// Region normalization metrics.
    Regions {
        /// Regions supplied by the caller.
        input_count: usize,
        /// Regions normalized into the region set.
        normalized_count: usize,
        /// Normalized regions per kind tag.
        by_kind: BTreeMap<String, usize>,
    },
    /// Walkway isolation metrics.
    WalkwayIsolation {
        /// Region polygons blanked out of the floor image.
        regions_blanked: usize,
    },
    /// Skeletonization metrics.
    Skeleton(SkeletonStats),
    /// Wall breach metrics.
    Breaches {
        /// Half-width of each doorway gap.
        spacer: i32,
        /// Outlines examined.
        outline_count: usize,
        /// Edges breached.
        breach_count: usize,
    },
    /// Stitching metrics.
    Stitching {
        /// Search radius in pixels.
        radius: u32,
        /// Door anchors supplied.
        doors: usize,
        /// Door anchors connected to the skeleton.
        doors_connected: usize,
        /// Bin anchors supplied.
        bins: usize,
        /// Bin anchors connected to the skeleton.
        bins_connected: usize,
    },
    /// Route solving metrics.
    Routes {
        /// Tenant cells routed.
        tenants: usize,
        /// Tenants with a reachable bin.
        reachable: usize,
        /// Tenants without a reachable bin.
        unreachable: usize,
        /// Cells in the longest route.
        longest_path: usize,
    },
}

/// High-level summary counts for one floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Floor image width in pixels.
    pub image_width: u32,
    /// Floor image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Pixels of the stitched skeleton.
    pub skeleton_pixels: usize,
    /// Vertices of the outer wall, zero when absent.
    pub outer_wall_vertices: usize,
    /// Region outlines in the region set.
    pub region_count: usize,
    /// Edges breached across all outlines.
    pub breach_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Floor Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let mut stages = vec![
            ("Grayscale", &self.grayscale),
            ("Outer Wall", &self.outer_wall),
            ("Regions", &self.regions),
            ("Walkway Isolation", &self.walkway_isolation),
            ("Skeleton", &self.skeleton),
            ("Breaches", &self.breaches),
            ("Stitching", &self.stitching),
        ];
        if let Some(ref routes) = self.routes {
            stages.push(("Routes", routes));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Skeleton pixels: {}  |  Wall vertices: {}  |  Regions: {}  |  Breaches: {}",
            self.summary.skeleton_pixels,
            self.summary.outer_wall_vertices,
            self.summary.region_count,
            self.summary.breach_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::OuterWall {
            found,
            vertex_count,
        } => {
            if *found {
                format!("{vertex_count} vertices")
            } else {
                "not found".to_string()
            }
        }
        StageMetrics::Regions {
            input_count,
            normalized_count,
            by_kind,
        } => {
            let kinds: Vec<String> = by_kind.iter().map(|(k, n)| format!("{k}={n}")).collect();
            format!("{input_count}->{normalized_count} [{}]", kinds.join(" "))
        }
        StageMetrics::WalkwayIsolation { regions_blanked } => {
            format!("{regions_blanked} regions blanked")
        }
        StageMetrics::Skeleton(stats) => format!(
            "band={} thinned={} comps={} -small={} -label={} => {} px",
            stats.band_pixels,
            stats.thinned_pixels,
            stats.components,
            stats.removed_small,
            stats.removed_label_band,
            stats.skeleton_pixels,
        ),
        StageMetrics::Breaches {
            spacer,
            outline_count,
            breach_count,
        } => format!("spacer={spacer} {breach_count} breaches in {outline_count} outlines"),
        StageMetrics::Stitching {
            radius,
            doors,
            doors_connected,
            bins,
            bins_connected,
        } => format!("r={radius} doors={doors_connected}/{doors} bins={bins_connected}/{bins}"),
        StageMetrics::Routes {
            tenants,
            reachable,
            unreachable,
            longest_path,
        } => format!(
            "{tenants} tenants, {reachable} reachable, {unreachable} unreachable, longest={longest_path}",
        ),
    }
}
