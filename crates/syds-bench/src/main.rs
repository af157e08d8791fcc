//! syds-bench: CLI tool for running the floor-plan pipeline on files.
//!
//! Processes a floor image (plus its annotation JSON) with configurable
//! parameters, printing per-stage diagnostics and optionally the floor
//! model and route table. A second subcommand rectifies photographed
//! plan sheets into clean floor images. Useful for:
//!
//! - Tuning the walkway gray band, label band, and stitch radius
//! - Measuring per-stage durations to identify bottlenecks
//! - Checking which tenant doors reach a bin
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin syds-bench -- floor [OPTIONS] <IMAGE_PATH>
//! cargo run --release --bin syds-bench -- rectify [OPTIONS] <PHOTO>...
//! ```
//!
//! Log output goes to stderr and is filtered with `RUST_LOG`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use syds_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use syds_pipeline::{FloorAnnotations, FloorInput, FloorModel, PipelineConfig, RouteTable};
use tracing_subscriber::EnvFilter;

/// Floor-plan pipeline runner and diagnostics.
///
/// Runs the pipeline on floor images with configurable parameters and
/// prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "syds-bench", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one floor image into a floor model.
    Floor(FloorArgs),
    /// Rectify photographed plan sheets into floor images.
    Rectify(RectifyArgs),
}

#[derive(Args)]
struct FloorArgs {
    /// Path to the floor image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Annotation JSON: regions, labels, doors, bins.
    #[arg(long)]
    annotations: Option<PathBuf>,

    #[command(flatten)]
    params: ParamArgs,

    /// Also solve door-to-bin routes.
    #[arg(long)]
    routes: bool,

    /// Write the floor model (and route table, with `--routes`) as JSON.
    #[arg(long)]
    model_out: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RectifyArgs {
    /// Photos of plan sheets, one per floor, in floor order.
    #[arg(required = true)]
    photos: Vec<PathBuf>,

    /// Directory for the rectified floor images (`floor-<n>.png`).
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Make the black background transparent.
    #[arg(long)]
    transparent: bool,

    #[command(flatten)]
    params: ParamArgs,
}

#[derive(Args)]
struct ParamArgs {
    /// Lowest gray value treated as walkway.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WALKWAY_GRAY_LOW)]
    walkway_gray_low: u8,

    /// Highest gray value treated as walkway.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WALKWAY_GRAY_HIGH)]
    walkway_gray_high: u8,

    /// Skeleton components smaller than this are dropped.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_COMPONENT_PIXELS)]
    min_component_pixels: usize,

    /// Lower bound of the component size band removed as label text.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_LABEL_BAND_MIN)]
    label_band_min: usize,

    /// Upper bound of the component size band removed as label text.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_LABEL_BAND_MAX)]
    label_band_max: usize,

    /// Half-width of a wall breach, in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BREACH_SPACER)]
    breach_spacer: i32,

    /// Search radius when stitching doors and bins to the skeleton.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STITCH_RADIUS)]
    stitch_radius: u32,

    /// Width every rectified floor is scaled to match.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_REFERENCE_WIDTH)]
    reference_width: u32,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(params: &ParamArgs) -> Result<PipelineConfig, String> {
    if let Some(ref json) = params.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        walkway_gray_low: params.walkway_gray_low,
        walkway_gray_high: params.walkway_gray_high,
        min_component_pixels: params.min_component_pixels,
        label_band_min: params.label_band_min,
        label_band_max: params.label_band_max,
        breach_spacer: params.breach_spacer,
        stitch_radius: params.stitch_radius,
        reference_width: params.reference_width,
        ..PipelineConfig::default()
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Floor(args) => run_floor(&args),
        Command::Rectify(args) => run_rectify(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn read_annotations(path: Option<&Path>) -> Result<FloorAnnotations, String> {
    let Some(path) = path else {
        return Ok(FloorAnnotations::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

fn run_floor(args: &FloorArgs) -> Result<(), String> {
    let config = config_from_cli(&args.params)?;

    let image_bytes = std::fs::read(&args.image_path)
        .map_err(|e| format!("Error reading {}: {e}", args.image_path.display()))?;
    let annotations = read_annotations(args.annotations.as_deref())?;
    let input = FloorInput::decode(&image_bytes, annotations)
        .map_err(|e| format!("Error decoding {}: {e}", args.image_path.display()))?;

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        args.image_path.display(),
        image_bytes.len(),
        input.image.width(),
        input.image.height(),
    );
    eprintln!(
        "Annotations: {} regions, {} doors, {} bins",
        input.annotations.regions.len(),
        input.annotations.doors.len(),
        input.annotations.bins.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", args.runs);
    eprintln!();

    let clock = StdClock::new();
    let mut all_diagnostics = Vec::with_capacity(args.runs);

    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }

        let (model, mut diagnostics) =
            syds_pipeline::process_floor_with_diagnostics(&input, &config, &clock)
                .map_err(|e| format!("Pipeline error: {e}"))?;
        let routes = args
            .routes
            .then(|| syds_pipeline::route_floor_with_diagnostics(&model, &mut diagnostics, &clock));

        if args.json {
            let json = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("{}", diagnostics.report());
            if let Some(ref table) = routes {
                print_routes(table);
            }
        }

        // Write the model on the first run only.
        if run == 0
            && let Some(ref path) = args.model_out
        {
            write_model(path, &model, routes.as_ref())?;
        }

        all_diagnostics.push(diagnostics);

        if args.runs > 1 {
            eprintln!();
        }
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    Ok(())
}

#[derive(serde::Serialize)]
struct ModelOutput<'a> {
    model: &'a FloorModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    routes: Option<&'a RouteTable>,
}

fn write_model(path: &Path, model: &FloorModel, routes: Option<&RouteTable>) -> Result<(), String> {
    let json = serde_json::to_string_pretty(&ModelOutput { model, routes })
        .map_err(|e| format!("Error serializing floor model: {e}"))?;
    std::fs::write(path, &json)
        .map_err(|e| format!("Error writing floor model to {}: {e}", path.display()))?;
    eprintln!("Floor model written to {} ({} bytes)", path.display(), json.len());
    Ok(())
}

fn print_routes(table: &RouteTable) {
    println!(
        "Routes: {} tenants, {} reachable, {} unreachable",
        table.routes.len(),
        table.reachable(),
        table.unreachable(),
    );
    for route in &table.routes {
        match route.bin() {
            Some(bin) => println!(
                "  ({:>4}, {:>4}) -> ({:>4}, {:>4})  {} steps",
                route.tenant.x,
                route.tenant.y,
                bin.x,
                bin.y,
                route.path.len().saturating_sub(1),
            ),
            None => println!("  ({:>4}, {:>4}) -> unreachable", route.tenant.x, route.tenant.y),
        }
    }
}

fn run_rectify(args: &RectifyArgs) -> Result<(), String> {
    let config = config_from_cli(&args.params)?;

    let photos = args
        .photos
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
            syds_pipeline::grayscale::decode_rgba(&bytes)
                .map_err(|e| format!("Error decoding {}: {e}", path.display()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let floors = syds_pipeline::rectify::rectify_batch(&photos, &config).map_err(|e| format!("{e}"))?;

    std::fs::create_dir_all(&args.out_dir)
        .map_err(|e| format!("Error creating {}: {e}", args.out_dir.display()))?;

    let mut written = 0_usize;
    for (index, (floor, photo)) in floors.iter().zip(&args.photos).enumerate() {
        let Some(floor) = floor else {
            eprintln!("Floor {index} ({}): no plan sheet found", photo.display());
            continue;
        };
        let floor = if args.transparent {
            syds_pipeline::rectify::transparent_background(floor)
        } else {
            floor.clone()
        };
        let out = args.out_dir.join(format!("floor-{index}.png"));
        floor
            .save(&out)
            .map_err(|e| format!("Error writing {}: {e}", out.display()))?;
        eprintln!(
            "Floor {index} ({}): {}x{} written to {}",
            photo.display(),
            floor.width(),
            floor.height(),
            out.display(),
        );
        written += 1;
    }

    if written == 0 {
        return Err("No plan sheet found in any photo".to_string());
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock {
    origin: Instant,
}

impl StdClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Grayscale", |d| Some(d.grayscale.duration)),
        ("Outer Wall", |d| Some(d.outer_wall.duration)),
        ("Regions", |d| Some(d.regions.duration)),
        ("Walkway Isolation", |d| Some(d.walkway_isolation.duration)),
        ("Skeleton", |d| Some(d.skeleton.duration)),
        ("Breaches", |d| Some(d.breaches.duration)),
        ("Stitching", |d| Some(d.stitching.duration)),
        ("Routes", |d| d.routes.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
