//! lunatrack CLI: link detections into scored tracklets from the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use lunatrack::{
    inputs, link, CorroborationMode, DetectionStore, GroundTruth, LinkConfig, MaxTravel,
    Tolerance,
};

#[derive(Parser)]
#[command(name = "lunatrack")]
#[command(about = "Link moon-transit detections into tracklets and score them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link detections, score tracklets, and write the feature table.
    Link(LinkArgs),

    /// Load and clean detections, printing the count after each pass.
    Inspect(InspectArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    NearLine,
    Kinematic,
}

#[derive(Debug, Clone, Args)]
struct CleaningArgs {
    /// Detections CSV: frame, x, y, radius[, focus, perimeter].
    #[arg(long)]
    detections: PathBuf,

    /// Drop detections at or beyond this frame.
    #[arg(long, default_value = "60000")]
    frame_cutoff: u32,

    /// Largest supported frame index.
    #[arg(long, default_value = "65535")]
    frame_index_limit: u32,

    /// Drop detections with radius at or below this.
    #[arg(long, default_value = "1.0")]
    min_radius: f32,

    /// Drop frames with more detections than this.
    #[arg(long, default_value = "30")]
    max_per_frame: usize,

    /// Suppress positions recurring more than mean + N*std times.
    #[arg(long)]
    hot_position_sigma: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct LinkArgs {
    #[command(flatten)]
    cleaning: CleaningArgs,

    /// Moon ellipse CSV: frame, center_x, center_y, semi_major, semi_minor, theta_deg.
    #[arg(long)]
    ellipses: PathBuf,

    /// Ground-truth CSV: first_frame, last_frame.
    #[arg(long)]
    truth: Option<PathBuf>,

    /// Output CSV of scored tracklets.
    #[arg(long)]
    out: PathBuf,

    /// Directory for per-chunk checkpoints; reused on later runs.
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Frames per parallel chunk.
    #[arg(long, default_value = "1000")]
    chunk_frames: u32,

    /// Leg-length tolerance (relative, absolute).
    #[arg(long, num_args = 2, value_names = ["RTOL", "ATOL"], default_values_t = [1.0, 10.0])]
    speed_tol: Vec<f64>,

    /// Heading tolerance (relative, absolute).
    #[arg(long, num_args = 2, value_names = ["RTOL", "ATOL"], default_values_t = [0.1, 0.002])]
    direction_tol: Vec<f64>,

    /// Radius tolerance (relative, absolute).
    #[arg(long, num_args = 2, value_names = ["RTOL", "ATOL"], default_values_t = [1.0, 10.0])]
    radius_tol: Vec<f64>,

    /// Keep raw headings instead of reflecting right-to-left travel.
    #[arg(long)]
    no_canonicalize: bool,

    /// Drop tracklets at or below this speed (px/frame).
    #[arg(long, default_value = "10.0")]
    min_speed: f64,

    /// Fixed moon center (x, y) replacing each fitted center.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], default_values_t = [960.0, 540.0])]
    moon_center: Vec<f64>,

    /// Keep each fitted ellipse center.
    #[arg(long, conflicts_with = "moon_center")]
    fitted_center: bool,

    /// Fixed forward search window in frames.
    #[arg(long, default_value = "3")]
    max_travel: u32,

    /// Derive the search window from the distance to the ellipse exit, plus this slack.
    #[arg(long)]
    exit_distance_slack: Option<u32>,

    /// Upper bound on the forward search window.
    #[arg(long, default_value = "10")]
    max_travel_cap: u32,

    /// Corroboration score mode.
    #[arg(long, value_enum, default_value_t = ModeArg::NearLine)]
    mode: ModeArg,

    /// Heading-line distance gate in pixels.
    #[arg(long, default_value = "10.0")]
    near_line_px: f64,
}

#[derive(Debug, Clone, Args)]
struct InspectArgs {
    #[command(flatten)]
    cleaning: CleaningArgs,
}

fn tolerance(v: &[f64]) -> Tolerance {
    Tolerance::new(v[0], v[1])
}

fn build_config(args: &LinkArgs) -> LinkConfig {
    let c = &args.cleaning;
    LinkConfig {
        frame_cutoff: c.frame_cutoff,
        frame_index_limit: c.frame_index_limit,
        min_radius: c.min_radius,
        max_per_frame: c.max_per_frame,
        hot_position_sigma: c.hot_position_sigma,
        speed_tolerance: tolerance(&args.speed_tol),
        direction_tolerance: tolerance(&args.direction_tol),
        radius_tolerance: tolerance(&args.radius_tol),
        canonicalize_travel_sense: !args.no_canonicalize,
        min_speed: args.min_speed,
        moon_center: if args.fitted_center {
            None
        } else {
            Some([args.moon_center[0], args.moon_center[1]])
        },
        max_travel: match args.exit_distance_slack {
            Some(slack) => MaxTravel::ExitDistance { slack },
            None => MaxTravel::Fixed(args.max_travel),
        },
        max_travel_cap: args.max_travel_cap,
        corroboration_mode: match args.mode {
            ModeArg::NearLine => CorroborationMode::NearLine,
            ModeArg::Kinematic => CorroborationMode::Kinematic,
        },
        near_line_px: args.near_line_px,
        chunk_frames: args.chunk_frames,
        checkpoint_dir: args.checkpoint_dir.clone(),
    }
}

fn run_link(args: &LinkArgs) -> anyhow::Result<()> {
    let config = build_config(args);
    config.validate()?;

    let detections = inputs::load_detections(&args.cleaning.detections)
        .with_context(|| format!("loading {}", args.cleaning.detections.display()))?;
    let ellipses = inputs::load_ellipses(&args.ellipses)
        .with_context(|| format!("loading {}", args.ellipses.display()))?;
    let truth = match &args.truth {
        Some(path) => {
            let loaded = inputs::load_ground_truth(path)
                .with_context(|| format!("loading {}", path.display()))?;
            Some(GroundTruth::new(loaded.rows))
        }
        None => None,
    };

    let store = DetectionStore::new(detections.rows);
    let result = link(store, &ellipses, truth.as_ref(), &config)?;
    lunatrack::output::write_tracklets(&args.out, &result.tracklets)?;

    let s = &result.stats;
    println!(
        "{} detections ({} malformed rows skipped) -> {} after cleaning",
        s.detections_in, detections.skipped, s.detections_cleaned
    );
    println!(
        "{} candidates -> {} consistent -> {} projected tracklets",
        s.candidates, s.consistent, s.projected
    );
    println!(
        "{} chunks ({} resumed), {:.1} ms",
        s.chunks, s.chunks_resumed, result.link_time_ms
    );
    if let Some(r) = &result.report {
        println!(
            "Hit rate {:.2}% ({} / {} truth frames), miss rate {:.2}%",
            r.hit_rate * 100.0,
            r.detected_frames,
            r.truth_frames,
            r.miss_rate * 100.0
        );
        println!(
            "{} tracklets labeled hit, {} labeled miss",
            r.labeled_hits, r.labeled_misses
        );
        for iv in &r.missed_intervals {
            println!("  missed: frames {}..={}", iv.first_frame, iv.last_frame);
        }
    }
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let c = &args.cleaning;
    let loaded = inputs::load_detections(&c.detections)
        .with_context(|| format!("loading {}", c.detections.display()))?;
    let store = DetectionStore::new(loaded.rows).with_frame_index_limit(c.frame_index_limit);
    println!(
        "loaded:        {:>10} detections in {:>7} frames ({} malformed rows)",
        store.len(),
        store.num_frames(),
        loaded.skipped
    );
    let store = store.restrict_frame_range(c.frame_cutoff)?;
    println!("frame cutoff:  {:>10}", store.len());
    let store = store.drop_small_radius(c.min_radius);
    println!("radius floor:  {:>10}", store.len());
    let mut store = store.cap_per_frame(c.max_per_frame);
    println!("per-frame cap: {:>10}", store.len());
    if let Some(sigma) = c.hot_position_sigma {
        store = store.drop_hot_positions(sigma);
        println!("hot positions: {:>10}", store.len());
    }
    let store = store.dedupe();
    println!(
        "dedupe:        {:>10} detections in {:>7} frames",
        store.len(),
        store.num_frames()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Link(args) => run_link(args)?,
        Commands::Inspect(args) => run_inspect(args)?,
    }
    info!("done");
    Ok(())
}
