//! Risk-Aware Route Planning CLI
//!
//! Orders road segments into an open tour that balances geodesic distance
//! against conflict-event risk exposure.
//!
//! Usage:
//!   plan-route --segments data/primary_roads.json \
//!              --regions data/admin_monthly.json \
//!              --output route.json --geojson

use anyhow::Result;
use clap::Parser;
use risk_model::GammaPoissonPrior;
use route_planner::{
    loader, plan_segment_route, to_geojson, PlannerConfig, ScorerConfig, SolverMode,
    SolverOptions, DEFAULT_RISK_WEIGHT,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "plan-route",
    about = "Risk-aware route ordering over conflict-zone road segments"
)]
struct Args {
    /// Path to road segments JSON file
    #[arg(short = 's', long)]
    segments: PathBuf,

    /// Path to region observations JSON file (enables rate smoothing)
    #[arg(short = 'r', long)]
    regions: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long, default_value = "route.json")]
    output: PathBuf,

    /// Also output GeoJSON
    #[arg(long)]
    geojson: bool,

    /// Prior event pseudo-count (must be > 0)
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,

    /// Prior month pseudo-count (must be > 0)
    #[arg(long, default_value_t = 1.0)]
    beta: f64,

    /// Risk-sensitivity multiplier on edge weights
    #[arg(long, default_value_t = DEFAULT_RISK_WEIGHT)]
    risk_weight: f64,

    /// Maximum number of candidate segments
    #[arg(short, long, default_value_t = 50)]
    limit: usize,

    /// Solver strategy
    #[arg(long, value_enum, default_value = "auto")]
    solver: SolverMode,

    /// Node index to start the tour from
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Risk-Aware Route Planner");
    info!("{}", "=".repeat(60));

    let segments = loader::load_segments(&args.segments, args.limit)?;
    let observations = match &args.regions {
        Some(path) => loader::load_region_observations(path)?,
        None => Vec::new(),
    };

    let config = PlannerConfig {
        prior: GammaPoissonPrior::new(args.alpha, args.beta)?,
        risk_weight: args.risk_weight,
        scorer: ScorerConfig::default(),
        solver: SolverOptions {
            mode: args.solver,
            start_index: args.start_index,
        },
    };

    let route = plan_segment_route(segments, &observations, &config)?;

    info!(
        "\nRoute ({} stops, {} solver{}):",
        route.stops.len(),
        route.metadata.solver,
        if route.metadata.degraded {
            ", degraded"
        } else {
            ""
        }
    );
    for stop in route.stops.iter().take(10) {
        info!(
            "  {:3} | {:24} | risk {:.5}",
            stop.order, stop.scored.segment.segment_id, stop.scored.risk
        );
    }
    if route.stops.len() > 10 {
        info!("  ... {} more stops", route.stops.len() - 10);
    }

    info!("\nWriting output to {:?}", args.output);
    let file = File::create(&args.output)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &route)?;

    if args.geojson {
        let geojson_path = args.output.with_extension("geojson");
        info!("Writing GeoJSON to {:?}", geojson_path);
        let geojson = to_geojson(&route);
        let file = File::create(&geojson_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &geojson)?;
    }

    info!("\n{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Stops:        {}", route.metadata.node_count);
    info!("Solver:       {}", route.metadata.solver);
    info!("Total weight: {:.2} km (risk-weighted)", route.metadata.total_weight);

    Ok(())
}
