use std::path::PathBuf;

use clap::Parser;
use rise_over_run::{
    config::ScoringConfig,
    cost::CostFunction,
    error::RouteError,
    gpx_io::encode_path_as_gpx,
    graph::{NodeId, RouteGraph},
    search::shortest_path,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Find the shortest, flattest and blended paths between two nodes of a graph file"
)]
struct Args {
    /// Graph JSON (`{"nodes": [...], "edges": [...]}`)
    #[arg(long)]
    graph: PathBuf,

    #[arg(long)]
    from: NodeId,

    #[arg(long)]
    to: NodeId,

    /// Elevation files (.asc or .hgt), searched in order
    #[arg(long, num_args = 1..)]
    dem: Vec<PathBuf>,

    /// JSON scoring config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Edge profiling cadence in meters
    #[arg(long)]
    step: Option<f64>,

    /// Distance weight of the blended cost
    #[arg(long, default_value_t = 0.5)]
    alpha: f64,

    /// Net gain weight of the blended cost
    #[arg(long, default_value_t = 0.5)]
    beta: f64,

    /// Directory to write one GPX file per found path
    #[arg(long)]
    gpx_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = ScoringConfig::load(args.config.as_deref())?;
    if let Some(step) = args.step {
        config.edge_step_m = step;
    }
    if !args.dem.is_empty() {
        config.dem_paths = args.dem.clone();
    }
    config.validate()?;

    let elevation = config.open_dem()?;
    let graph = RouteGraph::from_path(&args.graph, &elevation, config.edge_step_m)?;

    let modes = [
        CostFunction::Shortest,
        CostFunction::Flattest,
        CostFunction::weighted_blend(args.alpha, args.beta)?,
    ];
    for cost in modes {
        match shortest_path(&graph, args.from, args.to, &cost) {
            Ok(path) => {
                let summary = path.summarize(&graph)?;
                let nodes: Vec<String> = path.nodes.iter().map(|id| id.to_string()).collect();
                println!(
                    "{:<9} {}  cost={:.2} distance={:.2} m gain={:.2} m max_slope={:.2}% avg_slope={:.2}%",
                    cost.label(),
                    nodes.join(" -> "),
                    path.cost,
                    summary.distance_m,
                    summary.elevation_gain_m,
                    summary.max_slope_pct,
                    summary.avg_slope_pct
                );

                if let Some(dir) = &args.gpx_dir {
                    let xml = encode_path_as_gpx(cost.label(), &path.coordinates(&graph)?)?;
                    let out = dir.join(format!("{}.gpx", cost.label()));
                    std::fs::write(&out, xml)?;
                    tracing::info!("wrote {:?}", out);
                }
            }
            Err(RouteError::Unreachable { .. }) => {
                println!("{:<9} no route from {} to {}", cost.label(), args.from, args.to);
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
