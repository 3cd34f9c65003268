use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Parser;
use rise_over_run::{
    config::ScoringConfig,
    gpx_io::candidates_from_path,
    models::{CandidateOutcome, CandidateRoute, ScoreReport},
    scoring::RouteScorer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Score candidate walking routes and pick the shortest, flattest and best compromise"
)]
struct Args {
    /// JSON file with `[{"name": ..., "coordinates": [[lon, lat], ...]}]`
    #[arg(long)]
    candidates: Option<PathBuf>,

    /// GPX files; every track or route is one candidate
    #[arg(long, num_args = 1..)]
    gpx: Vec<PathBuf>,

    /// Elevation files (.asc or .hgt), searched in order
    #[arg(long, num_args = 1..)]
    dem: Vec<PathBuf>,

    /// JSON scoring config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resampling cadence in meters
    #[arg(long)]
    step: Option<f64>,

    /// Distance tolerance of the flattest pick
    #[arg(long)]
    tau: Option<f64>,
    #[arg(long)]
    weight_distance: Option<f64>,
    #[arg(long)]
    weight_gain: Option<f64>,
    #[arg(long)]
    weight_smoothness: Option<f64>,

    /// Print unrounded values
    #[arg(long)]
    raw: bool,
}

impl Args {
    fn apply(&self, config: &mut ScoringConfig) {
        if let Some(step) = self.step {
            config.resample_step_m = step;
        }
        let selection = &mut config.selection;
        if let Some(tau) = self.tau {
            selection.tau = tau;
        }
        if let Some(weight) = self.weight_distance {
            selection.weight_distance = weight;
        }
        if let Some(weight) = self.weight_gain {
            selection.weight_gain = weight;
        }
        if let Some(weight) = self.weight_smoothness {
            selection.weight_smoothness = weight;
        }
        if !self.dem.is_empty() {
            config.dem_paths = self.dem.clone();
        }
    }

    fn load_candidates(&self) -> Result<Vec<CandidateRoute>, Box<dyn std::error::Error>> {
        let mut candidates = Vec::new();
        if let Some(path) = &self.candidates {
            let file = File::open(path)?;
            let parsed: Vec<CandidateRoute> = serde_json::from_reader(BufReader::new(file))?;
            tracing::info!("read {} candidates from {:?}", parsed.len(), path);
            candidates.extend(parsed);
        }
        for path in &self.gpx {
            let parsed = candidates_from_path(path)?;
            tracing::info!("read {} candidates from {:?}", parsed.len(), path);
            candidates.extend(parsed);
        }
        Ok(candidates)
    }
}

fn rounded(report: ScoreReport) -> ScoreReport {
    ScoreReport {
        params: report.params,
        routes: report
            .routes
            .into_iter()
            .map(|outcome| match outcome {
                CandidateOutcome::Scored(metrics) => CandidateOutcome::Scored(metrics.rounded()),
                failed => failed,
            })
            .collect(),
        choices: report.choices.rounded(),
    }
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
    args.apply(&mut config);
    config.validate()?;

    let candidates = args.load_candidates()?;
    if candidates.is_empty() {
        return Err("no candidate routes given (use --candidates and/or --gpx)".into());
    }

    let elevation = config.open_dem()?;
    let scorer = RouteScorer::from(&config);
    let report = scorer.evaluate(&candidates, &elevation)?;

    let report = if args.raw { report } else { rounded(report) };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
