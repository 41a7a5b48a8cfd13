use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::error;

use fea_jobs::{
    input, post_processor, InMemoryJobStore, JobService, PlaneStressSolver, RunnerConfig,
    SimError, Solver, UnavailableSolver,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SolverChoice {
    /// Built-in plane-stress finite-element solver
    PlaneStress,
    /// No solver; every job uses fallback results
    #[value(name = "none")]
    Unavailable,
}

/// Runs a structural simulation job and reports its results
#[derive(Debug, Parser)]
#[command(name = "fea-jobs", version)]
struct Cli {
    /// Simulation request in JSON
    input: String,

    #[arg(long, value_enum, default_value_t = SolverChoice::PlaneStress)]
    solver: SolverChoice,

    /// Minimum spacing between progress updates, in milliseconds
    #[arg(long)]
    min_tick_ms: Option<u64>,

    #[arg(long)]
    min_resolution: Option<usize>,

    #[arg(long)]
    max_resolution: Option<usize>,

    /// Write the completed job record as JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write time series and stress-strain CSVs into this directory
    #[arg(long)]
    csv_dir: Option<PathBuf>,
}

fn run(cli: Cli) -> Result<(), SimError> {
    let config =
        RunnerConfig::from_overrides(cli.min_tick_ms, cli.min_resolution, cli.max_resolution)?;
    let request = input::run(&cli.input)?;

    let solver: Arc<dyn Solver> = match cli.solver {
        SolverChoice::PlaneStress => Arc::new(PlaneStressSolver::new(config.solver)),
        SolverChoice::Unavailable => Arc::new(UnavailableSolver),
    };
    let service = JobService::new(Arc::new(InMemoryJobStore::new()), solver, config);

    let submitted = service.submit(request);

    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}%") {
        bar.set_style(style);
    }
    bar.set_message(format!("job {}", &submitted.id[..8]));
    let record = service.wait(&submitted.id, Duration::from_millis(100), |record| {
        bar.set_position(u64::from(record.progress));
    })?;
    bar.finish();

    println!("{}", post_processor::render_summary(&record));

    if let Some(path) = &cli.output {
        let rendered = serde_json::to_string_pretty(&record)
            .map_err(|err| SimError::PostProcessor(format!("Failed to render json: {err}")))?;
        std::fs::write(path, rendered).map_err(|err| {
            SimError::PostProcessor(format!("Failed to write {}: {err}", path.display()))
        })?;
    }

    if let (Some(dir), Some(results)) = (&cli.csv_dir, &record.results) {
        std::fs::create_dir_all(dir).map_err(|err| {
            SimError::PostProcessor(format!("Failed to create {}: {err}", dir.display()))
        })?;
        post_processor::csv_output(
            results,
            &dir.join("time_series.csv"),
            &dir.join("stress_strain.csv"),
        )?;
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
