//! `gridband` command-line entry point.
//!
//! Run with: cargo run --release -- --grid image.txt

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use gridband::{analyze, AnalysisOptions, Grid, MergeMode};

/// Count, bound and band the non-zero cells of a square binary image, one
/// worker per row.
#[derive(Debug, Parser)]
#[command(name = "gridband", version, about)]
struct Cli {
    /// Grid file: one row per line, cells separated by spaces or commas.
    /// Defaults to the built-in 31x31 sample image.
    #[arg(long, value_name = "PATH")]
    grid: Option<PathBuf>,

    /// Number of workers to launch; must equal the number of rows.
    /// Overrides GRIDBAND_WORKERS.
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Also report the band still open after the last row. Also enabled by
    /// GRIDBAND_FLUSH_FINAL_BAND=1|true|yes|on.
    #[arg(long)]
    flush_final_band: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "analysis failed");
            eprintln!("{err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

fn run(cli: &Cli) -> gridband::Result<()> {
    let grid = match &cli.grid {
        Some(path) => Grid::load(path)?,
        None => Grid::sample(),
    };
    let mut opts = AnalysisOptions::from_env();
    if cli.workers.is_some() {
        opts.workers = cli.workers;
    }
    if cli.flush_final_band {
        opts.merge = MergeMode::FlushOnExit;
    }

    let report = analyze(grid, &opts)?;
    if cli.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| gridband::Error::Internal(e.to_string()))?;
        println!("{json}");
    } else {
        print!("{report}");
    }
    Ok(())
}
