use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use harness::config::Settings;
use harness::repository::StoreKind;
use harness::{report, runner};

/// Times CRUD operations on athletics data across backing stores.
#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "CRUD benchmark over a relational and a document store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed every store and time the operation matrix
    Run {
        /// Number of generations to scale the input to
        #[arg(long)]
        scale: Option<u32>,

        /// Number of times to run the matrix
        #[arg(long)]
        repetitions: Option<u32>,

        /// Delete the metrics file before running
        #[arg(long)]
        reset_metrics: bool,

        /// Keep existing tables and collections instead of recreating them
        #[arg(long)]
        keep_stores: bool,

        /// Stores to benchmark (comma-separated: sqlite, keydb, memory)
        #[arg(long)]
        stores: Option<String>,
    },

    /// Summarise a metrics file
    Report {
        /// Metrics CSV to read; defaults to the configured output directory
        #[arg(long)]
        metrics: Option<PathBuf>,
    },

    /// Parse and scale the input, then check referential closure
    Verify {
        #[arg(long)]
        scale: Option<u32>,
    },
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let (settings, settings_file) = Settings::load().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}. Exiting.");
        process::exit(1);
    });

    let level = settings.log_level_filter().unwrap_or(LevelFilter::Info);
    let log_file = settings.log_file.as_ref().and_then(|p| p.to_str());
    athletics_core::initialize_logger(level, log_file).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {e}. Exiting.");
        process::exit(1);
    });
    if let Some(path) = settings_file {
        log::info!("Loaded settings from {}", path.display());
    }

    if let Err(e) = dispatch(cli.command, settings) {
        log::error!("{e:#}");
        process::exit(1);
    }
}

fn dispatch(command: Commands, mut settings: Settings) -> Result<()> {
    match command {
        Commands::Run {
            scale,
            repetitions,
            reset_metrics,
            keep_stores,
            stores,
        } => {
            if let Some(scale) = scale {
                settings.scale = scale;
            }
            if let Some(repetitions) = repetitions {
                settings.repetitions = repetitions;
            }
            settings.reset_metrics |= reset_metrics;
            if keep_stores {
                settings.reset_stores = false;
            }
            if let Some(stores) = stores {
                settings.stores = StoreKind::parse_list(&stores)?;
            }
            settings.validate()?;

            log::info!(
                "Benchmarking {:?} at scale {} for {} repetitions",
                settings.stores,
                settings.scale,
                settings.repetitions
            );
            runner::execute(&settings)
        }
        Commands::Report { metrics } => {
            let path = metrics.unwrap_or_else(|| settings.metrics_path());
            let rows = report::load_metrics(&path)?;
            if rows.is_empty() {
                log::warn!("{} holds no metric rows", path.display());
                return Ok(());
            }
            report::print_report(&report::summarize(&rows));
            Ok(())
        }
        Commands::Verify { scale } => {
            if let Some(scale) = scale {
                settings.scale = scale;
            }
            let dataset = runner::prepare_dataset(&settings).context("Verification failed")?;
            println!(
                "Scale x{}: {} events, {} athletes, {} results in {} closed generations",
                settings.scale.max(1),
                dataset.events.len(),
                dataset.athletes.len(),
                dataset.results.len(),
                dataset.generations()
            );
            Ok(())
        }
    }
}
