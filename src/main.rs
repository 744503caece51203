//! Geocrawl main entry point
//!
//! This is the command-line interface for the Geocrawl batch enricher.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use geocrawl::config::{load_config_with_hash, Config};
use geocrawl::output::print_report;
use geocrawl::pipeline::{plan_batches, run_batches};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Geocrawl: batch IP geolocation enrichment
///
/// Looks up every IP address of each batch against the configured service,
/// writes the enriched records as JSON lines and uploads them to a bucket.
#[derive(Parser, Debug)]
#[command(name = "geocrawl")]
#[command(version)]
#[command(about = "Batch IP geolocation enrichment", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process the batches with indices START..END (END exclusive)
    Run {
        /// First batch index
        start: usize,

        /// One past the last batch index
        end: usize,

        /// Show the planned batches without fetching anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Run {
            start,
            end,
            dry_run,
        } => {
            if end < start {
                bail!("end index {} is before start index {}", end, start);
            }
            if dry_run {
                handle_dry_run(&config, start, end);
                Ok(())
            } else {
                handle_run(&config, start, end).await
            }
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("geocrawl=info,warn"),
            1 => EnvFilter::new("geocrawl=debug,info"),
            2 => EnvFilter::new("geocrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: shows what would be processed
fn handle_dry_run(config: &Config, start: usize, end: usize) {
    println!("=== Geocrawl Dry Run ===\n");

    println!("Lookup:");
    println!("  Base URL: {}", config.lookup.base_url);
    println!("  Max workers: {}", config.lookup.max_workers);
    println!("  Request timeout: {}s", config.lookup.request_timeout_secs);

    println!("\nStorage:");
    println!("  Backend: {:?}", config.storage.backend);
    println!("  Bucket: {}", config.storage.bucket);
    println!("  Batch parallelism: {}", config.batches.batch_parallelism);

    let batches = plan_batches(start..end, &config.batches);
    println!("\nBatches ({}):", batches.len());
    for batch in &batches {
        println!(
            "  - {}: {} -> {} (staged at {})",
            batch.name,
            batch.input_object,
            batch.destination,
            batch.local_artifact_path.display()
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main run
async fn handle_run(config: &Config, start: usize, end: usize) -> anyhow::Result<()> {
    tracing::info!("Processing batches {}..{}", start, end);

    let report = run_batches(config, start..end).await?;
    print_report(&report);

    if !report.all_succeeded() {
        bail!(
            "{} of {} batches failed",
            report.failed().len(),
            report.outcomes.len()
        );
    }

    Ok(())
}
