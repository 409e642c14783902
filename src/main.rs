//! Batch-Enrich main entry point
//!
//! This is the command-line interface for the Batch-Enrich pipeline.

use anyhow::Context;
use batch_enrich::checkpoint::CheckpointStore;
use batch_enrich::config::{load_config_with_hash, Config};
use batch_enrich::enrich::HttpEnricher;
use batch_enrich::pipeline::{run_enrichment, scan_files, ScanFilter};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Batch-Enrich: a resumable, rate-limited enrichment pipeline
///
/// Batch-Enrich sends every record of the configured JSON input files to an
/// enrichment endpoint, stores the structured results, and checkpoints its
/// progress so an interrupted batch picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "batch-enrich")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, rate-limited enrichment pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Ignore the existing checkpoint and start from scratch
    #[arg(long)]
    fresh: bool,

    /// Validate config and list the files that would be processed
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config).await
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_enrich(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("batch_enrich=info,warn"),
            1 => EnvFilter::new("batch_enrich=debug,info"),
            2 => EnvFilter::new("batch_enrich=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be processed
async fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Batch-Enrich Dry Run ===\n");

    println!("Pipeline Configuration:");
    println!("  Workers: {}", config.pipeline.workers);
    println!("  Queue capacity: {}", config.pipeline.queue_capacity);
    println!(
        "  Checkpoint interval: {} items",
        config.pipeline.checkpoint_interval
    );
    println!(
        "  Rate limit: {} requests per {}s",
        config.rate_limit.max_requests, config.rate_limit.period_secs
    );
    if let Some(max) = config.rate_limit.max_concurrent {
        println!("  Max concurrent calls: {}", max);
    }
    println!(
        "  Retries: {} attempts, {}ms base delay",
        config.retry.max_attempts, config.retry.base_delay_ms
    );

    println!("\nEnrichment:");
    println!("  Endpoint: {}", config.enrichment.endpoint);
    println!("  Model: {}", config.enrichment.model);
    println!("  API key variable: {}", config.enrichment.api_key_env);
    println!("  Timeout: {}s", config.enrichment.timeout_secs);
    println!("  Declared fields: {}", config.enrichment.fields.len());

    println!("\nOutput:");
    println!("  Results: {}", config.output.results_path.display());
    println!("  Checkpoints: {}", config.checkpoint.directory.display());

    // Pending files are listed against the committed checkpoint
    let state = CheckpointStore::new(&config.checkpoint.directory).load();
    let mut pending_files = 0;

    println!("\nDatasets ({}):", config.datasets.len());
    for dataset in &config.datasets {
        let filter = ScanFilter::for_dataset(&state, &dataset.label);
        match scan_files(&dataset.directory, &filter).await {
            Ok(files) => {
                println!(
                    "  - {} ({}): {} pending files",
                    dataset.label,
                    dataset.directory.display(),
                    files.len()
                );
                for file in &files {
                    println!("    * {}", file);
                }
                pending_files += files.len();
            }
            Err(e) => {
                println!(
                    "  - {} ({}): cannot list directory: {}",
                    dataset.label,
                    dataset.directory.display(),
                    e
                );
            }
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would process {} files ({} items already done)",
        pending_files, state.total_processed
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use batch_enrich::output::{load_statistics, print_statistics};

    let store = CheckpointStore::new(&config.checkpoint.directory);
    println!("Checkpoint: {}\n", store.checkpoint_path().display());

    match load_statistics(&store, &config.output.results_path)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No checkpoint found"),
    }

    Ok(())
}

/// Handles the main enrichment run
async fn handle_enrich(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting run (will resume from checkpoint if present)");
    }

    tracing::info!(
        "Datasets: {}, workers: {}, rate limit: {}/{}s",
        config.datasets.len(),
        config.pipeline.workers,
        config.rate_limit.max_requests,
        config.rate_limit.period_secs
    );

    let enricher = HttpEnricher::from_config(&config.enrichment)
        .context("Failed to set up the enrichment client")?;

    let report = run_enrichment(config, Arc::new(enricher), fresh)
        .await
        .context("Enrichment run failed")?;

    if !report.failed_items.is_empty() {
        tracing::warn!(
            "{} items failed and will be retried on the next run",
            report.failed_items.len()
        );
        for item in &report.failed_items {
            tracing::debug!("Failed: {}", item);
        }
    }

    tracing::info!(
        "Run completed: {} new results, {} files skipped",
        report.results.len(),
        report.files_skipped
    );

    Ok(())
}
