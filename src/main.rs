//! Harvest-Relay main entry point
//!
//! This is the command-line interface for the Harvest-Relay group-racing harvester.

use anyhow::Context;
use clap::Parser;
use harvest_relay::config::{load_config_with_hash, validate, Config, ExtractorConfig};
use harvest_relay::crawler::{run_batches, BatchRunner};
use harvest_relay::output::{print_statistics, JsonFileSink};
use harvest_relay::source::JsonFileSource;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Harvest-Relay: a group-racing web content harvester
///
/// Harvest-Relay reads candidate URLs grouped by record id, races the
/// candidates of each group under a shared concurrency limit, and writes
/// the first successful extraction per group.
#[derive(Parser, Debug)]
#[command(name = "harvest-relay")]
#[command(version = "1.0.0")]
#[command(about = "A group-racing web content harvester", long_about = None)]
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

    /// Input files, replacing `input.files` from the config
    #[arg(long, value_name = "FILE", num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output directory, replacing `output.directory` from the config
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Per-batch deadline in seconds
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid command-line overrides")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_harvest(&config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("harvest_relay=info,warn"),
            1 => EnvFilter::new("harvest_relay=debug,info"),
            2 => EnvFilter::new("harvest_relay=trace,debug"),
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

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if !cli.input.is_empty() {
        config.input.files = cli
            .input
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.to_string_lossy().into_owned();
    }
    if cli.deadline.is_some() {
        config.harvest.batch_deadline_seconds = cli.deadline;
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Harvest-Relay Dry Run ===\n");

    println!("Scheduler:");
    println!("  Max concurrency: {}", config.harvest.max_concurrency);
    println!("  Max retries: {}", config.harvest.max_retries);
    println!("  Backoff factor: {}s", config.harvest.backoff_factor);
    match config.harvest.batch_deadline() {
        Some(deadline) => println!("  Batch deadline: {:?}", deadline),
        None => println!("  Batch deadline: none"),
    }

    println!("\nHTTP:");
    println!("  Request timeout: {:?}", config.http.request_timeout());
    println!("  User agents: {}", config.http.user_agent_pool.len());
    for (name, value) in &config.http.header_template {
        println!("  {}: {}", name, value);
    }

    println!("\nExtractor:");
    match &config.extractor {
        ExtractorConfig::Heading { selector } => println!("  Heading ({})", selector),
        ExtractorConfig::EmbeddedData { keys } if keys.is_empty() => {
            println!("  Embedded data (all keys)")
        }
        ExtractorConfig::EmbeddedData { keys } => {
            println!("  Embedded data ({} keys)", keys.len())
        }
    }

    println!("\nInput ({} files):", config.input.files.len());
    for file in &config.input.files {
        println!("  - {}", file);
    }
    println!("  Batch size: {}", config.input.batch_size);
    println!("  Max URLs per group: {}", config.input.max_urls_per_group);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);

    println!("\n✓ Configuration is valid");
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config) -> anyhow::Result<()> {
    if config.input.files.is_empty() {
        anyhow::bail!("no input files given (set input.files or pass --input)");
    }

    let files = config.input.files.iter().map(PathBuf::from).collect();
    let mut source = JsonFileSource::new(
        files,
        config.input.batch_size,
        config.input.max_urls_per_group,
    )?;
    let mut sink = JsonFileSink::new(&config.output.directory)
        .with_context(|| format!("cannot prepare output directory {}", config.output.directory))?;

    tracing::info!(
        "Harvesting {} input files with up to {} requests in flight",
        config.input.files.len(),
        config.harvest.max_concurrency
    );

    let runner = BatchRunner::from_config(config)?;

    // First Ctrl-C: finish the current batch, persist it, then stop
    let interrupt = runner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current batch");
            interrupt.shutdown();
        }
    });

    let stats = match run_batches(&runner, &mut source, &mut sink).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    if source.skipped_records() > 0 || !source.skipped_files().is_empty() {
        tracing::warn!(
            "Input issues: {} records skipped, {} files abandoned",
            source.skipped_records(),
            source.skipped_files().len()
        );
    }

    println!();
    print_statistics(&stats);

    Ok(())
}
