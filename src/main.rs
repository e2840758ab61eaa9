//! Gleaner main entry point
//!
//! This is the command-line interface for the Gleaner repository harvester.

use anyhow::{bail, Context};
use clap::Parser;
use gleaner::config::{load_config_with_hash, validate, Config};
use gleaner::crawler::run_crawl;
use gleaner::output::{load_run_stats, print_run_stats};
use gleaner::StopSignal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Gleaner: a resilient harvester for paginated record repositories
///
/// Gleaner pages through a repository listing, enriches every listed item
/// from its detail page with a pool of concurrent workers, and writes one
/// record per item to a JSON dataset.
#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(version = "1.0.0")]
#[command(about = "A resilient two-stage repository harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the candidate list, dataset and statistics
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Maximum listing pages to scan
    #[arg(long)]
    max_pages: Option<u32>,

    /// Number of concurrent detail workers
    #[arg(long)]
    workers: Option<usize>,

    /// Base per-item delay in seconds
    #[arg(long)]
    delay: Option<f64>,

    /// Trade extraction completeness for throughput
    #[arg(long)]
    fast_mode: bool,

    /// Reuse the saved candidate list and skip the listing stage
    #[arg(long)]
    resume: bool,

    /// Log detail-stage progress periodically
    #[arg(long)]
    progress: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without running
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the last run and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(outdir) = &self.outdir {
            config.output.directory = outdir.clone();
        }
        if let Some(max_pages) = self.max_pages {
            config.crawl.max_pages = max_pages;
        }
        if let Some(workers) = self.workers {
            config.crawl.workers = workers;
        }
        if let Some(delay) = self.delay {
            config.crawl.delay = delay;
        }
        config.crawl.fast_mode |= self.fast_mode;
        config.crawl.resume |= self.resume;
        config.crawl.progress |= self.progress;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    cli.apply_overrides(&mut config);
    validate(&config).context("Invalid configuration after command-line overrides")?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gleaner=info,warn"),
            1 => EnvFilter::new("gleaner=debug,info"),
            2 => EnvFilter::new("gleaner=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Gleaner Dry Run ===\n");

    println!("Source:");
    println!("  Listing: {}", config.source.base_url);
    println!("  User agent: {}", config.source.user_agent);
    println!(
        "  Timeouts: {}s ({}s in fast mode)",
        config.source.request_timeout_secs, config.source.fast_timeout_secs
    );

    let crawl = &config.crawl;
    println!("\nCrawl:");
    println!("  Max pages: {}", crawl.max_pages);
    println!("  Workers: {}", crawl.workers);
    println!("  Delay: {:.2}s (effective {:.2}s)", crawl.delay, crawl.effective_delay());
    println!("  Fast mode: {}", crawl.fast_mode);
    println!("  Resume: {}", crawl.resume);
    println!("  Page retries: {}", crawl.page_retries);
    println!("  Detail attempts: {}", crawl.detail_attempts);
    println!("  Session recycle interval: {}", crawl.effective_recycle_interval());
    println!("  Requeue rounds: {}", crawl.requeue_rounds);

    println!("\nCache capacity: {}", config.cache.capacity);

    println!("\nOutput:");
    println!("  Candidates: {}", config.output.links_path().display());
    println!("  Dataset: {}", config.output.dataset_path().display());
    println!("  Statistics: {}", config.output.stats_path().display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics of the last run
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = config.output.stats_path();
    println!("Statistics: {}\n", path.display());

    match load_run_stats(&path).context("Failed to read statistics")? {
        Some(stats) => print_run_stats(&stats),
        None => bail!("No statistics found at {}", path.display()),
    }

    Ok(())
}

/// Handles the main harvest
async fn handle_crawl(config: Config, config_hash: Option<String>) -> anyhow::Result<()> {
    let stop = StopSignal::new();
    let on_interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current items and writing output");
            on_interrupt.raise();
        }
    });

    let summary = run_crawl(config, stop, config_hash)
        .await
        .context("Run failed")?;

    tracing::info!(
        "Wrote {} records ({} placeholders) to {}",
        summary.records,
        summary.placeholders,
        summary.dataset_path.display()
    );

    Ok(())
}
