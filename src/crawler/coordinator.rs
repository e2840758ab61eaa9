//! Run coordinator - orchestration of one complete harvest
//!
//! This module wires the stages together:
//! - Loading the persisted candidate list, or running the listing stage
//! - Running the detail worker pool over the candidates
//! - Reporting progress while the pool runs
//! - Merging and writing the dataset and the statistics

use crate::config::{validate, Config};
use crate::crawler::fetcher::HttpSessionFactory;
use crate::crawler::listing::ListingCollector;
use crate::crawler::pool::{DetailWorkerPool, PoolConfig};
use crate::crawler::session::SessionFactory;
use crate::output::{MergeWriter, RunStats};
use crate::state::{RunContext, StopSignal};
use crate::storage::ResumeStore;
use crate::GleanError;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Distinct candidates the run worked on
    pub candidates: usize,

    /// Records written to the dataset (always equal to `candidates`)
    pub records: usize,

    pub placeholders: usize,

    /// Candidates no worker reached
    pub unprocessed: usize,

    pub aborted_workers: usize,

    pub listing_skipped: bool,

    pub dataset_path: PathBuf,

    pub stats: RunStats,
}

/// Main run coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    factory: Arc<dyn SessionFactory>,
    context: Arc<RunContext>,
    resume_store: ResumeStore,
    writer: MergeWriter,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a coordinator that fetches over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    /// * `stop` - Signal that ends the run early when raised
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(GleanError)` - Invalid configuration
    pub fn new(config: Config, stop: StopSignal) -> Result<Self, GleanError> {
        let factory = HttpSessionFactory::new(config.source.clone())?;
        Self::with_factory(config, Arc::new(factory), stop)
    }

    /// Creates a coordinator around any fetch capability
    pub fn with_factory(
        config: Config,
        factory: Arc<dyn SessionFactory>,
        stop: StopSignal,
    ) -> Result<Self, GleanError> {
        validate(&config)?;

        let context = Arc::new(RunContext::new(config.cache.capacity, stop)?);
        let resume_store = ResumeStore::new(config.output.links_path());
        let writer = MergeWriter::new(config.output.dataset_path(), config.output.stats_path());

        Ok(Self {
            config: Arc::new(config),
            factory,
            context,
            resume_store,
            writer,
            config_hash: None,
        })
    }

    /// Records the hash of the config file in the run statistics
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.context
    }

    /// Runs both stages and writes every output file
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The dataset and statistics were written
    /// * `Err(GleanError::NoCandidates)` - The listing stage found nothing
    /// * `Err(GleanError)` - An output file could not be written
    pub async fn run(&self) -> Result<RunSummary, GleanError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let crawl = &self.config.crawl;
        let monitor = &self.context.monitor;

        tracing::info!(
            workers = crawl.workers,
            delay = crawl.effective_delay(),
            fast_mode = crawl.fast_mode,
            "Starting run"
        );

        // Stage 1: listing, unless a saved candidate list can stand in for it
        let resumed = if crawl.resume {
            self.resume_store.load_for_resume()
        } else {
            None
        };
        let listing_skipped = resumed.is_some();

        let candidates = match resumed {
            Some(candidates) => {
                tracing::info!(
                    count = candidates.len(),
                    path = %self.resume_store.path().display(),
                    "Resuming from saved candidates, skipping listing stage"
                );
                candidates
            }
            None => {
                monitor.start_stage("listing");
                let collector = ListingCollector::new(
                    Arc::clone(&self.factory),
                    Arc::clone(&self.context),
                    crawl,
                );
                let report = collector.collect(crawl.max_pages).await;
                monitor.end_stage("listing");

                if report.candidates.is_empty() {
                    tracing::error!(ended = ?report.ended, "Listing stage found no candidates");
                    return Err(GleanError::NoCandidates {
                        pages: report.pages_scanned,
                    });
                }

                self.resume_store.save(&report.candidates)?;
                report.candidates
            }
        };

        // Stage 2: details
        monitor.start_stage("details");
        let progress = crawl.progress.then(|| {
            spawn_progress_reporter(
                Arc::clone(&self.context),
                candidates.len(),
                Duration::from_secs(crawl.progress_interval_secs.max(1)),
            )
        });

        let pool = DetailWorkerPool::new(
            Arc::clone(&self.factory),
            Arc::clone(&self.context),
            PoolConfig::from_crawl(crawl),
        );
        let outcome = pool.run(&candidates).await;

        if let Some(handle) = progress {
            handle.abort();
        }
        monitor.end_stage("details");

        // Merge and write
        monitor.start_stage("merge");
        let records = MergeWriter::merge(&candidates, outcome.records);
        self.writer.write_dataset(&records)?;

        let placeholders = records.iter().filter(|r| r.is_placeholder()).count();
        let stats = RunStats {
            performance: monitor.snapshot(),
            total_time: clock.elapsed().as_secs_f64(),
            total_records: records.len(),
            placeholder_records: placeholders,
            unprocessed_items: outcome.unprocessed.len(),
            fast_mode: crawl.fast_mode,
            workers: crawl.workers,
            delay: crawl.effective_delay(),
            listing_skipped,
            started_at,
            finished_at: Utc::now(),
            config_hash: self.config_hash.clone(),
        };
        self.writer.write_stats(&stats)?;
        monitor.end_stage("merge");

        tracing::info!(
            records = records.len(),
            placeholders,
            unprocessed = outcome.unprocessed.len(),
            aborted_workers = outcome.aborted_workers,
            "Run complete in {:.1}s",
            stats.total_time
        );

        Ok(RunSummary {
            candidates: candidates.len(),
            records: records.len(),
            placeholders,
            unprocessed: outcome.unprocessed.len(),
            aborted_workers: outcome.aborted_workers,
            listing_skipped,
            dataset_path: self.config.output.dataset_path(),
            stats,
        })
    }
}

/// Logs stage 2 progress every `every` until aborted
fn spawn_progress_reporter(context: Arc<RunContext>, total: usize, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let snapshot = context.monitor.snapshot();
            let percent = if total > 0 {
                snapshot.processed_count as f64 / total as f64 * 100.0
            } else {
                100.0
            };
            let eta = snapshot
                .eta(total as u64)
                .map(|d| format!("{:.0}s", d.as_secs_f64()))
                .unwrap_or_else(|| "unknown".to_string());

            tracing::info!(
                "Progress: {}/{} ({:.1}%), success {:.1}%, {:.2} items/s, ETA {}",
                snapshot.processed_count,
                total,
                percent,
                snapshot.success_rate,
                snapshot.smoothed_throughput,
                eta
            );
        }
    })
}

/// Runs a complete harvest over HTTP
///
/// This is the main entry point for starting a run. It will:
/// 1. Validate the configuration
/// 2. Load saved candidates (resume mode) or page through the listing
/// 3. Enrich every candidate with the worker pool
/// 4. Write the dataset and the statistics
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `stop` - Signal that ends the run early when raised
/// * `config_hash` - Hash of the config file, recorded in the statistics
pub async fn run_crawl(
    config: Config,
    stop: StopSignal,
    config_hash: Option<String>,
) -> Result<RunSummary, GleanError> {
    let mut coordinator = Coordinator::new(config, stop)?;
    if let Some(hash) = config_hash {
        coordinator = coordinator.with_config_hash(hash);
    }
    coordinator.run().await
}
