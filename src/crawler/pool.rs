//! Stage 2: concurrent detail enrichment
//!
//! Candidates are split into contiguous batches and each batch is handed to
//! its own worker task. A worker owns one fetch session for its whole batch
//! and shares only the run's cache and monitor with the other workers.
//!
//! Items a worker could not reach because it aborted are orphans. Orphans are
//! partitioned again and run in further rounds, up to the configured number of
//! requeue rounds. Leftovers whose record already reached the cache (a worker
//! task that panicked loses its report but not its cache writes) are recovered
//! from it. Whatever is still unprocessed at the end is returned to the caller,
//! which stubs it during the merge.

use crate::config::CrawlConfig;
use crate::crawler::delay::DelayController;
use crate::crawler::retry::{with_retry, FetchFuture, RetryOutcome, RetryPolicy};
use crate::crawler::session::{FetchSession, SessionFactory, SessionGuard, SessionProfile};
use crate::record::{CandidateLink, DetailRecord};
use crate::state::RunContext;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;

/// Settings for one pool run
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,

    /// Base per-item delay in seconds
    pub delay: f64,

    /// Half-width of the per-item jitter band in seconds
    pub jitter: f64,

    pub fast_mode: bool,

    /// Fetched items per session before it is recycled
    pub recycle_interval: usize,

    pub detail_policy: RetryPolicy,

    /// Extra rounds granted to orphaned items
    pub requeue_rounds: u32,
}

impl PoolConfig {
    pub fn from_crawl(config: &CrawlConfig) -> Self {
        Self {
            workers: config.workers,
            delay: config.effective_delay(),
            jitter: config.item_jitter(),
            fast_mode: config.fast_mode,
            recycle_interval: config.effective_recycle_interval().max(1),
            detail_policy: RetryPolicy::for_details(config),
            requeue_rounds: config.requeue_rounds,
        }
    }
}

/// Splits candidates into at most `workers` contiguous batches
///
/// Batch size is `ceil(len / workers)`, so sizes differ by at most one chunk
/// remainder: 10 candidates over 3 workers give `[4, 4, 2]`. An empty input
/// gives no batches.
pub fn partition(candidates: &[CandidateLink], workers: usize) -> Vec<Vec<CandidateLink>> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let workers = workers.max(1);
    let size = (candidates.len() + workers - 1) / workers;
    candidates.chunks(size).map(|chunk| chunk.to_vec()).collect()
}

/// How a worker finished its batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Completed,

    /// The stop signal was observed between items
    Stopped,

    /// A fatal failure ended the worker; carries the error message
    Aborted(String),
}

/// What one worker produced
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker_id: usize,

    /// One record per processed item, in batch order
    pub records: Vec<DetailRecord>,

    /// Items the worker never processed
    pub unprocessed: Vec<CandidateLink>,

    pub status: WorkerStatus,
}

/// Aggregate result of a pool run
#[derive(Debug, Default)]
pub struct PoolOutcome {
    pub records: Vec<DetailRecord>,

    /// Items still unprocessed after every round
    pub unprocessed: Vec<CandidateLink>,

    /// Workers that aborted, across all rounds
    pub aborted_workers: usize,

    pub rounds: u32,
}

#[derive(Debug, Default)]
struct RoundOutcome {
    records: Vec<DetailRecord>,
    orphaned: Vec<CandidateLink>,
    stopped: Vec<CandidateLink>,
    aborted_workers: usize,
}

/// Identities already reported to the monitor during one pool run
#[derive(Debug, Default)]
struct Tally {
    counted: Mutex<HashSet<String>>,
}

impl Tally {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.counted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True the first time an identity is seen
    fn first_count(&self, identity: &str) -> bool {
        self.lock().insert(identity.to_string())
    }
}

/// Runs detail workers over a candidate set
pub struct DetailWorkerPool {
    factory: Arc<dyn SessionFactory>,
    context: Arc<RunContext>,
    config: PoolConfig,
}

impl DetailWorkerPool {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        context: Arc<RunContext>,
        config: PoolConfig,
    ) -> Self {
        Self {
            factory,
            context,
            config,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Enriches every candidate it can reach
    ///
    /// Worker failures never fail the pool; their effect is visible in
    /// [`PoolOutcome::unprocessed`] and [`PoolOutcome::aborted_workers`].
    pub async fn run(&self, candidates: &[CandidateLink]) -> PoolOutcome {
        let mut outcome = PoolOutcome {
            records: Vec::with_capacity(candidates.len()),
            ..PoolOutcome::default()
        };
        let mut pending = candidates.to_vec();
        let tally = Arc::new(Tally::default());

        while !pending.is_empty() {
            outcome.rounds += 1;
            let round = self.run_round(pending, outcome.rounds, &tally).await;

            outcome.records.extend(round.records);
            outcome.aborted_workers += round.aborted_workers;
            outcome.unprocessed.extend(round.stopped);
            pending = round.orphaned;

            if pending.is_empty() {
                break;
            }
            if self.context.stop.is_raised() || outcome.rounds > self.config.requeue_rounds {
                outcome.unprocessed.append(&mut pending);
                break;
            }

            tracing::info!(
                orphaned = pending.len(),
                round = outcome.rounds + 1,
                "Requeueing items orphaned by aborted workers"
            );
        }

        self.recover_from_cache(&mut outcome);

        if !outcome.unprocessed.is_empty() {
            tracing::warn!(
                count = outcome.unprocessed.len(),
                "Items left unprocessed, they will be written as placeholders"
            );
        }

        outcome
    }

    /// Moves unprocessed items with a cached record into the outcome's records
    fn recover_from_cache(&self, outcome: &mut PoolOutcome) {
        let before = outcome.unprocessed.len();
        let mut still_missing = Vec::with_capacity(before);

        for candidate in outcome.unprocessed.drain(..) {
            match self.context.cache.get(candidate.identity()) {
                Some(record) => outcome.records.push(record),
                None => still_missing.push(candidate),
            }
        }
        outcome.unprocessed = still_missing;

        let recovered = before - outcome.unprocessed.len();
        if recovered > 0 {
            tracing::info!(recovered, "Recovered cached records for unprocessed items");
        }
    }

    async fn run_round(
        &self,
        pending: Vec<CandidateLink>,
        round: u32,
        tally: &Arc<Tally>,
    ) -> RoundOutcome {
        let batches = partition(&pending, self.config.workers);
        let total_batches = batches.len();
        tracing::info!(
            round,
            items = pending.len(),
            batches = total_batches,
            "Starting detail workers"
        );

        let mut tasks = JoinSet::new();
        let mut batches: Vec<Option<Vec<CandidateLink>>> = batches.into_iter().map(Some).collect();
        for (worker_id, batch) in batches.iter().enumerate() {
            let worker = Worker {
                id: worker_id,
                factory: Arc::clone(&self.factory),
                context: Arc::clone(&self.context),
                config: self.config.clone(),
                tally: Arc::clone(tally),
            };
            let items = batch.clone().unwrap_or_default();
            // The inner task isolates a panicking worker so its id survives
            tasks.spawn(async move { (worker_id, tokio::spawn(worker.run(items)).await) });
        }

        let mut outcome = RoundOutcome::default();
        let mut finished = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (worker_id, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!("Worker supervisor failed: {}", e);
                    continue;
                }
            };
            let batch = batches
                .get_mut(worker_id)
                .and_then(Option::take)
                .unwrap_or_default();

            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    // The report is lost; records it finished are in the cache
                    tracing::error!(worker = worker_id, "Worker task failed: {}", e);
                    outcome.aborted_workers += 1;
                    outcome.orphaned.extend(batch);
                    continue;
                }
            };

            finished += 1;
            let snapshot = self.context.monitor.snapshot();
            tracing::info!(
                "Batch {}/{} complete (+{} items, {:.2} items/s)",
                finished,
                total_batches,
                report.records.len(),
                snapshot.smoothed_throughput
            );

            outcome.records.extend(report.records);
            match report.status {
                WorkerStatus::Completed => {}
                WorkerStatus::Stopped => outcome.stopped.extend(report.unprocessed),
                WorkerStatus::Aborted(reason) => {
                    tracing::warn!(
                        worker = report.worker_id,
                        remaining = report.unprocessed.len(),
                        "Worker aborted: {}",
                        reason
                    );
                    outcome.aborted_workers += 1;
                    outcome.orphaned.extend(report.unprocessed);
                }
            }
        }

        // Batches whose supervisor was lost
        for batch in batches.into_iter().flatten() {
            outcome.aborted_workers += 1;
            outcome.orphaned.extend(batch);
        }

        outcome
    }
}

/// One worker's view of the run
struct Worker {
    id: usize,
    factory: Arc<dyn SessionFactory>,
    context: Arc<RunContext>,
    config: PoolConfig,
    tally: Arc<Tally>,
}

impl Worker {
    fn count_success(&self, candidate: &CandidateLink) {
        if self.tally.first_count(candidate.identity()) {
            self.context.monitor.record_success();
        }
    }

    fn count_error(&self, candidate: &CandidateLink) {
        if self.tally.first_count(candidate.identity()) {
            self.context.monitor.record_error();
        }
    }

    async fn run(self, batch: Vec<CandidateLink>) -> WorkerReport {
        let mut records = Vec::with_capacity(batch.len());

        let profile = SessionProfile::detail(self.config.fast_mode);
        let mut guard =
            match SessionGuard::acquire(Arc::clone(&self.factory), profile, format!("worker-{}", self.id)).await {
                Ok(guard) => guard,
                Err(e) => {
                    tracing::error!(worker = self.id, "Could not open session: {}", e);
                    return WorkerReport {
                        worker_id: self.id,
                        records,
                        unprocessed: batch,
                        status: WorkerStatus::Aborted(e.to_string()),
                    };
                }
            };

        let delay = DelayController::new(&self.context.monitor);
        let mut fetched_since_recycle = 0usize;
        let mut status = WorkerStatus::Completed;
        let mut rotate_failed_item = false;

        for (position, candidate) in batch.iter().enumerate() {
            if self.context.stop.is_raised() {
                tracing::info!(worker = self.id, "Stop requested");
                status = WorkerStatus::Stopped;
                break;
            }

            if let Some(cached) = self.context.cache.get(candidate.identity()) {
                tracing::debug!(worker = self.id, identity = %candidate.link, "Cache hit");
                self.count_success(candidate);
                records.push(cached);
                continue;
            }

            if fetched_since_recycle >= self.config.recycle_interval {
                if let Err(e) = guard.recycle().await {
                    tracing::error!(worker = self.id, "Could not reopen session: {}", e);
                    status = WorkerStatus::Aborted(e.to_string());
                    break;
                }
                fetched_since_recycle = 0;
            }

            let session = match guard.session_mut() {
                Ok(session) => session,
                Err(e) => {
                    status = WorkerStatus::Aborted(e.to_string());
                    break;
                }
            };

            let outcome = with_retry(&self.config.detail_policy, session, |s| {
                fetch_owned(s, candidate.clone())
            })
            .await;
            fetched_since_recycle += 1;

            match outcome {
                RetryOutcome::Success(mut record) => {
                    record.link = candidate.link.clone();
                    if record.title.trim().is_empty() {
                        record.title = candidate.title.clone();
                    }
                    self.context.cache.put(candidate.identity(), record.clone());
                    self.count_success(candidate);
                    records.push(record);
                }
                RetryOutcome::Exhausted { error, attempts } => {
                    tracing::warn!(
                        worker = self.id,
                        identity = %candidate.link,
                        attempts,
                        "Detail fetch failed, recording placeholder: {}",
                        error
                    );
                    let placeholder = DetailRecord::placeholder(candidate);
                    self.context.cache.put(candidate.identity(), placeholder.clone());
                    self.count_error(candidate);
                    records.push(placeholder);
                }
                RetryOutcome::Fatal(error) => {
                    tracing::error!(
                        worker = self.id,
                        identity = %candidate.link,
                        "Fatal session failure: {}",
                        error
                    );
                    status = WorkerStatus::Aborted(error.to_string());
                    rotate_failed_item = true;
                    break;
                }
            }

            if position + 1 < batch.len() {
                delay
                    .pause(self.config.delay, self.config.jitter, self.config.fast_mode)
                    .await;
            }
        }

        guard.release().await;

        // Every processed item pushed exactly one record
        let mut unprocessed = batch[records.len()..].to_vec();
        if rotate_failed_item {
            // The item that broke the session goes last so a requeued batch
            // reaches the items behind it first
            unprocessed.rotate_left(1);
        }

        WorkerReport {
            worker_id: self.id,
            records,
            unprocessed,
            status,
        }
    }
}

fn fetch_owned<'a>(
    session: &'a mut (dyn FetchSession + 'static),
    candidate: CandidateLink,
) -> FetchFuture<'a, DetailRecord> {
    Box::pin(async move { session.fetch_detail(&candidate).await })
}
