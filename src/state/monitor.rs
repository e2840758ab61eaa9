//! Performance telemetry shared by every worker of a run

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Number of throughput samples averaged into the reported rate
const RATE_WINDOW: usize = 10;

/// Point-in-time view of the monitor's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Seconds since the monitor was created
    #[serde(rename = "elapsed")]
    pub elapsed_secs: f64,

    #[serde(rename = "processed")]
    pub processed_count: u64,

    #[serde(rename = "success")]
    pub success_count: u64,

    #[serde(rename = "errors")]
    pub error_count: u64,

    /// Percentage of processed items that succeeded
    pub success_rate: f64,

    /// Rolling average of items per second
    #[serde(rename = "items_per_second")]
    pub smoothed_throughput: f64,
}

impl PerformanceSnapshot {
    /// Fraction of processed items that failed, in `[0, 1]`
    pub fn error_rate(&self) -> f64 {
        if self.processed_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.processed_count as f64
        }
    }

    /// Estimated time to process `total` items at the smoothed throughput
    pub fn eta(&self, total: u64) -> Option<Duration> {
        if self.smoothed_throughput <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.processed_count) as f64;
        Duration::try_from_secs_f64(remaining / self.smoothed_throughput).ok()
    }
}

#[derive(Debug)]
struct Counters {
    processed: u64,
    success: u64,
    errors: u64,
    rate_history: VecDeque<f64>,
    stages: HashMap<String, Instant>,
}

/// Thread-safe outcome counters with a rolling throughput estimate
///
/// Every mutation and every snapshot goes through one lock, so a snapshot
/// always reflects a whole number of completed record calls.
#[derive(Debug)]
pub struct PerformanceMonitor {
    started: Instant,
    inner: Mutex<Counters>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(Counters {
                processed: 0,
                success: 0,
                errors: 0,
                rate_history: VecDeque::with_capacity(RATE_WINDOW),
                stages: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Counters stay consistent even if a holder panicked mid-way
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a completed item that produced a usable record
    pub fn record_success(&self) {
        let mut counters = self.lock();
        counters.processed += 1;
        counters.success += 1;
        self.update_rate(&mut counters);
    }

    /// Records a completed item that ended in a placeholder
    pub fn record_error(&self) {
        let mut counters = self.lock();
        counters.processed += 1;
        counters.errors += 1;
        self.update_rate(&mut counters);
    }

    fn update_rate(&self, counters: &mut Counters) {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            if counters.rate_history.len() == RATE_WINDOW {
                counters.rate_history.pop_front();
            }
            counters
                .rate_history
                .push_back(counters.processed as f64 / elapsed);
        }
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let counters = self.lock();
        let smoothed_throughput = if counters.rate_history.is_empty() {
            0.0
        } else {
            counters.rate_history.iter().sum::<f64>() / counters.rate_history.len() as f64
        };
        let success_rate = if counters.processed > 0 {
            counters.success as f64 / counters.processed as f64 * 100.0
        } else {
            0.0
        };

        PerformanceSnapshot {
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            processed_count: counters.processed,
            success_count: counters.success,
            error_count: counters.errors,
            success_rate,
            smoothed_throughput,
        }
    }

    /// Starts (or restarts) a named stage timer
    pub fn start_stage(&self, name: &str) {
        self.lock().stages.insert(name.to_string(), Instant::now());
    }

    /// Stops a named stage timer and logs its duration
    ///
    /// Returns `None` if the stage was never started.
    pub fn end_stage(&self, name: &str) -> Option<Duration> {
        let started = self.lock().stages.remove(name)?;
        let duration = started.elapsed();
        tracing::info!(
            stage = name,
            "[PERF] {} completed in {:.2}s",
            name,
            duration.as_secs_f64()
        );
        Some(duration)
    }
}
