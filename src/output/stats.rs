//! Run statistics
//!
//! The stats file is the monitor's final snapshot plus the parameters of the
//! run that produced it.

use crate::state::PerformanceSnapshot;
use crate::storage::{read_json, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Performance snapshot plus run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(flatten)]
    pub performance: PerformanceSnapshot,

    /// Wall time of the whole run in seconds
    pub total_time: f64,

    /// Records in the written dataset
    pub total_records: usize,

    /// Dataset records with no detail fields
    #[serde(default)]
    pub placeholder_records: usize,

    /// Candidates no worker reached
    #[serde(default)]
    pub unprocessed_items: usize,

    pub fast_mode: bool,

    pub workers: usize,

    /// Effective per-item delay in seconds
    pub delay: f64,

    /// True when stage 1 was replaced by a persisted candidate list
    #[serde(default)]
    pub listing_skipped: bool,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

/// Loads the stats file written by the last run
///
/// # Returns
///
/// * `Ok(None)` - No stats file exists
/// * `Ok(Some(stats))` - The last run's statistics
/// * `Err(StorageError)` - The file could not be read or parsed
pub fn load_run_stats(path: &Path) -> StorageResult<Option<RunStats>> {
    read_json(path)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_run_stats(stats: &RunStats) {
    println!("=== Run Statistics ===\n");

    println!("Run:");
    println!("  Started:  {}", stats.started_at.to_rfc3339());
    println!("  Finished: {}", stats.finished_at.to_rfc3339());
    println!("  Total time: {:.1}s", stats.total_time);
    if let Some(hash) = &stats.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!(
        "  Workers: {}, delay: {:.2}s, fast mode: {}",
        stats.workers, stats.delay, stats.fast_mode
    );
    if stats.listing_skipped {
        println!("  Listing stage skipped (resumed from saved candidates)");
    }
    println!();

    let perf = &stats.performance;
    println!("Detail Stage:");
    println!("  Processed: {}", perf.processed_count);
    println!("  Succeeded: {}", perf.success_count);
    println!("  Failed: {}", perf.error_count);
    println!("  Throughput: {:.2} items/s", perf.smoothed_throughput);
    println!();

    println!("Dataset:");
    println!("  Records: {}", stats.total_records);
    println!("  Placeholders: {}", stats.placeholder_records);
    if stats.unprocessed_items > 0 {
        println!("  Never reached: {}", stats.unprocessed_items);
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} items)",
        perf.success_rate, perf.success_count, perf.processed_count
    );
}
