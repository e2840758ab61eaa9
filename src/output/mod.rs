//! Output module for the run's final artifacts
//!
//! This module handles:
//! - Reconciling candidates and detail results into the final dataset
//! - Writing the dataset and the performance snapshot
//! - Loading and displaying the statistics of the last run

mod merge;
pub mod stats;

pub use merge::MergeWriter;
pub use stats::{load_run_stats, print_run_stats, RunStats};
