//! Run-scoped shared state
//!
//! Everything workers share lives in a [`RunContext`] that the coordinator builds
//! once per run and hands to each worker by `Arc`.
//!
//! # Components
//!
//! - `ResultCache`: bounded identity → record cache with LRU eviction
//! - `PerformanceMonitor`: outcome counters and rolling throughput
//! - `StopSignal`: cooperative stop flag checked between items

mod cache;
mod monitor;

pub use cache::{CacheEntry, ResultCache};
pub use monitor::{PerformanceMonitor, PerformanceSnapshot};

use crate::ConfigError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag shared between the caller and every worker
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every stage to stop after its current item
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared by all workers for the lifetime of one run
#[derive(Debug)]
pub struct RunContext {
    pub cache: ResultCache,
    pub monitor: PerformanceMonitor,
    pub stop: StopSignal,
}

impl RunContext {
    pub fn new(cache_capacity: usize, stop: StopSignal) -> Result<Self, ConfigError> {
        Ok(Self {
            cache: ResultCache::new(cache_capacity)?,
            monitor: PerformanceMonitor::new(),
            stop,
        })
    }
}
