//! Adaptive pacing between fetches
//!
//! The delay grows while the run is failing and shrinks while it is healthy,
//! which makes the monitor's error rate the pipeline's only backpressure.

use crate::state::PerformanceMonitor;
use rand::Rng;
use std::time::Duration;

/// Base multiplier under fast mode
const FAST_MODE_FACTOR: f64 = 0.3;

/// Base multiplier while the error rate is high
const SLOWDOWN_FACTOR: f64 = 1.5;

/// Base multiplier while the error rate is low
const SPEEDUP_FACTOR: f64 = 0.7;

/// Items that must be processed before the error rate is trusted
const MIN_SAMPLES: u64 = 10;

const HIGH_ERROR_RATE: f64 = 0.10;
const LOW_ERROR_RATE: f64 = 0.02;

/// Shortest delay ever returned
pub const MIN_DELAY: Duration = Duration::from_millis(50);

/// Longest delay ever returned
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Computes per-item delays from the live error rate
#[derive(Debug, Clone, Copy)]
pub struct DelayController<'a> {
    monitor: &'a PerformanceMonitor,
    floor: Duration,
}

impl<'a> DelayController<'a> {
    pub fn new(monitor: &'a PerformanceMonitor) -> Self {
        Self {
            monitor,
            floor: MIN_DELAY,
        }
    }

    /// Base delay in seconds after the fast-mode and error-rate adjustments
    pub fn adjusted_base(&self, base: f64, fast_mode: bool) -> f64 {
        let mut base = if fast_mode { base * FAST_MODE_FACTOR } else { base };

        let snapshot = self.monitor.snapshot();
        if snapshot.processed_count >= MIN_SAMPLES {
            let error_rate = snapshot.error_rate();
            if error_rate > HIGH_ERROR_RATE {
                base *= SLOWDOWN_FACTOR;
            } else if error_rate < LOW_ERROR_RATE {
                base *= SPEEDUP_FACTOR;
            }
        }

        base
    }

    /// Next delay, using the thread-local random source for jitter
    pub fn compute_delay(&self, base: f64, jitter: f64, fast_mode: bool) -> Duration {
        self.compute_delay_with(&mut rand::thread_rng(), base, jitter, fast_mode)
    }

    /// Next delay, drawing jitter from `rng`
    ///
    /// # Arguments
    ///
    /// * `base` - Base delay in seconds
    /// * `jitter` - Half-width of the uniform jitter band in seconds
    /// * `fast_mode` - Whether fast mode scaling applies
    pub fn compute_delay_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        base: f64,
        jitter: f64,
        fast_mode: bool,
    ) -> Duration {
        let base = self.adjusted_base(base, fast_mode);
        let offset = if jitter > 0.0 && jitter.is_finite() {
            let jitter = jitter.min(MAX_DELAY.as_secs_f64());
            rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };

        let seconds = base + offset;
        if seconds.is_nan() || seconds <= self.floor.as_secs_f64() {
            return self.floor;
        }
        Duration::try_from_secs_f64(seconds)
            .map(|delay| delay.min(MAX_DELAY))
            .unwrap_or(MAX_DELAY)
    }

    /// Sleeps for the next computed delay and returns it
    pub async fn pause(&self, base: f64, jitter: f64, fast_mode: bool) -> Duration {
        let delay = self.compute_delay(base, jitter, fast_mode);
        tokio::time::sleep(delay).await;
        delay
    }
}
