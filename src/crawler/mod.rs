//! Crawl engine
//!
//! This module contains the two crawl stages and everything they share:
//! - The fetch capability seam (`FetchSession`, `SessionFactory`) and its HTTP implementation
//! - HTML extraction for listing and detail pages
//! - The retry combinator and adaptive pacing
//! - Stage 1 listing collection and the stage 2 worker pool
//! - Overall run coordination

mod coordinator;
mod delay;
mod fetcher;
mod listing;
mod parser;
mod pool;
mod retry;
mod session;

#[cfg(test)]
pub(crate) mod mock;

pub use coordinator::{run_crawl, Coordinator, RunSummary};
pub use delay::{DelayController, MIN_DELAY};
pub use fetcher::{build_http_client, HttpSession, HttpSessionFactory};
pub use listing::{dedup_by_identity, ListingCollector, ListingEnd, ListingReport};
pub use parser::{parse_detail, parse_listing};
pub use pool::{partition, DetailWorkerPool, PoolConfig, PoolOutcome, WorkerReport, WorkerStatus};
pub use retry::{with_retry, FetchFuture, RetryOutcome, RetryPolicy};
pub use session::{FetchSession, SessionFactory, SessionGuard, SessionProfile, SessionRole};
