//! Stage 1: sequential listing collection
//!
//! Pages are fetched one at a time because the collector has to observe an
//! empty page to know where the listing ends.

use crate::config::CrawlConfig;
use crate::crawler::delay::DelayController;
use crate::crawler::retry::{with_retry, RetryOutcome, RetryPolicy};
use crate::crawler::session::{SessionFactory, SessionGuard, SessionProfile};
use crate::record::CandidateLink;
use crate::state::RunContext;
use std::collections::HashMap;
use std::sync::Arc;

/// Why collection stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEnd {
    /// The page at this index listed nothing
    EmptyPage(u32),

    /// Every attempt at this page failed transiently
    RetriesExhausted(u32),

    /// A fatal fetch failure; carries the error message
    Fatal(String),

    /// All configured pages were scanned
    MaxPages,

    /// The stop signal was raised
    Stopped,
}

/// Result of one listing stage
#[derive(Debug, Clone)]
pub struct ListingReport {
    /// Deduplicated candidates in first-seen order
    pub candidates: Vec<CandidateLink>,

    /// Pages requested, including the one that ended collection
    pub pages_scanned: u32,

    /// Rows seen before deduplication
    pub total_rows: usize,

    pub ended: ListingEnd,
}

/// Pages through the listing and gathers candidates
pub struct ListingCollector {
    factory: Arc<dyn SessionFactory>,
    context: Arc<RunContext>,
    policy: RetryPolicy,
    page_delay: f64,
    page_jitter: f64,
}

impl ListingCollector {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        context: Arc<RunContext>,
        config: &CrawlConfig,
    ) -> Self {
        Self {
            factory,
            context,
            policy: RetryPolicy::for_listing(config),
            page_delay: config.listing_delay,
            page_jitter: config.listing_jitter,
        }
    }

    /// Replaces the page-level retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Scans listing pages `0..max_pages`
    ///
    /// Never fails: a session that cannot be opened or a fatal page failure
    /// ends collection with whatever was gathered so far, and the reason is
    /// reported in [`ListingReport::ended`].
    pub async fn collect(&self, max_pages: u32) -> ListingReport {
        let mut rows: Vec<CandidateLink> = Vec::new();
        let mut pages_scanned = 0;
        let mut ended = ListingEnd::MaxPages;

        let mut guard = match SessionGuard::acquire(
            Arc::clone(&self.factory),
            SessionProfile::listing(),
            "listing",
        )
        .await
        {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!("Could not open listing session: {}", e);
                return ListingReport {
                    candidates: Vec::new(),
                    pages_scanned: 0,
                    total_rows: 0,
                    ended: ListingEnd::Fatal(e.to_string()),
                };
            }
        };

        let delay = DelayController::new(&self.context.monitor);

        for page in 0..max_pages {
            if self.context.stop.is_raised() {
                tracing::info!(page, "Stop requested, ending listing collection");
                ended = ListingEnd::Stopped;
                break;
            }

            let session = match guard.session_mut() {
                Ok(session) => session,
                Err(e) => {
                    ended = ListingEnd::Fatal(e.to_string());
                    break;
                }
            };

            pages_scanned += 1;
            match with_retry(&self.policy, session, |s| s.fetch_listing(page)).await {
                RetryOutcome::Success(page_rows) if page_rows.is_empty() => {
                    tracing::info!(page, "Listing page is empty, no more pages");
                    ended = ListingEnd::EmptyPage(page);
                    break;
                }
                RetryOutcome::Success(page_rows) => {
                    tracing::info!(page, rows = page_rows.len(), "Collected listing page");
                    rows.extend(page_rows);

                    if page + 1 < max_pages {
                        delay.pause(self.page_delay, self.page_jitter, false).await;
                    }
                }
                RetryOutcome::Exhausted { error, attempts } => {
                    tracing::warn!(
                        page,
                        attempts,
                        "Giving up on listing page, treating it as the end: {}",
                        error
                    );
                    ended = ListingEnd::RetriesExhausted(page);
                    break;
                }
                RetryOutcome::Fatal(error) => {
                    tracing::error!(page, "Fatal listing failure: {}", error);
                    ended = ListingEnd::Fatal(error.to_string());
                    break;
                }
            }
        }

        guard.release().await;

        let total_rows = rows.len();
        let candidates = dedup_by_identity(rows);
        tracing::info!(
            pages = pages_scanned,
            rows = total_rows,
            unique = candidates.len(),
            "Listing collection finished"
        );

        ListingReport {
            candidates,
            pages_scanned,
            total_rows,
            ended,
        }
    }
}

/// Collapses rows sharing an identity
///
/// The first occurrence fixes the position; the last occurrence supplies the
/// title.
pub fn dedup_by_identity(rows: Vec<CandidateLink>) -> Vec<CandidateLink> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut unique: Vec<CandidateLink> = Vec::with_capacity(rows.len());

    for row in rows {
        match positions.get(row.identity()) {
            Some(&index) => unique[index].title = row.title,
            None => {
                positions.insert(row.link.clone(), unique.len());
                unique.push(row);
            }
        }
    }

    unique
}
