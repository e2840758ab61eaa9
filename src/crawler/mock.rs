//! Scripted fetch capability for unit tests

use crate::crawler::session::{FetchSession, SessionFactory, SessionProfile};
use crate::record::{CandidateLink, DetailRecord};
use crate::FetchError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
pub enum MockFailure {
    Transient,
    Fatal,
}

impl MockFailure {
    fn into_error(self, url: &str) -> FetchError {
        match self {
            Self::Transient => FetchError::Timeout {
                url: url.to_string(),
            },
            Self::Fatal => FetchError::Session(format!("session crashed on {}", url)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockPlan {
    /// Rows per listing page; pages past the end are empty
    pub listing: Vec<Vec<CandidateLink>>,

    /// Failures returned before a listing page succeeds
    pub listing_failures: HashMap<u32, Vec<MockFailure>>,

    /// Links whose detail fetch always fails with the given kind
    pub detail_failures: HashMap<String, MockFailure>,

    /// Links that fail transiently this many times before succeeding
    pub flaky_details: HashMap<String, u32>,

    /// Links whose detail fetch panics the calling task
    pub panic_details: HashSet<String>,

    /// Number of sessions that open successfully; later opens fail
    pub open_failures_after: Option<usize>,

    pub close_fails: bool,
}

impl MockPlan {
    pub fn with_listing_sizes(sizes: &[usize]) -> Self {
        let listing = sizes
            .iter()
            .enumerate()
            .map(|(page, &size)| (0..size).map(|j| mock_candidate(page, j)).collect())
            .collect();
        Self {
            listing,
            ..Self::default()
        }
    }
}

pub fn mock_candidate(page: usize, item: usize) -> CandidateLink {
    CandidateLink::new(
        format!("Item {}-{}", page, item),
        format!("https://example.com/pub/{}-{}", page, item),
    )
}

pub fn mock_candidates(count: usize) -> Vec<CandidateLink> {
    (0..count).map(|i| mock_candidate(0, i)).collect()
}

pub fn mock_detail(candidate: &CandidateLink) -> DetailRecord {
    DetailRecord {
        title: format!("Detail of {}", candidate.title),
        link: candidate.link.clone(),
        authors: vec!["Author, A.".to_string()],
        published_date: Some("2024".to_string()),
        abstract_text: format!("Abstract for {}", candidate.link),
    }
}

#[derive(Debug, Default)]
struct MockState {
    opened: usize,
    closed: usize,
    listing_calls: Vec<u32>,
    detail_calls: HashMap<String, u32>,
    listing_failures: HashMap<u32, Vec<MockFailure>>,
    flaky: HashMap<String, u32>,
    live_sessions: HashSet<usize>,
}

pub struct MockFactory {
    plan: MockPlan,
    state: Arc<Mutex<MockState>>,
}

impl MockFactory {
    pub fn new(plan: MockPlan) -> Self {
        let state = MockState {
            listing_failures: plan.listing_failures.clone(),
            flaky: plan.flaky_details.clone(),
            ..MockState::default()
        };
        Self {
            plan,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().unwrap().live_sessions.len()
    }

    pub fn listing_calls(&self) -> Vec<u32> {
        self.state.lock().unwrap().listing_calls.clone()
    }

    pub fn detail_calls(&self, link: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .detail_calls
            .get(link)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_detail_calls(&self) -> u32 {
        self.state.lock().unwrap().detail_calls.values().sum()
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn open(&self, _profile: SessionProfile) -> Result<Box<dyn FetchSession>, FetchError> {
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = self.plan.open_failures_after {
            if state.opened >= limit {
                return Err(FetchError::SessionUnavailable("browser pool empty".to_string()));
            }
        }
        state.opened += 1;
        let id = state.opened;
        state.live_sessions.insert(id);

        Ok(Box::new(MockSession {
            id,
            plan: self.plan.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSession {
    id: usize,
    plan: MockPlan,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl FetchSession for MockSession {
    async fn fetch_listing(&mut self, page: u32) -> Result<Vec<CandidateLink>, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.listing_calls.push(page);

        if let Some(failures) = state.listing_failures.get_mut(&page) {
            if !failures.is_empty() {
                let failure = failures.remove(0);
                return Err(failure.into_error(&format!("listing?page={}", page)));
            }
        }

        Ok(self
            .plan
            .listing
            .get(page as usize)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_detail(
        &mut self,
        candidate: &CandidateLink,
    ) -> Result<DetailRecord, FetchError> {
        // Checked before locking so the shared state is never poisoned
        if self.plan.panic_details.contains(&candidate.link) {
            panic!("session {} blew up on {}", self.id, candidate.link);
        }

        let mut state = self.state.lock().unwrap();
        *state
            .detail_calls
            .entry(candidate.link.clone())
            .or_insert(0) += 1;

        if let Some(failure) = self.plan.detail_failures.get(&candidate.link) {
            return Err(failure.into_error(&candidate.link));
        }

        if let Some(remaining) = state.flaky.get_mut(&candidate.link) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MockFailure::Transient.into_error(&candidate.link));
            }
        }

        Ok(mock_detail(candidate))
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        let mut state = self.state.lock().unwrap();
        state.closed += 1;
        state.live_sessions.remove(&self.id);
        if self.plan.close_fails {
            return Err(FetchError::Session("close failed".to_string()));
        }
        Ok(())
    }
}
