//! Fetch capability seam
//!
//! The crawl engine never talks to the network directly. It asks a
//! [`SessionFactory`] for a [`FetchSession`] and drives that session; each
//! worker owns exactly one session at a time. [`SessionGuard`] ties a session's
//! lifetime to the owning stage and makes release explicit on every exit path.

use crate::record::{CandidateLink, DetailRecord};
use crate::FetchError;
use async_trait::async_trait;
use std::sync::Arc;

/// What a session will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Listing,
    Detail,
}

/// Parameters a factory may use to tune the sessions it opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProfile {
    pub role: SessionRole,
    pub fast_mode: bool,
}

impl SessionProfile {
    pub fn listing() -> Self {
        Self {
            role: SessionRole::Listing,
            fast_mode: false,
        }
    }

    pub fn detail(fast_mode: bool) -> Self {
        Self {
            role: SessionRole::Detail,
            fast_mode,
        }
    }
}

/// A stateful connection to the repository, owned by a single worker
#[async_trait]
pub trait FetchSession: Send {
    /// Fetches listing page `page` (zero-based) and returns its rows
    ///
    /// An empty vector means the page exists but lists nothing.
    async fn fetch_listing(&mut self, page: u32) -> Result<Vec<CandidateLink>, FetchError>;

    /// Fetches and extracts the detail record for one candidate
    async fn fetch_detail(&mut self, candidate: &CandidateLink)
        -> Result<DetailRecord, FetchError>;

    /// Releases the session's resources
    async fn close(&mut self) -> Result<(), FetchError>;
}

/// Opens fetch sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, profile: SessionProfile) -> Result<Box<dyn FetchSession>, FetchError>;
}

/// Holds one worker's session and guarantees it is closed exactly once
pub struct SessionGuard {
    factory: Arc<dyn SessionFactory>,
    profile: SessionProfile,
    label: String,
    session: Option<Box<dyn FetchSession>>,
}

impl SessionGuard {
    /// Opens a session; failure here is fatal for the caller
    pub async fn acquire(
        factory: Arc<dyn SessionFactory>,
        profile: SessionProfile,
        label: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let label = label.into();
        let session = factory.open(profile).await?;
        tracing::debug!(owner = %label, "Session opened");

        Ok(Self {
            factory,
            profile,
            label,
            session: Some(session),
        })
    }

    /// The live session
    ///
    /// Fails only after a recycle could not open a replacement.
    pub fn session_mut(&mut self) -> Result<&mut (dyn FetchSession + 'static), FetchError> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| FetchError::Session(format!("{} has no open session", self.label)))
    }

    /// Closes the current session and opens a fresh one
    ///
    /// A failure to close is logged and ignored; a failure to open is returned
    /// and leaves the guard without a session.
    pub async fn recycle(&mut self) -> Result<(), FetchError> {
        self.close_current().await;
        let session = self.factory.open(self.profile).await?;
        self.session = Some(session);
        tracing::debug!(owner = %self.label, "Session recycled");
        Ok(())
    }

    /// Closes the session if one is open
    pub async fn release(mut self) {
        self.close_current().await;
    }

    async fn close_current(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.close().await {
                Ok(()) => tracing::debug!(owner = %self.label, "Session closed"),
                Err(e) => tracing::warn!(owner = %self.label, "Error closing session: {}", e),
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.session.is_some() {
            // Only reachable when the owning task was cancelled or panicked
            tracing::warn!(owner = %self.label, "Session dropped without being released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::mock::{MockFactory, MockPlan};

    #[tokio::test]
    async fn test_acquire_and_release_closes_once() {
        let factory = Arc::new(MockFactory::new(MockPlan::default()));
        let guard = SessionGuard::acquire(factory.clone(), SessionProfile::detail(false), "w0")
            .await
            .unwrap();

        assert_eq!(factory.opened(), 1);
        guard.release().await;
        assert_eq!(factory.closed(), 1);
    }

    #[tokio::test]
    async fn test_recycle_replaces_session() {
        let factory = Arc::new(MockFactory::new(MockPlan::default()));
        let mut guard =
            SessionGuard::acquire(factory.clone(), SessionProfile::detail(true), "w1")
                .await
                .unwrap();

        guard.recycle().await.unwrap();
        assert_eq!(factory.opened(), 2);
        assert_eq!(factory.closed(), 1);
        assert!(guard.session_mut().is_ok());

        guard.release().await;
        assert_eq!(factory.closed(), 2);
    }

    #[tokio::test]
    async fn test_recycle_open_failure_leaves_guard_empty() {
        let plan = MockPlan {
            open_failures_after: Some(1),
            ..MockPlan::default()
        };
        let factory = Arc::new(MockFactory::new(plan));
        let mut guard =
            SessionGuard::acquire(factory.clone(), SessionProfile::detail(false), "w2")
                .await
                .unwrap();

        assert!(guard.recycle().await.is_err());
        assert!(guard.session_mut().is_err());
        assert_eq!(factory.closed(), 1);
        guard.release().await;
        assert_eq!(factory.closed(), 1);
    }
}
