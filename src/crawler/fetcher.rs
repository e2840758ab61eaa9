//! HTTP fetch capability
//!
//! This module provides the production [`SessionFactory`]. Each session owns
//! its own `reqwest` client (and therefore its own connection pool and cookie
//! jar), so recycling a session really does drop every connection it held.
//!
//! # Error classification
//!
//! | Condition | Kind |
//! |-----------|------|
//! | Timeout | Transient |
//! | Connection or body read failure | Transient |
//! | Any non-2xx status (404, 429, 5xx, ...) | Transient |
//! | Client cannot be built | Fatal |

use crate::config::SourceConfig;
use crate::crawler::parser::{parse_detail, parse_listing};
use crate::crawler::session::{FetchSession, SessionFactory, SessionProfile, SessionRole};
use crate::record::{CandidateLink, DetailRecord};
use crate::url::listing_page_url;
use crate::{FetchError, GleanError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Upper bound on the TCP connect phase
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds an HTTP client for one session
///
/// # Arguments
///
/// * `config` - The source configuration (user agent, timeouts)
/// * `fast_mode` - Use the shorter fast-mode request timeout
///
/// # Example
///
/// ```no_run
/// use gleaner::config::SourceConfig;
/// use gleaner::crawler::build_http_client;
///
/// let client = build_http_client(&SourceConfig::default(), false).unwrap();
/// ```
pub fn build_http_client(config: &SourceConfig, fast_mode: bool) -> Result<Client, reqwest::Error> {
    let timeout = config.timeout(fast_mode);

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Opens HTTP sessions against the configured listing
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    config: SourceConfig,
    base_url: Url,
}

impl HttpSessionFactory {
    /// Creates a factory for `config.base_url`
    ///
    /// # Returns
    ///
    /// * `Err(GleanError::UrlParse)` - if the base URL cannot be parsed
    pub fn new(config: SourceConfig) -> Result<Self, GleanError> {
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self { config, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self, profile: SessionProfile) -> Result<Box<dyn FetchSession>, FetchError> {
        // The listing stage never runs in fast mode
        let fast_mode = profile.role == SessionRole::Detail && profile.fast_mode;
        let client = build_http_client(&self.config, fast_mode)
            .map_err(|e| FetchError::SessionUnavailable(e.to_string()))?;

        Ok(Box::new(HttpSession {
            client: Some(client),
            base_url: self.base_url.clone(),
            requests: 0,
        }))
    }
}

/// A session backed by its own HTTP client
pub struct HttpSession {
    client: Option<Client>,
    base_url: Url,
    requests: u64,
}

impl HttpSession {
    async fn get_html(&mut self, url: &str) -> Result<String, FetchError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| FetchError::Session("session already closed".to_string()))?;
        self.requests += 1;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify_request_error(url, e))
    }
}

fn classify_request_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Navigation {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn fetch_listing(&mut self, page: u32) -> Result<Vec<CandidateLink>, FetchError> {
        let url = listing_page_url(&self.base_url, page);
        let html = self.get_html(url.as_str()).await?;
        Ok(parse_listing(&html, &url))
    }

    async fn fetch_detail(
        &mut self,
        candidate: &CandidateLink,
    ) -> Result<DetailRecord, FetchError> {
        let html = self.get_html(&candidate.link).await?;
        Ok(parse_detail(&html, candidate))
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        if self.client.take().is_some() {
            tracing::trace!(requests = self.requests, "HTTP session closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let config = SourceConfig::default();
        assert!(build_http_client(&config, false).is_ok());
        assert!(build_http_client(&config, true).is_ok());
    }

    #[test]
    fn test_factory_rejects_bad_base_url() {
        let config = SourceConfig {
            base_url: "not a url".to_string(),
            ..SourceConfig::default()
        };
        assert!(matches!(
            HttpSessionFactory::new(config),
            Err(GleanError::UrlParse(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_session_is_unusable() {
        let factory = HttpSessionFactory::new(SourceConfig::default()).unwrap();
        let mut session = factory.open(SessionProfile::listing()).await.unwrap();

        session.close().await.unwrap();
        let err = session
            .fetch_detail(&CandidateLink::new("t", "https://example.com/x"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_request_errors_are_transient() {
        let err = FetchError::Navigation {
            url: "https://example.com".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
    }

    // Responses are exercised against a mock server in the integration tests
}
