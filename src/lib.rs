//! Gleaner: a resilient two-stage harvester for paginated record repositories
//!
//! Stage 1 pages through a listing and collects candidate links; stage 2 enriches
//! every candidate with detail fields using a pool of concurrent workers, each
//! owning its own fetch session. The crate guarantees that every discovered
//! candidate ends up as exactly one record in the output dataset.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Gleaner operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No candidates found after scanning {pages} listing page(s)")]
    NoCandidates { pages: u32 },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// How a fetch failure should be treated by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, navigation faults, throttling; worth another attempt
    Transient,

    /// The session cannot be used any more; the owning worker must stop
    Fatal,
}

/// Errors reported by the fetch capability
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Session could not be opened: {0}")]
    SessionUnavailable(String),

    #[error("Session failed: {0}")]
    Session(String),
}

impl FetchError {
    /// Classifies the failure
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } | Self::Status { .. } | Self::Navigation { .. } => {
                FailureKind::Transient
            }
            Self::SessionUnavailable(_) | Self::Session(_) => FailureKind::Fatal,
        }
    }

    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

/// Result type alias for Gleaner operations
pub type Result<T> = std::result::Result<T, GleanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{CandidateLink, DetailRecord};
pub use state::{PerformanceMonitor, PerformanceSnapshot, ResultCache, RunContext, StopSignal};
pub use url::canonical_link;
