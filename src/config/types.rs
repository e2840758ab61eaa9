use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Gleaner
///
/// Every section has defaults, so an empty TOML file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub crawl: CrawlConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
}

/// Where the listing lives and how sessions talk to it
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Listing URL; page N is requested as `?page=N`
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout for normal runs (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Per-request timeout under fast mode (seconds)
    #[serde(rename = "fast-timeout-secs")]
    pub fast_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pureportal.coventry.ac.uk/en/organisations/fbl-school-of-economics-finance-and-accounting/publications/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 15,
            fast_timeout_secs: 10,
        }
    }
}

impl SourceConfig {
    /// Request timeout for the given profile
    pub fn timeout(&self, fast_mode: bool) -> Duration {
        if fast_mode {
            Duration::from_secs(self.fast_timeout_secs)
        } else {
            Duration::from_secs(self.request_timeout_secs)
        }
    }
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum listing pages to scan (stops early on an empty page)
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Number of concurrent detail workers
    pub workers: usize,

    /// Base per-item delay (seconds)
    pub delay: f64,

    /// Trade extraction completeness for throughput
    #[serde(rename = "fast-mode")]
    pub fast_mode: bool,

    /// Reuse a persisted candidate list instead of running stage 1
    pub resume: bool,

    /// Periodically log stage 2 progress
    pub progress: bool,

    #[serde(rename = "progress-interval-secs")]
    pub progress_interval_secs: u64,

    /// Attempts per listing page
    #[serde(rename = "page-retries")]
    pub page_retries: u32,

    /// Attempts per detail item before a placeholder is recorded
    #[serde(rename = "detail-attempts")]
    pub detail_attempts: u32,

    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    #[serde(rename = "backoff-max-ms")]
    pub backoff_max_ms: u64,

    /// Fetched items per session before it is recycled
    #[serde(rename = "recycle-interval")]
    pub recycle_interval: usize,

    #[serde(rename = "fast-recycle-interval")]
    pub fast_recycle_interval: usize,

    /// Extra pool rounds for items orphaned by aborted workers
    #[serde(rename = "requeue-rounds")]
    pub requeue_rounds: u32,

    /// Pause between listing pages (seconds)
    #[serde(rename = "listing-delay")]
    pub listing_delay: f64,

    #[serde(rename = "listing-jitter")]
    pub listing_jitter: f64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            workers: 12,
            delay: 0.15,
            fast_mode: false,
            resume: false,
            progress: false,
            progress_interval_secs: 10,
            page_retries: 3,
            detail_attempts: 1,
            backoff_base_ms: 2000,
            backoff_max_ms: 30_000,
            recycle_interval: 25,
            fast_recycle_interval: 15,
            requeue_rounds: 2,
            listing_delay: 1.5,
            listing_jitter: 0.8,
        }
    }
}

impl CrawlConfig {
    /// Per-item delay actually used; fast mode caps it at 100ms
    pub fn effective_delay(&self) -> f64 {
        if self.fast_mode {
            self.delay.min(0.1)
        } else {
            self.delay
        }
    }

    /// Jitter applied around the per-item delay
    pub fn item_jitter(&self) -> f64 {
        self.effective_delay() * 0.3
    }

    /// Session recycle interval for the active profile
    pub fn effective_recycle_interval(&self) -> usize {
        if self.fast_mode {
            self.fast_recycle_interval
        } else {
            self.recycle_interval
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached detail records
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives every output file
    pub directory: PathBuf,

    /// Persisted stage 1 candidate list
    #[serde(rename = "links-file")]
    pub links_file: String,

    /// Final merged dataset
    #[serde(rename = "dataset-file")]
    pub dataset_file: String,

    /// Performance snapshot
    #[serde(rename = "stats-file")]
    pub stats_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data"),
            links_file: "publications_links.json".to_string(),
            dataset_file: "publications.json".to_string(),
            stats_file: "performance_stats.json".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn links_path(&self) -> PathBuf {
        self.directory.join(&self.links_file)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.directory.join(&self.dataset_file)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.directory.join(&self.stats_file)
    }
}
