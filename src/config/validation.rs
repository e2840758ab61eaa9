use crate::config::types::{CacheConfig, Config, CrawlConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use url::Url;

/// Longest pacing value accepted, in seconds
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_crawl_config(&config.crawl)?;
    validate_cache_config(&config.cache)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the listing source
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 || config.fast_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request timeouts must be at least 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl behavior
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    validate_seconds("delay", config.delay)?;
    validate_seconds("listing_delay", config.listing_delay)?;
    validate_seconds("listing_jitter", config.listing_jitter)?;

    if config.page_retries < 1 || config.detail_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry budgets must be >= 1, got page_retries={} detail_attempts={}",
            config.page_retries, config.detail_attempts
        )));
    }

    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_base_ms ({}) cannot exceed backoff_max_ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    if config.recycle_interval < 1 || config.fast_recycle_interval < 1 {
        return Err(ConfigError::Validation(
            "recycle intervals must be >= 1".to_string(),
        ));
    }

    if config.progress_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "progress_interval_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates cache sizing; a zero-capacity cache could never hold a record
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "cache capacity must be >= 1, got {}",
            config.capacity
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    for (name, value) in [
        ("links_file", &config.links_file),
        ("dataset_file", &config.dataset_file),
        ("stats_file", &config.stats_file),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.links_file == config.dataset_file {
        return Err(ConfigError::Validation(
            "links_file and dataset_file must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        )));
    }

    if value > MAX_DELAY_SECS {
        return Err(ConfigError::Validation(format!(
            "{} must be at most {} seconds, got {}",
            name, MAX_DELAY_SECS, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_crawl_config() {
        let mut config = CrawlConfig::default();
        assert!(validate_crawl_config(&config).is_ok());

        config.workers = 0;
        assert!(validate_crawl_config(&config).is_err());

        config = CrawlConfig {
            delay: -0.5,
            ..CrawlConfig::default()
        };
        assert!(validate_crawl_config(&config).is_err());

        config = CrawlConfig {
            delay: f64::NAN,
            ..CrawlConfig::default()
        };
        assert!(validate_crawl_config(&config).is_err());

        config = CrawlConfig {
            delay: MAX_DELAY_SECS,
            ..CrawlConfig::default()
        };
        assert!(validate_crawl_config(&config).is_ok());

        config = CrawlConfig {
            delay: 1e20,
            ..CrawlConfig::default()
        };
        assert!(validate_crawl_config(&config).is_err());

        config = CrawlConfig {
            listing_delay: 3600.5,
            ..CrawlConfig::default()
        };
        assert!(validate_crawl_config(&config).is_err());

        config = CrawlConfig {
            listing_jitter: f64::MAX,
            ..CrawlConfig::default()
        };
        assert!(validate_crawl_config(&config).is_err());

        config = CrawlConfig {
            page_retries: 0,
            ..CrawlConfig::default()
        };
        assert!(validate_crawl_config(&config).is_err());

        config = CrawlConfig {
            max_pages: 0,
            ..CrawlConfig::default()
        };
        assert!(validate_crawl_config(&config).is_err());
    }

    #[test]
    fn test_validate_cache_config() {
        assert!(validate_cache_config(&CacheConfig { capacity: 1 }).is_ok());
        assert!(validate_cache_config(&CacheConfig { capacity: 0 }).is_err());
    }

    #[test]
    fn test_validate_source_config() {
        let mut config = SourceConfig::default();
        assert!(validate_source_config(&config).is_ok());

        config.base_url = "not a url".to_string();
        assert!(matches!(
            validate_source_config(&config),
            Err(ConfigError::InvalidUrl(_))
        ));

        config.base_url = "ftp://example.com/list".to_string();
        assert!(validate_source_config(&config).is_err());
    }

    #[test]
    fn test_validate_output_config() {
        let mut config = OutputConfig::default();
        assert!(validate_output_config(&config).is_ok());

        config.stats_file = String::new();
        assert!(validate_output_config(&config).is_err());

        config = OutputConfig {
            dataset_file: "publications_links.json".to_string(),
            ..OutputConfig::default()
        };
        assert!(validate_output_config(&config).is_err());
    }
}
