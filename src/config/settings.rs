//! Configuration settings structure
//!
//! Defines the main settings structure and loading logic for the enroller.

use crate::filter::{FilterSpec, SortDirection, SortKey, SortSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Remote course platform
    pub platform: PlatformSettings,
    /// Course discovery
    pub discovery: DiscoverySettings,
    /// Enrollment pacing and retries
    pub enrollment: EnrollmentSettings,
    /// Filter applied by the daily job
    pub daily_filter: FilterSpec,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Remote platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// Platform origin, e.g. `https://www.udemy.com`
    pub base_url: String,
    /// Cookie domains belonging to the platform
    pub cookie_domains: Vec<String>,
    /// Cookies a browser session must carry to be usable
    pub essential_cookies: Vec<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Maximum sources fetched concurrently
    pub max_workers: usize,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    pub real_discount: RealDiscountSettings,
    pub discudemy: DiscudemySettings,
}

/// Real Discount JSON API source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealDiscountSettings {
    pub enabled: bool,
    pub api_url: String,
    /// Page size requested from the API
    pub limit: u32,
}

/// Discudemy HTML source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscudemySettings {
    pub enabled: bool,
    pub base_url: String,
    /// Listing pages walked per run
    pub pages: u32,
    /// Pause between requests to the site
    pub page_delay_ms: u64,
}

/// Enrollment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentSettings {
    /// Minimum gap between outbound enrollment calls
    pub min_delay_ms: u64,
    /// Retries for transient failures
    pub max_retries: u32,
    /// First backoff step
    pub backoff_base_ms: u64,
    /// Backoff ceiling
    pub backoff_max_ms: u64,
    /// Wait after the platform signals rate limiting
    pub rate_limited_delay_ms: u64,
    /// Courses enrolled per daily run
    pub daily_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,
    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.udemy.com".to_string(),
            cookie_domains: vec!["udemy.com".to_string()],
            essential_cookies: vec!["access_token".to_string(), "client_id".to_string()],
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            request_timeout_secs: 30,
            real_discount: RealDiscountSettings::default(),
            discudemy: DiscudemySettings::default(),
        }
    }
}

impl Default for RealDiscountSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://cdn.real.discount/api/courses".to_string(),
            limit: 500,
        }
    }
}

impl Default for DiscudemySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.discudemy.com".to_string(),
            pages: 5,
            page_delay_ms: 500,
        }
    }
}

impl Default for EnrollmentSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: 2000,
            max_retries: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
            rate_limited_delay_ms: 60_000,
            daily_limit: 10,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbose: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform: PlatformSettings::default(),
            discovery: DiscoverySettings::default(),
            enrollment: EnrollmentSettings::default(),
            daily_filter: default_daily_filter(),
            logging: LoggingSettings::default(),
        }
    }
}

/// High-rated, short, programming-focused courses; no beginner material
fn default_daily_filter() -> FilterSpec {
    FilterSpec {
        min_rating: Some(4.0),
        max_duration_hours: Some(10.0),
        include_keywords: ["python", "javascript", "programming", "development", "web"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        exclude_keywords: ["beginner", "basic", "intro"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        sort: Some(SortSpec {
            key: SortKey::Rating,
            direction: SortDirection::Descending,
        }),
        ..FilterSpec::default()
    }
}

impl PlatformSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DiscoverySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| crate::Error::Config(format!("Invalid config file {:?}: {}", path, e)))
    }

    /// Load settings from environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::default().merge_with_env()
    }

    /// Override fields from `ENROLLER_*` environment variables
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        if let Ok(base_url) = std::env::var("ENROLLER_BASE_URL") {
            self.platform.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("ENROLLER_TIMEOUT") {
            self.platform.timeout_secs = timeout
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid timeout: {}", e)))?;
        }

        if let Ok(workers) = std::env::var("ENROLLER_MAX_WORKERS") {
            self.discovery.max_workers = workers
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid worker count: {}", e)))?;
        }

        if let Ok(delay) = std::env::var("ENROLLER_MIN_DELAY_MS") {
            self.enrollment.min_delay_ms = delay
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid delay: {}", e)))?;
        }

        if let Ok(limit) = std::env::var("ENROLLER_DAILY_LIMIT") {
            self.enrollment.daily_limit = limit
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid daily limit: {}", e)))?;
        }

        if let Ok(level) = std::env::var("ENROLLER_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> crate::Result<()> {
        url::Url::parse(&self.platform.base_url).map_err(|e| {
            crate::Error::Config(format!(
                "Invalid platform base_url {}: {}",
                self.platform.base_url, e
            ))
        })?;

        if self.platform.cookie_domains.is_empty() {
            return Err(crate::Error::config("platform.cookie_domains is empty"));
        }
        if self.platform.timeout_secs == 0 || self.discovery.request_timeout_secs == 0 {
            return Err(crate::Error::config("timeouts must be greater than zero"));
        }
        if self.discovery.max_workers == 0 {
            return Err(crate::Error::config("discovery.max_workers must be at least 1"));
        }
        if self.enrollment.backoff_base_ms > self.enrollment.backoff_max_ms {
            return Err(crate::Error::config(
                "enrollment.backoff_base_ms exceeds enrollment.backoff_max_ms",
            ));
        }

        self.daily_filter.validate()
    }
}
