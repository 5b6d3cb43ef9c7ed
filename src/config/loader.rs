//! Configuration loading utilities
//!
//! Provides helper functions for loading configuration from various sources
//! with proper error handling and validation.

use crate::{Result, config::Settings};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration loader with multiple source support
#[derive(Debug)]
pub struct ConfigLoader {
    /// Default settings
    defaults: Settings,
}

impl ConfigLoader {
    /// Create new configuration loader
    pub fn new() -> Self {
        Self {
            defaults: Settings::default(),
        }
    }

    /// Load configuration with precedence order:
    /// 1. Command line arguments (highest priority, applied by the caller)
    /// 2. Environment variables
    /// 3. Configuration file
    /// 4. Default values (lowest priority)
    pub fn load(&self, config_file: Option<&Path>) -> Result<Settings> {
        let mut settings = self.defaults.clone();

        // Load from config file if provided
        if let Some(path) = config_file {
            if path.exists() {
                info!("Loading configuration from file: {:?}", path);
                settings = Settings::from_file(path)?;
            } else {
                warn!("Configuration file not found: {:?}, using defaults", path);
            }
        }

        // Override with environment variables
        debug!("Applying environment variable overrides");
        settings = settings.merge_with_env()?;

        // Validate final configuration
        settings.validate()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:?}", settings);

        Ok(settings)
    }

    /// Load configuration from environment only
    pub fn from_env_only(&self) -> Result<Settings> {
        let settings = Settings::from_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Get default configuration
    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    /// Conventional config location: `<config dir>/coupon-enroller/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("coupon-enroller").join("config.toml"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_defaults() {
        let loader = ConfigLoader::new();
        let settings = loader.load(None).unwrap();

        assert_eq!(settings.platform.timeout_secs, 30);
        assert_eq!(settings.discovery.discudemy.pages, 5);
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[platform]
base_url = "http://localhost:8080"

[discovery]
max_workers = 2

[discovery.discudemy]
enabled = false

[daily_filter]
min_rating = 4.5
languages = ["English"]

[daily_filter.sort]
key = "duration"
direction = "ascending"
        "#
        )
        .unwrap();

        let loader = ConfigLoader::new();
        let settings = loader.load(Some(temp_file.path())).unwrap();

        assert_eq!(settings.platform.base_url, "http://localhost:8080");
        assert_eq!(settings.discovery.max_workers, 2);
        assert!(!settings.discovery.discudemy.enabled);
        assert!(settings.discovery.real_discount.enabled);
        assert_eq!(settings.daily_filter.min_rating, Some(4.5));
        assert_eq!(settings.daily_filter.languages, vec!["English"]);
        // Keys absent from the file keep their defaults
        assert_eq!(settings.enrollment.backoff_max_ms, 30_000);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[discovery]\nmax_workers = \"many\"").unwrap();

        let loader = ConfigLoader::new();
        let result = loader.load(Some(temp_file.path()));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let loader = ConfigLoader::new();
        let settings = loader
            .load(Some(Path::new("/definitely/not/here/config.toml")))
            .unwrap();
        assert_eq!(settings.discovery.discudemy.pages, 5);
    }

    #[test]
    fn test_env_var_override() {
        unsafe {
            std::env::set_var("ENROLLER_DAILY_LIMIT", "3");
            std::env::set_var("ENROLLER_MIN_DELAY_MS", "50");
        }

        let loader = ConfigLoader::new();
        let settings = loader.from_env_only().unwrap();

        assert_eq!(settings.enrollment.daily_limit, 3);
        assert_eq!(settings.enrollment.min_delay_ms, 50);

        unsafe {
            std::env::remove_var("ENROLLER_DAILY_LIMIT");
            std::env::remove_var("ENROLLER_MIN_DELAY_MS");
        }
    }
}
