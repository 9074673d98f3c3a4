//! Client configuration.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag or `WEUB_CONFIG`)
//! 2. `~/.weub/config.toml` (user)
//! 3. `/etc/weub/config.toml` (system)
//!
//! Every section is optional; missing values take the development defaults.
//! [`Config::production`] is the preset for the hosted service.
//!
//! Environment overrides, applied after loading:
//! - `WEUB_API_URL`: base URL of the API
//! - `WEUB_PRODUCTION`: `1`/`true` to enable production mode

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::pipeline::{PipelineBuilder, RetryConfig};
use crate::types::UploadLimits;
use crate::video::PollerConfig;
use crate::{Result, WeubError};

const DEVELOPMENT_API_URL: &str = "http://localhost:3000/api/v1";
const PRODUCTION_API_URL: &str = "https://api.weub.com/v1";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Production mode drops debugging headers.
    #[serde(default)]
    pub production: bool,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// API endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiConfig {
    /// Base URL (default: http://localhost:3000/api/v1).
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Sent as `X-API-Version` (default: "1.0.0").
    #[serde(default = "default_api_version")]
    pub version: String,
    /// Per-attempt request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Per-attempt upload timeout in seconds (default: 3600).
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            version: default_api_version(),
            timeout_secs: default_timeout(),
            upload_timeout_secs: default_upload_timeout(),
        }
    }
}

fn default_api_url() -> String {
    DEVELOPMENT_API_URL.to_string()
}

fn default_api_version() -> String {
    crate::version::API_VERSION.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_upload_timeout() -> u64 {
    3600
}

/// Status polling and retry settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollingConfig {
    /// Interval between status polls in milliseconds (default: 5000).
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,
    /// Retries per request after the first attempt (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay in milliseconds (default: 1000).
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds (default: 30000).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Stop polling after this many failed ticks in a row (default: never).
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
    /// Stop polling after this many seconds (default: never).
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_consecutive_failures: None,
            max_duration_secs: None,
        }
    }
}

fn default_status_interval() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheSection {
    /// Maximum cached responses (default: 100).
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    /// Fallback TTL in seconds (default: 300).
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
    /// Minimum seconds between sweeps (default: 600).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            default_ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_cache_entries() -> usize {
    100
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    600
}

/// Upload feature settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_true")]
    pub upload_enabled: bool,
    /// Maximum upload size in bytes (default: 2 GiB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted extensions (default: mp4, mov, webm, avi).
    #[serde(default = "default_formats")]
    pub supported_formats: Vec<String>,
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            upload_enabled: true,
            max_file_size: default_max_file_size(),
            supported_formats: default_formats(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    UploadLimits::default().max_file_size
}

fn default_formats() -> Vec<String> {
    UploadLimits::default().supported_formats
}

fn default_max_concurrent_uploads() -> usize {
    UploadLimits::default().max_concurrent_uploads
}

/// Catalog paging.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
    #[serde(default = "default_max_items_per_page")]
    pub max_items_per_page: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            items_per_page: default_items_per_page(),
            max_items_per_page: default_max_items_per_page(),
        }
    }
}

fn default_items_per_page() -> u32 {
    20
}

fn default_max_items_per_page() -> u32 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self::development()
    }
}

impl Config {
    /// Local development server: 5s polling, 3 retries.
    pub fn development() -> Self {
        Self {
            production: false,
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            cache: CacheSection::default(),
            features: FeaturesConfig::default(),
            ui: UiConfig::default(),
        }
    }

    /// Hosted service: 10s polling, 5 retries, no debugging headers.
    pub fn production() -> Self {
        Self {
            production: true,
            api: ApiConfig {
                url: PRODUCTION_API_URL.to_string(),
                ..ApiConfig::default()
            },
            polling: PollingConfig {
                status_interval_ms: 10_000,
                max_retries: 5,
                ..PollingConfig::default()
            },
            ..Self::development()
        }
    }

    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.weub/config.toml`
    /// 3. `/etc/weub/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Like [`load`](Self::load), but fall back to the development defaults
    /// when no config file exists and none was requested explicitly.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match explicit_path {
            Some(_) => Self::load(explicit_path),
            None => match Self::find_config_path() {
                Some(path) => Self::load_from_file(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WeubError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content)
            .map_err(|e| WeubError::Configuration(format!("In config file {path:?}: {e}")))
    }

    /// Parse and validate TOML content.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| WeubError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(WeubError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        Self::find_config_path().ok_or_else(|| {
            WeubError::Configuration(
                "No config file found. Create ~/.weub/config.toml or /etc/weub/config.toml"
                    .to_string(),
            )
        })
    }

    fn find_config_path() -> Option<PathBuf> {
        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".weub").join("config.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/weub/config.toml");
        system_config.exists().then_some(system_config)
    }

    /// Apply `WEUB_API_URL` and `WEUB_PRODUCTION` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WEUB_API_URL").filter(|u| !u.trim().is_empty()) {
            self.api.url = url.trim().to_string();
        }
        if let Some(flag) = lookup("WEUB_PRODUCTION") {
            self.production = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Reject values that would make the client misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.api.url.trim().is_empty() {
            return Err(WeubError::Configuration("api.url must not be empty".into()));
        }
        if self.api.timeout_secs == 0 || self.api.upload_timeout_secs == 0 {
            return Err(WeubError::Configuration(
                "api timeouts must be at least 1 second".into(),
            ));
        }
        if self.polling.status_interval_ms == 0 {
            return Err(WeubError::Configuration(
                "polling.status_interval_ms must be positive".into(),
            ));
        }
        if self.polling.base_delay_ms > self.polling.max_delay_ms {
            return Err(WeubError::Configuration(
                "polling.base_delay_ms must not exceed polling.max_delay_ms".into(),
            ));
        }
        if self.ui.items_per_page == 0 || self.ui.items_per_page > self.ui.max_items_per_page {
            return Err(WeubError::Configuration(
                "ui.items_per_page must be between 1 and ui.max_items_per_page".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_retries(self.polling.max_retries)
            .base_delay(Duration::from_millis(self.polling.base_delay_ms))
            .max_delay(Duration::from_millis(self.polling.max_delay_ms))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .default_ttl(Duration::from_secs(self.cache.default_ttl_secs))
            .sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs))
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.polling.status_interval_ms),
            max_consecutive_failures: self.polling.max_consecutive_failures,
            max_duration: self.polling.max_duration_secs.map(Duration::from_secs),
        }
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_size: self.features.max_file_size,
            supported_formats: self.features.supported_formats.clone(),
            max_concurrent_uploads: self.features.max_concurrent_uploads,
        }
    }

    /// Pipeline builder with this configuration applied. Transport and
    /// notification sink are left to the caller.
    pub fn pipeline_builder(&self) -> PipelineBuilder {
        PipelineBuilder::new()
            .base_url(&self.api.url)
            .api_version(&self.api.version)
            .production(self.production)
            .timeout(Duration::from_secs(self.api.timeout_secs))
            .upload_timeout(Duration::from_secs(self.api.upload_timeout_secs))
            .retry(self.retry_config())
            .cache_config(self.cache_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_development() {
        let config = Config::default();
        assert!(!config.production);
        assert_eq!(config.api.url, "http://localhost:3000/api/v1");
        assert_eq!(config.polling.status_interval_ms, 5000);
        assert_eq!(config.polling.max_retries, 3);
        assert_eq!(config.ui.items_per_page, 20);
    }

    #[test]
    fn production_preset() {
        let config = Config::production();
        assert!(config.production);
        assert_eq!(config.api.url, "https://api.weub.com/v1");
        assert_eq!(config.polling.status_interval_ms, 10_000);
        assert_eq!(config.polling.max_retries, 5);
        assert_eq!(config.polling.max_delay_ms, 30_000);
        assert_eq!(config.features.max_concurrent_uploads, 3);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [api]
            url = "https://staging.weub.com/v1"
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.api.url, "https://staging.weub.com/v1");
        // Defaults preserved
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.features.supported_formats.len(), 4);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            production = true

            [api]
            url = "https://api.weub.com/v1"
            version = "2.0.0"
            timeout_secs = 10

            [polling]
            status_interval_ms = 2500
            max_retries = 1
            max_consecutive_failures = 4
            max_duration_secs = 900

            [cache]
            max_entries = 10
            default_ttl_secs = 60

            [features]
            supported_formats = ["mp4"]
            max_concurrent_uploads = 1

            [ui]
            items_per_page = 50
        "#;
        let config = Config::parse(toml).unwrap();
        assert!(config.production);
        assert_eq!(config.api.version, "2.0.0");
        let poller = config.poller_config();
        assert_eq!(poller.interval, Duration::from_millis(2500));
        assert_eq!(poller.max_consecutive_failures, Some(4));
        assert_eq!(poller.max_duration, Some(Duration::from_secs(900)));
        assert_eq!(config.retry_config().max_retries, 1);
        assert_eq!(config.cache_config().max_entries, 10);
        assert_eq!(config.upload_limits().supported_formats, vec!["mp4"]);
        assert_eq!(config.ui.items_per_page, 50);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::parse("[polling]\nstatus_interval_ms = 0").is_err());
        assert!(Config::parse("[ui]\nitems_per_page = 500").is_err());
        assert!(Config::parse("[polling]\nbase_delay_ms = 60000").is_err());
        assert!(Config::parse("production = \"maybe\"").is_err());
    }

    #[test]
    fn env_overrides() {
        let mut config = Config::default();
        config.apply_env_from(|name| match name {
            "WEUB_API_URL" => Some(" https://env.weub.com/v1 ".into()),
            "WEUB_PRODUCTION" => Some("TRUE".into()),
            _ => None,
        });
        assert_eq!(config.api.url, "https://env.weub.com/v1");
        assert!(config.production);

        config.apply_env_from(|name| (name == "WEUB_PRODUCTION").then(|| "0".into()));
        assert!(!config.production);
        assert_eq!(config.api.url, "https://env.weub.com/v1");
    }
}
