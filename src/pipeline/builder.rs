//! Builder for configuring pipeline instances

use std::sync::Arc;
use std::time::Duration;

use super::loading::LoadingTracker;
use super::retry::RetryConfig;
use super::translate::ErrorTranslator;
use super::{Inner, RequestPipeline};
use crate::cache::{CacheConfig, RequestCache};
use crate::notify::NotificationSink;
use crate::transport::{ReqwestTransport, Transport};
use crate::version;
use crate::{Result, WeubError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Builder for configuring pipeline instances.
///
/// ```rust,no_run
/// # use weub::pipeline::{RequestPipeline, RetryConfig};
/// # use std::time::Duration;
/// # fn main() -> weub::Result<()> {
/// let pipeline = RequestPipeline::builder()
///     .base_url("http://localhost:3000/api/v1")
///     .timeout(Duration::from_secs(10))
///     .retry(RetryConfig::new().max_retries(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct PipelineBuilder {
    base_url: Option<String>,
    api_version: String,
    production: bool,
    timeout: Duration,
    upload_timeout: Duration,
    retry: RetryConfig,
    cache: Option<Arc<RequestCache>>,
    cache_config: CacheConfig,
    transport: Option<Arc<dyn Transport>>,
    notifications: Option<Arc<dyn NotificationSink>>,
    notify_errors: bool,
    loading: Option<LoadingTracker>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_version: version::API_VERSION.to_string(),
            production: false,
            timeout: DEFAULT_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            retry: RetryConfig::default(),
            cache: None,
            cache_config: CacheConfig::default(),
            transport: None,
            notifications: None,
            notify_errors: true,
            loading: None,
        }
    }

    /// Base URL that relative request paths are joined onto (required).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Value of the `X-API-Version` header (default: "1.0.0").
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Production mode omits the `X-Request-Time` debugging header.
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Per-attempt timeout for ordinary requests (default: 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-attempt timeout for multipart uploads (default: 1h).
    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Share an existing cache (and its in-flight registry).
    pub fn cache(mut self, cache: Arc<RequestCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Configure the pipeline's own cache. Ignored when [`cache`](Self::cache)
    /// is set.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Use a custom transport instead of [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sink for error notifications.
    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    /// Whether failed requests publish an error notification (default: true,
    /// only effective with a sink).
    pub fn notify_errors(mut self, enabled: bool) -> Self {
        self.notify_errors = enabled;
        self
    }

    /// Share a loading tracker with other components.
    pub fn loading(mut self, tracker: LoadingTracker) -> Self {
        self.loading = Some(tracker);
        self
    }

    pub fn build(self) -> Result<RequestPipeline> {
        let base_url = self
            .base_url
            .ok_or_else(|| WeubError::Configuration("base URL is required".into()))?;
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| {
            WeubError::Configuration(format!("invalid base URL {base_url:?}: {e}"))
        })?;
        if self.timeout.is_zero() || self.upload_timeout.is_zero() {
            return Err(WeubError::Configuration("timeouts must be non-zero".into()));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(RequestPipeline {
            inner: Arc::new(Inner {
                base_url,
                api_version: self.api_version,
                production: self.production,
                timeout: self.timeout,
                upload_timeout: self.upload_timeout,
                retry: self.retry,
                cache: self
                    .cache
                    .unwrap_or_else(|| Arc::new(RequestCache::new(self.cache_config))),
                transport,
                translator: ErrorTranslator::new(),
                notifications: self.notifications,
                notify_errors: self.notify_errors,
                loading: self.loading.unwrap_or_default(),
            }),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
