//! The request pipeline.
//!
//! Every call runs the same stages in a fixed order:
//!
//! ```text
//! ApiRequest
//!   → URL join (base URL + path, query appended)
//!   → header injection (Accept, Content-Type, X-API-Version, X-Request-Time)
//!   → sentinel headers read and stripped (X-Skip-Cache, X-Skip-Loading)
//!   → loading indicator
//!   → cache lookup / in-flight coalescing      (cacheable GETs only)
//!   → transport, per-attempt timeout
//!   → retry loop
//!   → error translation (+ error notification)
//! ```
//!
//! The part after the cache lookup runs once per [`CacheKey`] no matter how
//! many callers are waiting on it, so coalesced callers share one error
//! notification and one cache write.

pub mod builder;
pub mod loading;
pub mod retry;
pub mod translate;

pub use builder::PipelineBuilder;
pub use loading::{LoadingGuard, LoadingTracker, SKIP_LOADING_HEADER};
pub use retry::{RetryConfig, with_retry};
pub use translate::ErrorTranslator;

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheKey, RequestCache, SKIP_CACHE_HEADER, policy};
use crate::notify::NotificationSink;
use crate::telemetry;
use crate::transport::{
    HttpResponse, ProgressSender, RequestBody, Transport, TransportRequest, UploadForm,
};
use crate::types::{ApiEnvelope, Notification, NotificationKind};
use crate::{Result, WeubError};

const API_VERSION_HEADER: &str = "x-api-version";
const REQUEST_TIME_HEADER: &str = "x-request-time";

/// A request as written by the caller: method, path relative to the base
/// URL (or absolute), query pairs, headers and body.
///
/// ```rust
/// # use weub::pipeline::ApiRequest;
/// let request = ApiRequest::get("/videos")
///     .query("page", "2")
///     .skip_loading();
/// assert_eq!(request.path(), "/videos");
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append one query pair. Pairs are sent in the order they were added.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a header. Caller headers are never overridden by the pipeline.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Bypass the response cache and in-flight coalescing.
    pub fn skip_cache(self) -> Self {
        self.header(
            HeaderName::from_static(SKIP_CACHE_HEADER),
            HeaderValue::from_static("true"),
        )
    }

    /// Keep this request out of the loading indicator.
    pub fn skip_loading(self) -> Self {
        self.header(
            HeaderName::from_static(SKIP_LOADING_HEADER),
            HeaderValue::from_static("true"),
        )
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: UploadForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A request after URL join, header injection and sentinel stripping.
#[derive(Debug, Clone)]
struct Prepared {
    request: TransportRequest,
    path: String,
    skip_cache: bool,
    skip_loading: bool,
    timeout: Duration,
}

pub(crate) struct Inner {
    pub(crate) base_url: String,
    pub(crate) api_version: String,
    pub(crate) production: bool,
    pub(crate) timeout: Duration,
    pub(crate) upload_timeout: Duration,
    pub(crate) retry: RetryConfig,
    pub(crate) cache: Arc<RequestCache>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) translator: ErrorTranslator,
    pub(crate) notifications: Option<Arc<dyn NotificationSink>>,
    pub(crate) notify_errors: bool,
    pub(crate) loading: LoadingTracker,
}

/// Cache-aware, retrying HTTP pipeline. Cheap to clone; clones share the
/// cache, transport and loading indicator.
#[derive(Clone)]
pub struct RequestPipeline {
    inner: Arc<Inner>,
}

impl RequestPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.inner.cache
    }

    pub fn loading(&self) -> &LoadingTracker {
        &self.inner.loading
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Absolute URL for `path` with `query` appended, as the pipeline would
    /// send it.
    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<String> {
        self.resolve_url(path, query).map(String::from)
    }

    /// Run a request and return the raw response. Any failure, including a
    /// non-2xx status that survived the retries, is an [`WeubError::Api`].
    pub async fn execute(&self, request: ApiRequest) -> Result<HttpResponse> {
        self.send(request, None).await
    }

    /// Run a request and decode the `{data, statusCode, error}` envelope.
    /// An `error` in the envelope is a failure even on a 2xx status.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let url = request.path.clone();
        let response = self.execute(request).await?;
        self.decode_envelope(&response, &url)
    }

    /// Send a multipart upload, reporting body progress on `progress`.
    /// Uploads are never cached or coalesced.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        progress: ProgressSender,
    ) -> Result<T> {
        let url = request.path.clone();
        let response = self.send(request, Some(progress)).await?;
        self.decode_envelope(&response, &url)
    }

    fn decode_envelope<T: DeserializeOwned>(&self, response: &HttpResponse, url: &str) -> Result<T> {
        response
            .decode::<ApiEnvelope<T>>()
            .and_then(ApiEnvelope::into_result)
            .map_err(|e| WeubError::Api(self.inner.translator.translate(&e, url)))
    }

    async fn send(
        &self,
        request: ApiRequest,
        progress: Option<ProgressSender>,
    ) -> Result<HttpResponse> {
        let started = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();
        let prepared = self
            .prepare(request)
            .map_err(|e| WeubError::Api(self.inner.translator.translate(&e, &path)))?;

        let _loading = tracks(&prepared).then(|| self.inner.loading.start());
        let cacheable = progress.is_none()
            && policy::is_cacheable(&method, &prepared.path, prepared.skip_cache);

        let result = if cacheable {
            let key = CacheKey::new(method.as_str(), &prepared.request.url);
            match self.inner.cache.lookup(&key) {
                Some(hit) => Ok(hit),
                None => {
                    let this = self.clone();
                    let store_as = key.clone();
                    self.inner
                        .cache
                        .coalesce(key, move || async move {
                            this.dispatch(prepared, None, Some(store_as)).await
                        })
                        .await
                }
            }
        } else {
            self.dispatch(prepared, progress, None).await
        };

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "method" => method.as_str().to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "method" => method.as_str().to_owned(),
        )
        .record(started.elapsed().as_secs_f64());
        result
    }

    /// Network part of a request: attempts, retries, cache write on success,
    /// translation and notification on failure.
    async fn dispatch(
        &self,
        prepared: Prepared,
        progress: Option<ProgressSender>,
        store_as: Option<CacheKey>,
    ) -> Result<HttpResponse> {
        let inner = &self.inner;
        let method = prepared.request.method.as_str().to_owned();
        let url = prepared.request.url.clone();

        let outcome = with_retry(&inner.retry, &method, &url, |attempt| {
            let request = prepared.request.clone();
            let progress = progress.clone();
            let timeout = prepared.timeout;
            async move {
                debug!(method = %request.method, url = %request.url, attempt, "sending request");
                self.attempt(request, progress, timeout).await
            }
        })
        .await;

        match outcome {
            Ok(response) => {
                if let Some(key) = store_as
                    && let Some(ttl) = policy::ttl_for(
                        &prepared.path,
                        &prepared.request.headers,
                        &response.headers,
                        inner.cache.config().default_ttl,
                    )
                {
                    inner.cache.store(key, response.clone(), ttl);
                }
                Ok(response)
            }
            Err(e) => {
                let api = inner.translator.translate(&e, &url);
                debug!(method = %method, url = %url, code = %api.code, error = %e, "request failed");
                if inner.notify_errors
                    && let Some(sink) = &inner.notifications
                {
                    sink.publish(
                        Notification::new(NotificationKind::Error, "Error", api.message.clone())
                            .persistent(),
                    );
                }
                Err(WeubError::Api(api))
            }
        }
    }

    /// One transport call under the per-attempt timeout. Non-2xx responses
    /// become [`WeubError::Status`] so the retry loop can classify them.
    async fn attempt(
        &self,
        request: TransportRequest,
        progress: Option<ProgressSender>,
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let url = request.url.clone();
        let response =
            match tokio::time::timeout(timeout, self.inner.transport.send(request, progress)).await
            {
                Ok(result) => result?,
                Err(_) => return Err(WeubError::Timeout(timeout)),
            };
        if response.is_success() {
            Ok(response)
        } else {
            Err(status_error(response, url))
        }
    }

    fn prepare(&self, request: ApiRequest) -> Result<Prepared> {
        let ApiRequest {
            method,
            path,
            query,
            mut headers,
            body,
        } = request;

        let url = self.resolve_url(&path, &query)?;
        let url_path = url.path().to_string();

        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        if matches!(body, RequestBody::Json(_)) && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if !headers.contains_key(API_VERSION_HEADER) {
            let version = HeaderValue::from_str(&self.inner.api_version)
                .map_err(|e| WeubError::Configuration(format!("invalid API version: {e}")))?;
            headers.insert(API_VERSION_HEADER, version);
        }
        if !self.inner.production && !headers.contains_key(REQUEST_TIME_HEADER) {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            if let Ok(value) = HeaderValue::from_str(&now) {
                headers.insert(REQUEST_TIME_HEADER, value);
            }
        }

        let skip_cache = headers.remove(SKIP_CACHE_HEADER).is_some();
        let skip_loading = headers.remove(SKIP_LOADING_HEADER).is_some();

        let timeout = match body {
            RequestBody::Multipart(_) => self.inner.upload_timeout,
            _ => self.inner.timeout,
        };

        Ok(Prepared {
            request: TransportRequest {
                method,
                url: url.into(),
                headers,
                body,
            },
            path: url_path,
            skip_cache,
            skip_loading,
            timeout,
        })
    }

    /// Join `path` onto the base URL with exactly one `/`; absolute
    /// `http(s)://` URLs are used as given. Query pairs are appended in order.
    fn resolve_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let joined = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
        };
        let mut url = Url::parse(&joined)
            .map_err(|e| WeubError::Client(format!("invalid URL {joined:?}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

fn tracks(prepared: &Prepared) -> bool {
    loading::tracks_loading(
        &prepared.request.method,
        &prepared.path,
        prepared.skip_loading,
    )
}

fn status_error(response: HttpResponse, url: String) -> WeubError {
    let body = response
        .decode::<ApiEnvelope<Value>>()
        .ok()
        .and_then(|envelope| envelope.error);
    let retry_after = response
        .headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    WeubError::Status {
        status: response.status,
        url,
        body,
        retry_after,
    }
}

/// `Retry-After` as delta-seconds or an HTTP date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    (at.with_timezone(&Utc) - Utc::now()).to_std().ok()
}
