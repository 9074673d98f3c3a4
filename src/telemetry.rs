//! Telemetry metric name constants.
//!
//! Centralised metric names for weub operations. Consumers install their own
//! `metrics` recorder (e.g. prometheus, statsd); without a recorder installed,
//! all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `weub_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `method`: HTTP method (e.g. "GET", "POST")
//! - `status`: "ok" or "error"
//! - `outcome`: poll tick result, "ok" or "error"

/// Total logical requests completed by the pipeline (retries count once).
///
/// Labels: `method`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "weub_requests_total";

/// Duration of a logical request in seconds, including retry backoff.
///
/// Labels: `method`.
pub const REQUEST_DURATION_SECONDS: &str = "weub_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `method`.
pub const RETRIES_TOTAL: &str = "weub_retries_total";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "weub_cache_hits_total";

/// Total response cache misses (including expired entries).
pub const CACHE_MISSES_TOTAL: &str = "weub_cache_misses_total";

/// Total entries removed to make room for a new key.
pub const CACHE_EVICTIONS_TOTAL: &str = "weub_cache_evictions_total";

/// Total callers that joined an identical in-flight request instead of
/// issuing their own.
pub const COALESCED_REQUESTS_TOTAL: &str = "weub_coalesced_requests_total";

/// Total status poll ticks.
///
/// Labels: `outcome`.
pub const POLL_TICKS_TOTAL: &str = "weub_poll_ticks_total";
