mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;

use common::{MockTransport, Reply, envelope, error_envelope, pipeline};
use weub::pipeline::{ApiRequest, RetryConfig, with_retry};
use weub::{ErrorCode, HttpResponse, RequestPipeline, Result, WeubError};

fn status(code: u16) -> WeubError {
    WeubError::Status {
        status: code,
        url: "http://api.test/v1/videos".into(),
        body: None,
        retry_after: None,
    }
}

/// Operation that fails `failures` times with `fail_with`, then succeeds.
struct FailThenSucceed {
    remaining: AtomicU32,
    calls: AtomicU32,
    fail_with: fn() -> WeubError,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> WeubError) -> Self {
        Self {
            remaining: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            fail_with,
        }
    }

    async fn call(&self) -> Result<&'static str> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.remaining.load(Ordering::SeqCst) > 0 {
            self.remaining.fetch_sub(1, Ordering::SeqCst);
            return Err((self.fail_with)());
        }
        Ok("ok")
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn retry_config_defaults() {
    let config = RetryConfig::default();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.base_delay, Duration::from_secs(1));
    assert_eq!(config.max_delay, Duration::from_secs(30));
    assert!(config.jitter);
}

#[test]
fn retry_config_disabled() {
    let config = RetryConfig::disabled();
    assert_eq!(config.max_retries, 0);
    assert!(!config.should_retry(&status(503), 0));
}

#[test]
fn eligibility_by_status() {
    let config = RetryConfig::new().max_retries(3);
    for attempt in 0..3 {
        assert!(config.should_retry(&status(500), attempt));
        assert!(config.should_retry(&status(429), attempt));
        assert!(!config.should_retry(&status(404), attempt));
    }
    assert!(!config.should_retry(&status(500), 3));
    assert!(!config.should_retry(&status(429), 4));
}

#[test]
fn backoff_never_exceeds_max_delay() {
    let config = RetryConfig::new()
        .base_delay(Duration::from_millis(700))
        .max_delay(Duration::from_secs(5));
    let mut previous = Duration::ZERO;
    for attempt in 0..64 {
        let base = config.delay_for_attempt(attempt);
        assert!(base >= previous, "un-jittered delay must not decrease");
        previous = base;
        for _ in 0..20 {
            assert!(config.backoff_delay(attempt) <= config.max_delay);
        }
    }
}

// ============================================================================
// Retry loop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn retries_transient_errors_then_succeeds() {
    let op = FailThenSucceed::new(2, || status(503));
    let config = common::fast_retry();

    let result = with_retry(&config, "GET", "http://api.test/v1/x", |_| op.call()).await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(op.call_count(), 3); // 2 failures + 1 success
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_retries() {
    let op = FailThenSucceed::new(10, || WeubError::Network("unreachable".into()));
    let config = common::fast_retry().max_retries(2);

    let result = with_retry(&config, "GET", "http://api.test/v1/x", |_| op.call()).await;

    assert!(matches!(result, Err(WeubError::Network(_))));
    assert_eq!(op.call_count(), 3); // first attempt + 2 retries
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_are_not_retried() {
    let op = FailThenSucceed::new(1, || status(404));
    let result = with_retry(&common::fast_retry(), "GET", "u", |_| op.call()).await;

    assert!(result.is_err());
    assert_eq!(op.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn sleeps_follow_the_backoff_schedule() {
    let op = FailThenSucceed::new(3, || status(500));
    let config = RetryConfig::new()
        .max_retries(3)
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(1))
        .jitter(false);

    let started = tokio::time::Instant::now();
    with_retry(&config, "GET", "u", |_| op.call()).await.unwrap();

    // 100 + 200 + 400
    assert_eq!(started.elapsed(), Duration::from_millis(700));
}

// ============================================================================
// Through the pipeline
// ============================================================================

#[tokio::test(start_paused = true)]
async fn pipeline_retries_5xx_and_429() {
    let transport = Arc::new(
        MockTransport::new(envelope(json!({"ok": true})))
            .then(Reply::Respond(error_envelope(503, "SERVER_ERROR", "busy")))
            .then(Reply::Respond(HttpResponse::new(429, "").with_header("Retry-After", "0"))),
    );
    let pipeline = pipeline(transport.clone());

    let value: serde_json::Value = pipeline.fetch(ApiRequest::get("stats")).await.unwrap();

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn pipeline_does_not_retry_404() {
    let transport = Arc::new(MockTransport::new(error_envelope(
        404,
        "VIDEO_NOT_FOUND",
        "Video not found",
    )));
    let pipeline = pipeline(transport.clone());

    let err = pipeline
        .execute(ApiRequest::get(format!("videos/{}", common::VIDEO_ID)))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::VideoNotFound);
    assert_eq!(err.status(), Some(404));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_responses_time_out_and_are_retried() {
    let transport = Arc::new(
        MockTransport::new(envelope(json!(1))).with_delay(Duration::from_secs(60)),
    );
    let pipeline = RequestPipeline::builder()
        .base_url(common::BASE_URL)
        .timeout(Duration::from_secs(5))
        .retry(common::fast_retry().max_retries(1))
        .transport(transport.clone())
        .build()
        .unwrap();

    let err = pipeline.execute(ApiRequest::get("stats")).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::TimeoutError);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_the_translated_error() {
    let transport = Arc::new(MockTransport::new(HttpResponse::new(502, "bad gateway")));
    let pipeline = pipeline(transport.clone());

    let err = pipeline.execute(ApiRequest::get("stats")).await.unwrap_err();

    assert_eq!(transport.calls(), 4); // 1 + max_retries
    match err {
        WeubError::Api(api) => {
            assert_eq!(api.code, ErrorCode::ServerError);
            assert_eq!(api.status, Some(502));
            assert_eq!(api.message, "Server temporarily unavailable.");
        }
        other => panic!("expected translated error, got {other:?}"),
    }
}
