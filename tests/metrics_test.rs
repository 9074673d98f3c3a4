//! Metrics emitted by the pipeline and the cache.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

mod common;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;

use common::{MockTransport, Reply, envelope};
use weub::pipeline::ApiRequest;
use weub::telemetry;

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` whose `label` equals `value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the inner async work.
fn recorded<F: Future>(work: F) -> (F::Output, SnapshotVec) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let output = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(work))
    });
    (output, snapshotter.snapshot().into_vec())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_request_records_count_and_duration() {
    let transport = Arc::new(MockTransport::new(envelope(json!({}))));
    let pipeline = common::pipeline(transport);

    let (result, snapshot) = recorded(pipeline.execute(ApiRequest::get("stats")));
    assert!(result.is_ok());

    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_are_counted_per_attempt() {
    let transport = Arc::new(
        MockTransport::new(envelope(json!({})))
            .then(Reply::Respond(weub::HttpResponse::new(503, "")))
            .then(Reply::Respond(weub::HttpResponse::new(503, ""))),
    );
    let pipeline = common::pipeline(transport);

    let (result, snapshot) = recorded(pipeline.execute(ApiRequest::get("stats")));
    assert!(result.is_ok());

    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failed_request_is_labelled_error() {
    let transport = Arc::new(MockTransport::new(common::error_envelope(
        404,
        "VIDEO_NOT_FOUND",
        "gone",
    )));
    let pipeline = common::pipeline(transport);

    let (result, snapshot) = recorded(pipeline.execute(ApiRequest::get("stats")));
    assert!(result.is_err());

    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hits_and_misses_are_counted() {
    let transport = Arc::new(MockTransport::new(envelope(json!({}))));
    let pipeline = common::pipeline(transport.clone());

    let (_, snapshot) = recorded(async {
        let _ = pipeline.execute(ApiRequest::get("videos")).await;
        let _ = pipeline.execute(ApiRequest::get("videos")).await;
        let _ = pipeline.execute(ApiRequest::get("videos")).await;
    });

    assert_eq!(transport.calls(), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn joined_requests_are_counted() {
    let transport = Arc::new(
        MockTransport::new(envelope(json!({}))).with_delay(Duration::from_millis(20)),
    );
    let pipeline = common::pipeline(transport.clone());

    let (_, snapshot) = recorded(async {
        let calls = (0..3).map(|_| pipeline.execute(ApiRequest::get("videos")));
        futures_util::future::join_all(calls).await
    });

    assert_eq!(transport.calls(), 1);
    assert_eq!(counter_total(&snapshot, telemetry::COALESCED_REQUESTS_TOTAL), 2);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let transport = Arc::new(MockTransport::new(envelope(json!({}))));
    let pipeline = common::pipeline(transport);
    pipeline.execute(ApiRequest::get("stats")).await.unwrap();
}
