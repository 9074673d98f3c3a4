//! Config files on disk and what they turn into.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{MockTransport, envelope};
use weub::pipeline::ApiRequest;
use weub::{Config, VideoClient, WeubError};

const STAGING: &str = r#"
production = true

[api]
url = "https://staging.weub.com/v1"
timeout_secs = 5

[polling]
status_interval_ms = 2000
max_retries = 2

[ui]
items_per_page = 10
max_items_per_page = 25
"#;

#[test]
fn load_reads_an_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, STAGING).unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert!(config.production);
    assert_eq!(config.api.url, "https://staging.weub.com/v1");
    assert_eq!(config.poller_config().interval, Duration::from_secs(2));
    assert_eq!(config.retry_config().max_retries, 2);
    // Unset sections keep their defaults.
    assert_eq!(config.cache.max_entries, 100);
    assert!(config.features.upload_enabled);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    for result in [Config::load(Some(&path)), Config::load_or_default(Some(&path))] {
        match result {
            Err(WeubError::Configuration(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}

#[test]
fn invalid_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[polling]\nstatus_interval_ms = 0\n").unwrap();

    match Config::load_from_file(&path) {
        Err(WeubError::Configuration(msg)) => assert!(msg.contains("bad.toml")),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn client_from_config_applies_api_and_retry_settings() {
    let config = Config::parse(STAGING).unwrap();
    let client = VideoClient::from_config(&config, None).unwrap();

    assert_eq!(client.pipeline().base_url(), "https://staging.weub.com/v1");
    assert_eq!(client.pipeline().retry_config().max_retries, 2);
}

#[tokio::test]
async fn production_pipeline_sends_no_request_time() {
    let transport = Arc::new(MockTransport::new(envelope(json!({}))));
    let pipeline = Config::production()
        .pipeline_builder()
        .transport(transport.clone())
        .build()
        .unwrap();

    pipeline.execute(ApiRequest::get("stats")).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.url, "https://api.weub.com/v1/stats");
    assert!(request.headers.get("x-request-time").is_none());
    assert_eq!(request.headers["x-api-version"], "1.0.0");
}

#[tokio::test]
async fn development_pipeline_stamps_requests() {
    let transport = Arc::new(MockTransport::new(envelope(json!({}))));
    let pipeline = Config::development()
        .pipeline_builder()
        .transport(transport.clone())
        .build()
        .unwrap();

    pipeline.execute(ApiRequest::get("stats")).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.url, "http://localhost:3000/api/v1/stats");
    assert!(request.headers.contains_key("x-request-time"));
}
