//! Loading indicator driven by the pipeline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{MockTransport, envelope};
use weub::pipeline::ApiRequest;

#[tokio::test(start_paused = true)]
async fn tracked_requests_raise_the_count_while_running() {
    let transport = Arc::new(
        MockTransport::new(envelope(json!({}))).with_delay(Duration::from_millis(100)),
    );
    let pipeline = common::pipeline(transport);
    let loading = pipeline.loading().clone();
    let mut changes = loading.subscribe();

    let running = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.execute(ApiRequest::get("videos")).await }
    });

    changes.changed().await.unwrap();
    assert_eq!(*changes.borrow_and_update(), 1);
    assert!(loading.is_loading());

    running.await.unwrap().unwrap();
    assert_eq!(loading.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn background_requests_are_not_counted() {
    let transport = Arc::new(
        MockTransport::new(envelope(common::status_json("processing")))
            .with_delay(Duration::from_millis(100)),
    );
    let pipeline = common::pipeline(transport);
    let loading = pipeline.loading().clone();

    let requests = [
        ApiRequest::get(format!("videos/{}/status", common::VIDEO_ID)),
        ApiRequest::get("health"),
        ApiRequest::get("videos").skip_loading(),
    ];
    for request in requests {
        let pipeline = pipeline.clone();
        let task = tokio::spawn(async move { pipeline.execute(request).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(loading.active(), 0);
        task.await.unwrap().unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn failed_requests_release_the_count() {
    let transport = Arc::new(MockTransport::new(common::error_envelope(
        500,
        "SERVER_ERROR",
        "boom",
    )));
    let pipeline = common::pipeline(transport);

    assert!(pipeline.execute(ApiRequest::get("stats")).await.is_err());
    assert_eq!(pipeline.loading().active(), 0);
}
