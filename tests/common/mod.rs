//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use weub::pipeline::RetryConfig;
use weub::transport::ProgressSender;
use weub::types::TransferProgress;
use weub::{HttpResponse, RequestPipeline, Result, Transport, TransportRequest, WeubError};

pub const VIDEO_ID: &str = "3f1c2a4e-8b7d-4c3a-9e2f-1a2b3c4d5e6f";
pub const BASE_URL: &str = "http://api.test/v1";

/// What the mock does for one call.
#[derive(Clone)]
pub enum Reply {
    Respond(HttpResponse),
    Fail(WeubError),
    /// Report `sent` byte counts on the progress channel, then respond.
    Progress {
        sent: Vec<u64>,
        total: u64,
        then: HttpResponse,
    },
}

/// Transport that plays back scripted replies and counts calls.
pub struct MockTransport {
    calls: AtomicU32,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Duration,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    /// Every call gets `response`.
    pub fn new(response: HttpResponse) -> Self {
        Self {
            calls: AtomicU32::new(0),
            script: Mutex::new(VecDeque::new()),
            fallback: Reply::Respond(response),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply for the next unscripted call.
    pub fn then(self, reply: Reply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: TransportRequest,
        progress: Option<ProgressSender>,
    ) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(error) => Err(error),
            Reply::Progress { sent, total, then } => {
                if let Some(tx) = progress {
                    for bytes_sent in sent {
                        let _ = tx.send(TransferProgress {
                            bytes_sent,
                            total_bytes: total,
                        });
                        tokio::task::yield_now().await;
                    }
                }
                Ok(then)
            }
        }
    }
}

/// `{data, statusCode: 200, error: null}`
pub fn envelope(data: Value) -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({ "data": data, "statusCode": 200, "error": null }),
    )
}

/// Error envelope with a matching HTTP status.
pub fn error_envelope(status: u16, code: &str, message: &str) -> HttpResponse {
    HttpResponse::json(
        status,
        &json!({
            "data": null,
            "statusCode": status,
            "error": { "code": code, "message": message }
        }),
    )
}

pub fn status_json(status: &str) -> Value {
    json!({
        "id": VIDEO_ID,
        "status": status,
        "progress": 50.0,
        "completedResolutions": [],
        "failedResolutions": [],
        "lastUpdated": "2025-03-01T12:00:00Z"
    })
}

pub fn detail_json(status: &str, resolutions: &[&str]) -> Value {
    json!({
        "id": VIDEO_ID,
        "title": "Clip",
        "status": status,
        "fileSize": 1024,
        "createdAt": "2025-03-01T12:00:00Z",
        "availableResolutions": resolutions,
        "originalFilename": "clip.mp4",
        "mimeType": "video/mp4"
    })
}

/// Fast retries without jitter, so paused-clock tests stay short.
pub fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .max_retries(3)
        .base_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(100))
        .jitter(false)
}

pub fn pipeline(transport: Arc<MockTransport>) -> RequestPipeline {
    RequestPipeline::builder()
        .base_url(BASE_URL)
        .retry(fast_retry())
        .transport(transport)
        .build()
        .unwrap()
}
