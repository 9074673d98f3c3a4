//! Weub - resilient HTTP client for the Weub video streaming service
//!
//! The crate covers upload, transcoding status polling, HLS playlist and
//! segment addressing, and a filtered, paginated video catalog. Every call
//! goes through one [`RequestPipeline`]: a response cache with in-flight
//! coalescing, an exponential-backoff retry loop and error translation into
//! a uniform [`ApiError`].
//!
//! # Catalog Example
//!
//! ```rust,no_run
//! use weub::{Config, VideoClient};
//! use weub::types::{VideoFilters, VideoStatus};
//!
//! #[tokio::main]
//! async fn main() -> weub::Result<()> {
//!     let config = Config::load_or_default(None)?;
//!     let videos = VideoClient::from_config(&config, None)?;
//!
//!     let page = videos
//!         .list(&VideoFilters::new().status(VideoStatus::Ready), None)
//!         .await?;
//!     for video in page.videos {
//!         println!("{} {}", video.id, video.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Polling Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weub::{Config, PollOutcome, StatusPoller, VideoClient};
//!
//! #[tokio::main]
//! async fn main() -> weub::Result<()> {
//!     let config = Config::production();
//!     let videos = VideoClient::from_config(&config, None)?;
//!     let poller = StatusPoller::new(Arc::new(videos), config.poller_config());
//!
//!     let handle = poller.start("3f1c2a4e-8b7d-4c3a-9e2f-1a2b3c4d5e6f")?;
//!     match handle.wait().await {
//!         PollOutcome::Ready(snapshot) => println!("ready: {:?}", snapshot.completed_resolutions),
//!         PollOutcome::Failed { error, .. } => eprintln!("failed: {error}"),
//!         PollOutcome::Cancelled => {}
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod upload;
pub mod version;
pub mod video;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheKey, CacheStats, RequestCache};
pub use config::Config;
pub use error::{ApiError, ErrorCode, Result, WeubError};
pub use notify::{NotificationCenter, NotificationEvent, NotificationSink};
pub use pipeline::{ApiRequest, LoadingTracker, PipelineBuilder, RequestPipeline, RetryConfig};
pub use transport::{HttpResponse, ReqwestTransport, Transport, TransportRequest};
pub use upload::{UploadHandle, UploadSummary, UploadTracker};
pub use video::poller::StatusSource;
pub use video::{
    GuardDecision, PollEvent, PollHandle, PollOutcome, PollState, PollerConfig, Route,
    StatusPoller, VideoClient, VideoGuard,
};
