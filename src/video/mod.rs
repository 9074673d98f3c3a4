//! Video catalog API on top of the request pipeline.
//!
//! [`VideoClient`] validates ids before anything reaches the network, maps
//! each endpoint onto an [`ApiRequest`] and decodes the response envelope.
//! Status polling and route guards live in [`poller`] and [`guard`].

pub mod guard;
pub mod poller;

pub use guard::{GuardDecision, Route, VideoGuard};
pub use poller::{PollEvent, PollHandle, PollOutcome, PollState, PollerConfig, StatusPoller};

use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderValue};
use tracing::debug;

use crate::config::Config;
use crate::notify::NotificationSink;
use crate::pipeline::{ApiRequest, RequestPipeline, translate};
use crate::types::validation::validate_video_id;
use crate::types::{
    HealthReport, PageRequest, Resolution, ServiceStats, VideoDetail, VideoFilters, VideoPage,
    VideoStatusSnapshot,
};
use crate::{Result, WeubError};

const HLS_PLAYLIST_TYPE: &str = "application/vnd.apple.mpegurl";

/// Default and maximum catalog page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub default: u32,
    pub max: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            default: 20,
            max: 100,
        }
    }
}

/// Client for the video catalog, status and streaming endpoints.
#[derive(Clone)]
pub struct VideoClient {
    pipeline: RequestPipeline,
    pages: PageSizes,
}

impl VideoClient {
    pub fn new(pipeline: RequestPipeline) -> Self {
        Self {
            pipeline,
            pages: PageSizes::default(),
        }
    }

    /// Build a client, with its own pipeline, from a loaded [`Config`].
    pub fn from_config(
        config: &Config,
        notifications: Option<Arc<dyn NotificationSink>>,
    ) -> Result<Self> {
        let mut builder = config.pipeline_builder();
        if let Some(sink) = notifications {
            builder = builder.notifications(sink);
        }
        Ok(Self::new(builder.build()?).page_sizes(PageSizes {
            default: config.ui.items_per_page,
            max: config.ui.max_items_per_page,
        }))
    }

    pub fn page_sizes(mut self, pages: PageSizes) -> Self {
        self.pages = pages;
        self
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// One page of the catalog. Without `page` the first page is fetched at
    /// the default size; any size is clamped to `1..=max`.
    pub async fn list(
        &self,
        filters: &VideoFilters,
        page: Option<PageRequest>,
    ) -> Result<VideoPage> {
        let page = page.unwrap_or(PageRequest::new(1, self.pages.default));
        let page_size = page.page_size.clamp(1, self.pages.max.max(1));
        let request = ApiRequest::get("videos")
            .query_pairs(filters.to_query())
            .query("page", page.page.max(1).to_string())
            .query("pageSize", page_size.to_string());
        self.pipeline.fetch(request).await
    }

    pub async fn detail(&self, id: &str) -> Result<VideoDetail> {
        validate_video_id(id)?;
        self.pipeline.fetch(ApiRequest::get(format!("videos/{id}"))).await
    }

    /// Current processing status. Never served from the cache.
    pub async fn status(&self, id: &str) -> Result<VideoStatusSnapshot> {
        validate_video_id(id)?;
        self.pipeline
            .fetch(ApiRequest::get(format!("videos/{id}/status")).skip_cache())
            .await
    }

    pub fn thumbnail_url(&self, id: &str) -> Result<String> {
        validate_video_id(id)?;
        self.pipeline.url_for(&format!("videos/{id}/thumbnail"), &[])
    }

    /// HLS master playlist for one rendition.
    pub fn playlist_url(&self, id: &str, resolution: Resolution) -> Result<String> {
        validate_video_id(id)?;
        self.pipeline
            .url_for(&format!("stream/{id}/{resolution}/playlist.m3u8"), &[])
    }

    /// One media segment named in a playlist, e.g. `segment_003.ts`.
    pub fn segment_url(&self, id: &str, resolution: Resolution, segment: &str) -> Result<String> {
        validate_video_id(id)?;
        if segment.is_empty() || segment.contains('/') || segment.contains("..") {
            return Err(WeubError::InvalidInput(format!(
                "invalid segment name {segment:?}"
            )));
        }
        self.pipeline
            .url_for(&format!("stream/{id}/{resolution}/{segment}"), &[])
    }

    /// Playlist text for one rendition.
    pub async fn playlist(&self, id: &str, resolution: Resolution) -> Result<String> {
        let url = self.playlist_url(id, resolution)?;
        let request = ApiRequest::get(url)
            .header(ACCEPT, HeaderValue::from_static(HLS_PLAYLIST_TYPE))
            .skip_loading();
        self.pipeline.execute(request).await?.text()
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.pipeline.fetch(ApiRequest::get("health")).await
    }

    pub async fn stats(&self) -> Result<ServiceStats> {
        self.pipeline.fetch(ApiRequest::get("stats")).await
    }

    /// Drop cached detail and list responses after the video changed on the
    /// server. Returns how many entries were removed.
    pub fn invalidate(&self, id: &str) -> usize {
        let own = format!("/videos/{id}");
        let removed = self.pipeline.cache().invalidate_matching(|key| {
            let path = translate::path_of(key.url());
            path.contains(&own) || path.ends_with("/videos")
        });
        debug!(video_id = %id, removed, "invalidated cached video responses");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    const ID: &str = "3f1c2a4e-8b7d-4c3a-9e2f-1a2b3c4d5e6f";

    fn client() -> VideoClient {
        let pipeline = RequestPipeline::builder()
            .base_url("http://localhost:3000/api/v1/")
            .build()
            .unwrap();
        VideoClient::new(pipeline)
    }

    #[test]
    fn streaming_urls() {
        let client = client();
        assert_eq!(
            client.playlist_url(ID, Resolution::P720).unwrap(),
            format!("http://localhost:3000/api/v1/stream/{ID}/720p/playlist.m3u8")
        );
        assert_eq!(
            client
                .segment_url(ID, Resolution::P1080, "segment_003.ts")
                .unwrap(),
            format!("http://localhost:3000/api/v1/stream/{ID}/1080p/segment_003.ts")
        );
        assert_eq!(
            client.thumbnail_url(ID).unwrap(),
            format!("http://localhost:3000/api/v1/videos/{ID}/thumbnail")
        );
    }

    #[test]
    fn bad_ids_and_segments_are_rejected() {
        let client = client();
        assert_eq!(
            client.thumbnail_url("nope").unwrap_err().code(),
            ErrorCode::InvalidUuid
        );
        assert_eq!(
            client
                .segment_url(ID, Resolution::P720, "../secret")
                .unwrap_err()
                .code(),
            ErrorCode::InvalidInput
        );
    }
}
