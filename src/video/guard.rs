//! Access checks run before a video view is shown.
//!
//! Each guard answers with a [`GuardDecision`] and reports the reason for a
//! redirect through the notification sink. A malformed id is rejected
//! before any request is made.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::VideoClient;
use crate::notify::NotificationSink;
use crate::types::validation::is_valid_uuid;
use crate::types::{Notification, NotificationKind, VideoStatus};

/// Client-side views a guard can send the user to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Detail(String),
    Watch(String),
    Status(String),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Detail(id) => format!("/video/{id}"),
            Route::Watch(id) => format!("/video/{id}/watch"),
            Route::Status(id) => format!("/video/{id}/status"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

pub struct VideoGuard {
    videos: VideoClient,
    notifications: Arc<dyn NotificationSink>,
}

impl VideoGuard {
    pub fn new(videos: VideoClient, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            videos,
            notifications,
        }
    }

    /// Only a well-formed id passes. No request is made.
    pub fn valid_id(&self, id: &str) -> GuardDecision {
        if is_valid_uuid(id) {
            GuardDecision::Allow
        } else {
            self.invalid_id(id)
        }
    }

    /// Allow playback only for a `ready` video; otherwise send the user to
    /// the status view or home with an explanation.
    pub async fn ready(&self, id: &str) -> GuardDecision {
        if !is_valid_uuid(id) {
            return self.invalid_id(id);
        }
        let snapshot = match self.videos.status(id).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.not_found(id, &e),
        };
        match snapshot.status {
            VideoStatus::Ready => GuardDecision::Allow,
            VideoStatus::Processing => self.redirect(
                NotificationKind::Warning,
                "Video Still Processing",
                "This video is still being processed. Please wait a moment and try again.",
                Route::Status(id.to_string()),
            ),
            VideoStatus::Pending => self.redirect(
                NotificationKind::Info,
                "Video Queued",
                "This video is queued for processing. Please check back later.",
                Route::Status(id.to_string()),
            ),
            VideoStatus::Failed => self.redirect(
                NotificationKind::Error,
                "Processing Failed",
                "This video failed to process and cannot be played.",
                Route::Home,
            ),
            VideoStatus::Unknown(raw) => {
                debug!(video_id = %id, status = %raw, "unknown video status");
                self.redirect(
                    NotificationKind::Error,
                    "Unknown Status",
                    "This video has an unknown status and cannot be played.",
                    Route::Home,
                )
            }
        }
    }

    /// Allow any video the service knows about.
    pub async fn exists(&self, id: &str) -> GuardDecision {
        if !is_valid_uuid(id) {
            return self.invalid_id(id);
        }
        match self.videos.detail(id).await {
            Ok(_) => GuardDecision::Allow,
            Err(e) => self.not_found(id, &e),
        }
    }

    /// The status view is pointless for a finished video: send `ready`
    /// videos to the player.
    pub async fn processing(&self, id: &str) -> GuardDecision {
        if !is_valid_uuid(id) {
            return self.invalid_id(id);
        }
        match self.videos.detail(id).await {
            Ok(video) if video.summary.status == VideoStatus::Ready => {
                GuardDecision::Redirect(Route::Watch(id.to_string()))
            }
            Ok(_) => GuardDecision::Allow,
            Err(e) => self.not_found(id, &e),
        }
    }

    /// Allow a `ready` video with at least one rendition to stream.
    pub async fn streamable(&self, id: &str) -> GuardDecision {
        if !is_valid_uuid(id) {
            return self.invalid_id(id);
        }
        let video = match self.videos.detail(id).await {
            Ok(video) => video,
            Err(e) => return self.not_found(id, &e),
        };
        if video.summary.status != VideoStatus::Ready {
            return GuardDecision::Redirect(Route::Status(id.to_string()));
        }
        if video.summary.available_resolutions.is_empty() {
            return self.redirect(
                NotificationKind::Error,
                "No Streaming Quality Available",
                "This video has no available streaming qualities.",
                Route::Detail(id.to_string()),
            );
        }
        GuardDecision::Allow
    }

    fn invalid_id(&self, id: &str) -> GuardDecision {
        debug!(video_id = %id, "rejected malformed video id");
        self.redirect(
            NotificationKind::Error,
            "Invalid Video ID",
            "The video ID format is invalid.",
            Route::Home,
        )
    }

    fn not_found(&self, id: &str, error: &crate::WeubError) -> GuardDecision {
        debug!(video_id = %id, error = %error, "video lookup failed");
        self.redirect(
            NotificationKind::Error,
            "Video Not Found",
            "The requested video could not be found.",
            Route::Home,
        )
    }

    fn redirect(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        to: Route,
    ) -> GuardDecision {
        let mut notification = Notification::new(kind, title, message);
        if kind == NotificationKind::Error {
            notification = notification.persistent();
        }
        self.notifications.publish(notification);
        GuardDecision::Redirect(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_paths() {
        assert_eq!(Route::Home.path(), "/");
        assert_eq!(Route::Status("a".into()).to_string(), "/video/a/status");
        assert_eq!(Route::Watch("a".into()).path(), "/video/a/watch");
        assert_eq!(Route::Detail("a".into()).path(), "/video/a");
    }

    #[test]
    fn decision_allowed() {
        assert!(GuardDecision::Allow.is_allowed());
        assert!(!GuardDecision::Redirect(Route::Home).is_allowed());
    }
}
