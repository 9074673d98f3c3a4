//! Public types for the Weub API.

mod envelope;
mod filter;
mod notification;
mod system;
mod upload;
pub mod validation;
mod video;

pub use envelope::{ApiEnvelope, ApiErrorBody};
pub use filter::{PageRequest, Pagination, SortBy, SortOrder, VideoFilters, VideoPage};
pub use notification::{Notification, NotificationKind};
pub use system::{HealthReport, HealthState, HealthStats, ServiceHealth, ServiceStats};
pub use upload::{
    TransferProgress, UploadLimits, UploadProgressRecord, UploadRequest, UploadStatus,
    UploadedVideo,
};
pub use video::{
    ProcessingHistoryEntry, Resolution, VideoDetail, VideoOutput, VideoStatus,
    VideoStatusSnapshot, VideoSummary,
};
