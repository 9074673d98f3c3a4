//! Upload request, progress and receipt types

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::video::VideoStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }
}

/// Progress of one upload, keyed by upload id in the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadProgressRecord {
    pub id: String,
    pub filename: String,
    pub total_bytes: u64,
    pub bytes_transferred: u64,
    /// 0–100.
    pub progress_percent: u8,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgressRecord {
    pub fn new(id: impl Into<String>, filename: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            total_bytes,
            bytes_transferred: 0,
            progress_percent: 0,
            status: UploadStatus::Pending,
            error: None,
        }
    }
}

/// Bytes of a request body handed to the network so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Whole-number percentage, rounded; an empty body counts as complete.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = (self.bytes_sent as f64 / self.total_bytes as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// A video file plus the metadata sent alongside it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    /// MIME type; derived from the file extension when `None`.
    pub content_type: Option<String>,
    pub data: Bytes,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>, title: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
            title: title.into(),
            description: None,
            tags: Vec::new(),
        }
    }

    pub fn content_type(mut self, mime: impl Into<String>) -> Self {
        self.content_type = Some(mime.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lower-cased file extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    /// Explicit MIME type, or the one implied by the extension.
    pub fn mime_type(&self) -> String {
        if let Some(mime) = &self.content_type {
            return mime.clone();
        }
        match self.extension().as_deref() {
            Some("mp4") => "video/mp4",
            Some("mov") => "video/quicktime",
            Some("webm") => "video/webm",
            Some("avi") => "video/x-msvideo",
            _ => "application/octet-stream",
        }
        .to_string()
    }
}

/// Limits enforced before an upload is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    /// Maximum file size in bytes. Default: 2 GiB.
    pub max_file_size: u64,
    /// Accepted file extensions. Default: mp4, mov, webm, avi.
    pub supported_formats: Vec<String>,
    /// Maximum uploads running at once. Default: 3.
    pub max_concurrent_uploads: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: 2 * 1024 * 1024 * 1024,
            supported_formats: ["mp4", "mov", "webm", "avi"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_concurrent_uploads: 3,
        }
    }
}

/// Server receipt for an accepted upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedVideo {
    pub id: String,
    pub title: String,
    pub status: VideoStatus,
    pub original_filename: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_processing_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds() {
        let p = TransferProgress {
            bytes_sent: 1,
            total_bytes: 3,
        };
        assert_eq!(p.percent(), 33);
        let p = TransferProgress {
            bytes_sent: 2,
            total_bytes: 3,
        };
        assert_eq!(p.percent(), 67);
    }

    #[test]
    fn empty_body_is_complete() {
        let p = TransferProgress {
            bytes_sent: 0,
            total_bytes: 0,
        };
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn mime_from_extension() {
        let req = UploadRequest::new("Holiday.MOV", vec![0u8; 4], "Holiday");
        assert_eq!(req.extension().as_deref(), Some("mov"));
        assert_eq!(req.mime_type(), "video/quicktime");
        let req = req.content_type("video/mp4");
        assert_eq!(req.mime_type(), "video/mp4");
    }

    #[test]
    fn terminal_upload_states() {
        assert!(UploadStatus::Completed.is_terminal());
        assert!(UploadStatus::Cancelled.is_terminal());
        assert!(!UploadStatus::Uploading.is_terminal());
        assert!(!UploadStatus::Processing.is_terminal());
    }
}
