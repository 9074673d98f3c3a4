//! Upload tracking.
//!
//! [`UploadTracker`] validates an upload, runs it on a spawned task through
//! the pipeline and keeps one [`UploadProgressRecord`] per upload:
//!
//! ```text
//!   pending ──(0 < sent < total)──► uploading ──(sent == total)──► completed
//!      │                               │                              │
//!      └────────── error ──────────────┴──────────► failed ◄──────────┘
//!      └────────── cancel() ───────────┴──────────► cancelled
//! ```
//!
//! A tick with zero bytes leaves the record `pending`. Terminal records
//! ignore later progress. A server rejection that arrives after the body
//! was fully sent still marks the record `failed`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::notify::NotificationSink;
use crate::pipeline::{ApiRequest, RequestPipeline};
use crate::transport::UploadForm;
use crate::types::validation::validate_upload;
use crate::types::{
    Notification, NotificationKind, TransferProgress, UploadLimits, UploadProgressRecord,
    UploadRequest, UploadStatus, UploadedVideo,
};
use crate::{Result, WeubError};

const UPLOAD_PATH: &str = "videos/upload";

/// Counts over the tracked uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Pending or uploading.
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    /// Bytes sent across every record.
    pub total_uploaded: u64,
}

struct Inner {
    pipeline: RequestPipeline,
    limits: UploadLimits,
    slots: Semaphore,
    records: watch::Sender<Vec<UploadProgressRecord>>,
    tasks: Mutex<HashMap<String, AbortHandle>>,
    notifications: Option<Arc<dyn NotificationSink>>,
}

/// Runs uploads and tracks their progress. Clones share the same records.
#[derive(Clone)]
pub struct UploadTracker {
    inner: Arc<Inner>,
}

impl UploadTracker {
    pub fn new(pipeline: RequestPipeline, limits: UploadLimits) -> Self {
        Self::build(pipeline, limits, None)
    }

    /// Announce finished uploads through `sink`.
    pub fn with_notifications(
        pipeline: RequestPipeline,
        limits: UploadLimits,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::build(pipeline, limits, Some(sink))
    }

    fn build(
        pipeline: RequestPipeline,
        limits: UploadLimits,
        notifications: Option<Arc<dyn NotificationSink>>,
    ) -> Self {
        let (records, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                pipeline,
                slots: Semaphore::new(limits.max_concurrent_uploads.max(1)),
                limits,
                records,
                tasks: Mutex::new(HashMap::new()),
                notifications,
            }),
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.inner.limits
    }

    /// Validate `request` and start uploading it. Uploads beyond the
    /// concurrency limit wait in `pending` for a free slot.
    pub fn start(&self, request: UploadRequest) -> Result<UploadHandle> {
        validate_upload(&request, &self.inner.limits)?;
        let runtime = Handle::try_current()
            .map_err(|_| WeubError::Configuration("uploads require a tokio runtime".into()))?;

        let id = Uuid::new_v4().to_string();
        let record = UploadProgressRecord::new(&id, &request.file_name, request.size());
        self.inner.records.send_modify(|records| records.push(record));
        debug!(upload_id = %id, file = %request.file_name, size = request.size(), "upload queued");

        let task = {
            let mut tasks = self.inner.tasks();
            let task = runtime.spawn(run(Arc::clone(&self.inner), id.clone(), request));
            tasks.insert(id.clone(), task.abort_handle());
            task
        };

        Ok(UploadHandle {
            id,
            tracker: self.clone(),
            task,
        })
    }

    /// Every tracked upload, oldest first.
    pub fn records(&self) -> Vec<UploadProgressRecord> {
        self.inner.records.borrow().clone()
    }

    pub fn record(&self, id: &str) -> Option<UploadProgressRecord> {
        self.inner
            .records
            .borrow()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Record list, updated on every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<UploadProgressRecord>> {
        self.inner.records.subscribe()
    }

    /// [`subscribe`](Self::subscribe) as a stream, starting with the
    /// current list.
    pub fn updates(&self) -> WatchStream<Vec<UploadProgressRecord>> {
        WatchStream::new(self.subscribe())
    }

    /// Stop an upload. Returns `false` when it already finished or is
    /// unknown.
    pub fn cancel(&self, id: &str) -> bool {
        let Some(task) = self.inner.tasks().remove(id) else {
            return false;
        };
        task.abort();
        self.inner.update(id, |record| {
            if !record.status.is_terminal() {
                record.status = UploadStatus::Cancelled;
            }
        });
        info!(upload_id = %id, "upload cancelled");
        true
    }

    /// Drop completed, failed and cancelled records. Returns how many
    /// were removed.
    pub fn clear_finished(&self) -> usize {
        let mut removed = 0;
        self.inner.records.send_if_modified(|records| {
            let before = records.len();
            records.retain(|r| !r.status.is_terminal());
            removed = before - records.len();
            removed > 0
        });
        removed
    }

    pub fn summary(&self) -> UploadSummary {
        let records = self.inner.records.borrow();
        records.iter().fold(UploadSummary::default(), |mut sum, r| {
            match r.status {
                UploadStatus::Pending | UploadStatus::Uploading => sum.active += 1,
                UploadStatus::Completed => sum.completed += 1,
                UploadStatus::Failed => sum.failed += 1,
                UploadStatus::Processing | UploadStatus::Cancelled => {}
            }
            sum.total_uploaded += r.bytes_transferred;
            sum
        })
    }
}

/// One running upload.
pub struct UploadHandle {
    id: String,
    tracker: UploadTracker,
    task: JoinHandle<Result<UploadedVideo>>,
}

impl UploadHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel(&self) -> bool {
        self.tracker.cancel(&self.id)
    }

    pub fn record(&self) -> Option<UploadProgressRecord> {
        self.tracker.record(&self.id)
    }

    /// Wait for the server's receipt. A cancelled upload yields
    /// [`WeubError::Cancelled`].
    pub async fn wait(self) -> Result<UploadedVideo> {
        match self.task.await {
            Ok(result) => result,
            Err(_) => Err(WeubError::Cancelled),
        }
    }
}

async fn run(inner: Arc<Inner>, id: String, request: UploadRequest) -> Result<UploadedVideo> {
    let _slot = inner
        .slots
        .acquire()
        .await
        .map_err(|_| WeubError::Cancelled)?;

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let api_request = ApiRequest::post(UPLOAD_PATH).multipart(UploadForm::from(&request));
    let upload = inner
        .pipeline
        .upload::<UploadedVideo>(api_request, progress_tx);
    tokio::pin!(upload);

    let result = loop {
        tokio::select! {
            Some(progress) = progress_rx.recv() => inner.apply_progress(&id, progress),
            result = &mut upload => break result,
        }
    };
    while let Ok(progress) = progress_rx.try_recv() {
        inner.apply_progress(&id, progress);
    }

    inner.finish(&id, &request.file_name, &result);
    result
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<String, AbortHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, id: &str, f: F)
    where
        F: FnOnce(&mut UploadProgressRecord),
    {
        self.records.send_if_modified(|records| {
            match records.iter_mut().find(|r| r.id == id) {
                Some(record) => {
                    let before = record.clone();
                    f(record);
                    *record != before
                }
                None => false,
            }
        });
    }

    fn apply_progress(&self, id: &str, progress: TransferProgress) {
        self.update(id, |record| advance(record, progress));
    }

    fn finish(&self, id: &str, file_name: &str, result: &Result<UploadedVideo>) {
        // Whoever removes the task entry owns the final transition.
        if self.tasks().remove(id).is_none() {
            return;
        }
        match result {
            Ok(video) => {
                self.update(id, |record| {
                    record.status = UploadStatus::Completed;
                    record.bytes_transferred = record.total_bytes;
                    record.progress_percent = 100;
                    record.error = None;
                });
                info!(upload_id = %id, video_id = %video.id, "upload completed");
                if let Some(sink) = &self.notifications {
                    sink.publish(Notification::new(
                        NotificationKind::Success,
                        "Upload Complete",
                        format!("\"{file_name}\" was uploaded and is being processed."),
                    ));
                }
            }
            Err(e) => {
                let message = e.user_message();
                self.update(id, |record| {
                    if record.status != UploadStatus::Cancelled {
                        record.status = UploadStatus::Failed;
                        record.error = Some(message);
                    }
                });
                warn!(upload_id = %id, error = %e, "upload failed");
            }
        }
    }
}

/// Apply one progress tick to a record.
fn advance(record: &mut UploadProgressRecord, progress: TransferProgress) {
    if record.status.is_terminal() {
        return;
    }
    let total = record.total_bytes;
    let sent = progress.bytes_sent.min(total);
    if sent == 0 && total > 0 {
        return;
    }
    record.bytes_transferred = sent;
    record.progress_percent = TransferProgress {
        bytes_sent: sent,
        total_bytes: total,
    }
    .percent();
    record.status = if sent >= total {
        UploadStatus::Completed
    } else {
        UploadStatus::Uploading
    };
}
