//! Processing-status polling.
//!
//! ```text
//!            ┌──────────── pending / processing / tick error ───┐
//!            ▼                                                  │
//!   start ─► Polling ── tick (status request, cache bypassed) ──┤
//!            │                                                  │
//!            │ cancel()            ready        failed / unknown / cap
//!            ▼                      ▼                ▼
//!        Cancelled                Ready            Failed
//! ```
//!
//! The first tick fires immediately, then one per interval. Once
//! cancellation is observed the task publishes nothing more, even when a
//! status request was still in flight.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::VideoClient;
use crate::notify::NotificationSink;
use crate::telemetry;
use crate::types::validation::validate_video_id;
use crate::types::{Notification, NotificationKind, VideoStatus, VideoStatusSnapshot};
use crate::{ApiError, ErrorCode, Result, WeubError};

const EVENT_CAPACITY: usize = 32;

/// Where the poller gets status snapshots from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, video_id: &str) -> Result<VideoStatusSnapshot>;
}

#[async_trait]
impl StatusSource for VideoClient {
    async fn fetch_status(&self, video_id: &str) -> Result<VideoStatusSnapshot> {
        self.status(video_id).await
    }
}

/// Polling cadence and optional give-up caps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between ticks. Default: 5 seconds.
    pub interval: Duration,
    /// Fail after this many failed ticks in a row. Default: never.
    pub max_consecutive_failures: Option<u32>,
    /// Fail once polling has run this long. Default: never.
    pub max_duration: Option<Duration>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_consecutive_failures: None,
            max_duration: None,
        }
    }
}

impl PollerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_consecutive_failures(mut self, n: u32) -> Self {
        self.max_consecutive_failures = Some(n);
        self
    }

    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Ready,
    Failed,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

/// Emitted in order on the poll's broadcast channel.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A tick returned a status.
    Snapshot(VideoStatusSnapshot),
    /// A tick failed after the pipeline's retries; polling continues.
    TickFailed { consecutive: u32, error: WeubError },
    StateChanged(PollState),
}

/// How a poll ended.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Ready(VideoStatusSnapshot),
    Failed {
        snapshot: Option<VideoStatusSnapshot>,
        error: WeubError,
    },
    Cancelled,
}

impl PollOutcome {
    pub fn state(&self) -> PollState {
        match self {
            PollOutcome::Ready(_) => PollState::Ready,
            PollOutcome::Failed { .. } => PollState::Failed,
            PollOutcome::Cancelled => PollState::Cancelled,
        }
    }
}

/// Starts status polls.
#[derive(Clone)]
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    config: PollerConfig,
    notifications: Option<Arc<dyn NotificationSink>>,
}

impl StatusPoller {
    pub fn new(source: Arc<dyn StatusSource>, config: PollerConfig) -> Self {
        Self {
            source,
            config,
            notifications: None,
        }
    }

    /// Announce terminal states through `sink`.
    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Start polling `video_id` on the current tokio runtime.
    pub fn start(&self, video_id: &str) -> Result<PollHandle> {
        validate_video_id(video_id)?;
        if self.config.interval.is_zero() {
            return Err(WeubError::Configuration(
                "poll interval must be non-zero".into(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| {
            WeubError::Configuration("status polling requires a tokio runtime".into())
        })?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(PollState::Polling);
        let (latest_tx, latest_rx) = watch::channel(None);
        let (events_tx, first_events) = broadcast::channel(EVENT_CAPACITY);

        let task = PollTask {
            video_id: video_id.to_string(),
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            notifications: self.notifications.clone(),
            cancel: cancel_rx,
            state: state_tx,
            latest: latest_tx,
            events: events_tx.clone(),
        };
        debug!(video_id, interval = ?self.config.interval, "status polling started");

        Ok(PollHandle {
            video_id: video_id.to_string(),
            cancel: cancel_tx,
            state: state_rx,
            latest: latest_rx,
            events: events_tx,
            first_events: Mutex::new(Some(first_events)),
            task: runtime.spawn(task.run()),
        })
    }
}

/// A running poll. Dropping the handle cancels it.
#[derive(Debug)]
pub struct PollHandle {
    video_id: String,
    cancel: watch::Sender<bool>,
    state: watch::Receiver<PollState>,
    latest: watch::Receiver<Option<VideoStatusSnapshot>>,
    events: broadcast::Sender<PollEvent>,
    first_events: Mutex<Option<broadcast::Receiver<PollEvent>>>,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Stop polling. No tick starts and no event is emitted afterwards.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    pub fn latest(&self) -> Option<VideoStatusSnapshot> {
        self.latest.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    pub fn watch_latest(&self) -> watch::Receiver<Option<VideoStatusSnapshot>> {
        self.latest.clone()
    }

    /// Event stream. The first subscriber also sees events emitted before
    /// it subscribed; later ones start from the time of the call.
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.first_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.events.subscribe())
    }

    /// [`subscribe`](Self::subscribe) as a stream. Events a slow consumer
    /// missed are skipped.
    pub fn events(&self) -> impl Stream<Item = PollEvent> + Send + Unpin + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|event| event.ok())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the poll to end.
    pub async fn wait(mut self) -> PollOutcome {
        (&mut self.task).await.unwrap_or(PollOutcome::Cancelled)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}

struct PollTask {
    video_id: String,
    source: Arc<dyn StatusSource>,
    config: PollerConfig,
    notifications: Option<Arc<dyn NotificationSink>>,
    cancel: watch::Receiver<bool>,
    state: watch::Sender<PollState>,
    latest: watch::Sender<Option<VideoStatusSnapshot>>,
    events: broadcast::Sender<PollEvent>,
}

impl PollTask {
    async fn run(mut self) -> PollOutcome {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;
        let mut cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return self.cancelled(),
                _ = ticker.tick() => {}
            }

            if let Some(max) = self.config.max_duration
                && started.elapsed() >= max
            {
                warn!(video_id = %self.video_id, elapsed = ?started.elapsed(), "status polling timed out");
                let snapshot = self.latest.borrow().clone();
                return self.finish(PollOutcome::Failed {
                    snapshot,
                    error: WeubError::Api(
                        ApiError::new(
                            ErrorCode::TimeoutError,
                            "Video processing is taking longer than expected.",
                        )
                        .with_detail("elapsedSecs", started.elapsed().as_secs()),
                    ),
                });
            }

            let result = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return self.cancelled(),
                result = self.source.fetch_status(&self.video_id) => result,
            };
            if self.is_cancelled() {
                return self.cancelled();
            }

            match result {
                Ok(snapshot) => {
                    failures = 0;
                    metrics::counter!(telemetry::POLL_TICKS_TOTAL, "outcome" => "ok").increment(1);
                    debug!(video_id = %self.video_id, status = %snapshot.status, progress = ?snapshot.progress, "status tick");
                    self.latest.send_replace(Some(snapshot.clone()));
                    let _ = self.events.send(PollEvent::Snapshot(snapshot.clone()));

                    match &snapshot.status {
                        VideoStatus::Pending | VideoStatus::Processing => {}
                        VideoStatus::Ready => return self.finish(PollOutcome::Ready(snapshot)),
                        VideoStatus::Failed => {
                            let error = WeubError::Api(ApiError::new(
                                ErrorCode::ProcessingFailed,
                                "Video processing failed.",
                            ));
                            return self.finish(PollOutcome::Failed {
                                snapshot: Some(snapshot),
                                error,
                            });
                        }
                        VideoStatus::Unknown(raw) => {
                            let error = WeubError::UnknownStatus(raw.clone());
                            return self.finish(PollOutcome::Failed {
                                snapshot: Some(snapshot),
                                error,
                            });
                        }
                    }
                }
                Err(error) => {
                    failures += 1;
                    metrics::counter!(telemetry::POLL_TICKS_TOTAL, "outcome" => "error")
                        .increment(1);
                    warn!(video_id = %self.video_id, consecutive = failures, error = %error, "status tick failed");
                    let _ = self.events.send(PollEvent::TickFailed {
                        consecutive: failures,
                        error: error.clone(),
                    });

                    if let Some(max) = self.config.max_consecutive_failures
                        && failures >= max
                    {
                        warn!(video_id = %self.video_id, failures, "status polling gave up");
                        let snapshot = self.latest.borrow().clone();
                        return self.finish(PollOutcome::Failed {
                            snapshot,
                            error: WeubError::Api(
                                ApiError::new(
                                    ErrorCode::ProcessingFailed,
                                    format!("Status polling gave up after {failures} failed attempts."),
                                )
                                .with_detail("lastError", error.user_message()),
                            ),
                        });
                    }
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn cancelled(self) -> PollOutcome {
        debug!(video_id = %self.video_id, "status polling cancelled");
        self.state.send_replace(PollState::Cancelled);
        let _ = self
            .events
            .send(PollEvent::StateChanged(PollState::Cancelled));
        PollOutcome::Cancelled
    }

    fn finish(self, outcome: PollOutcome) -> PollOutcome {
        let state = outcome.state();
        info!(video_id = %self.video_id, state = ?state, "status polling finished");
        self.state.send_replace(state);
        let _ = self.events.send(PollEvent::StateChanged(state));

        if let Some(sink) = &self.notifications {
            match &outcome {
                PollOutcome::Ready(_) => {
                    sink.publish(Notification::new(
                        NotificationKind::Success,
                        "Video Ready",
                        "Your video has been processed and is ready to watch.",
                    ));
                }
                PollOutcome::Failed { error, .. } => {
                    sink.publish(
                        Notification::new(
                            NotificationKind::Error,
                            "Processing Failed",
                            error.user_message(),
                        )
                        .persistent(),
                    );
                }
                PollOutcome::Cancelled => {}
            }
        }
        outcome
    }
}

/// Resolves once cancellation is requested or every handle is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_caps() {
        let config = PollerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.max_consecutive_failures, None);
        assert_eq!(config.max_duration, None);
    }

    #[test]
    fn outcome_states() {
        assert_eq!(PollOutcome::Cancelled.state(), PollState::Cancelled);
        assert!(PollState::Ready.is_terminal());
        assert!(!PollState::Polling.is_terminal());
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        struct Never;
        #[async_trait]
        impl StatusSource for Never {
            async fn fetch_status(&self, _: &str) -> Result<VideoStatusSnapshot> {
                Err(WeubError::Cancelled)
            }
        }
        let poller = StatusPoller::new(Arc::new(Never), PollerConfig::default());
        let err = poller
            .start("3f1c2a4e-8b7d-4c3a-9e2f-1a2b3c4d5e6f")
            .err()
            .unwrap();
        assert!(matches!(err, WeubError::Configuration(_)));
        assert_eq!(
            poller.start("bad").err().unwrap().code(),
            ErrorCode::InvalidUuid
        );
    }
}
