//! User-facing notification records

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    /// How long a non-persistent notification stays up by default.
    pub fn default_duration(&self) -> Duration {
        match self {
            NotificationKind::Success | NotificationKind::Info => Duration::from_secs(5),
            NotificationKind::Warning => Duration::from_secs(8),
            NotificationKind::Error => Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// `None` for persistent notifications.
    pub auto_dismiss_after: Option<Duration>,
    pub persistent: bool,
}

impl Notification {
    /// Build a notification with the kind's default lifetime.
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: format!("notification_{}", uuid::Uuid::new_v4().simple()),
            kind,
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
            auto_dismiss_after: Some(kind.default_duration()),
            persistent: false,
        }
    }

    /// Keep the notification until it is dismissed explicitly.
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self.auto_dismiss_after = None;
        self
    }

    /// Override the auto-dismiss delay.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.persistent = false;
        self.auto_dismiss_after = Some(duration);
        self
    }
}
