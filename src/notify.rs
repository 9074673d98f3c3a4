//! User-facing notifications.
//!
//! [`NotificationSink`] is the seam through which the pipeline, guards and
//! pollers report to the user. Publishing is synchronous and never waits on
//! the consumer. [`NotificationCenter`] is the in-memory implementation:
//! it keeps the active list, broadcasts every change and dismisses
//! non-persistent notifications on a spawned timer when a tokio runtime is
//! available.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{Notification, NotificationKind};

/// Capacity of the event channel; slow subscribers lose the oldest events.
const EVENT_CAPACITY: usize = 64;

/// Receives notifications. Implementations must not block.
pub trait NotificationSink: Send + Sync {
    /// Show a notification. Returns its id.
    fn publish(&self, notification: Notification) -> String;

    /// Remove a notification. Unknown ids are ignored.
    fn dismiss(&self, id: &str);
}

/// Change to the active notification list.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Published(Notification),
    Dismissed(String),
    Cleared,
}

struct Inner {
    active: Mutex<Vec<Notification>>,
    events: broadcast::Sender<NotificationEvent>,
}

/// In-memory [`NotificationSink`]. Clones share the same list.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                active: Mutex::new(Vec::new()),
                events,
            }),
        }
    }

    fn active(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.inner.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.publish(Notification::new(NotificationKind::Success, title, message))
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.publish(Notification::new(NotificationKind::Info, title, message))
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.publish(Notification::new(NotificationKind::Warning, title, message))
    }

    /// Errors stay until dismissed.
    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.publish(Notification::new(NotificationKind::Error, title, message).persistent())
    }

    /// Active notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.active().clone()
    }

    pub fn dismiss_all(&self) {
        let had_any = {
            let mut active = self.active();
            let had_any = !active.is_empty();
            active.clear();
            had_any
        };
        if had_any {
            let _ = self.inner.events.send(NotificationEvent::Cleared);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for NotificationCenter {
    fn publish(&self, notification: Notification) -> String {
        let id = notification.id.clone();
        let auto_dismiss = notification
            .auto_dismiss_after
            .filter(|_| !notification.persistent);
        debug!(id = %id, kind = ?notification.kind, title = %notification.title, "notification");

        self.active().push(notification.clone());
        // No subscribers is fine.
        let _ = self.inner.events.send(NotificationEvent::Published(notification));

        if let Some(after) = auto_dismiss
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            let center = self.clone();
            let id = id.clone();
            runtime.spawn(async move {
                tokio::time::sleep(after).await;
                center.dismiss(&id);
            });
        }
        id
    }

    fn dismiss(&self, id: &str) {
        let removed = {
            let mut active = self.active();
            let before = active.len();
            active.retain(|n| n.id != id);
            before != active.len()
        };
        if removed {
            let _ = self
                .inner
                .events
                .send(NotificationEvent::Dismissed(id.to_string()));
        }
    }
}
