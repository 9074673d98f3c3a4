//! Loading indicator: how many tracked requests are in progress.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Method;
use tokio::sync::watch;

/// Request header that keeps a request out of the loading count.
/// Stripped before the request is sent.
pub const SKIP_LOADING_HEADER: &str = "x-skip-loading";

/// Whether a request counts towards the loading indicator.
///
/// Background traffic (status polls, health checks, HLS fetches) does not.
pub fn tracks_loading(method: &Method, path: &str, skip_loading: bool) -> bool {
    !(skip_loading
        || path.contains("/status")
        || path.contains("/health")
        || (*method == Method::GET && path.contains("/stream/")))
}

/// Shared active-request counter plus named loading flags.
///
/// Clones share the same state. The count is published on a `watch`
/// channel so UIs can react to `0 → 1` and `1 → 0` transitions.
#[derive(Clone)]
pub struct LoadingTracker {
    count: Arc<watch::Sender<usize>>,
    keys: Arc<Mutex<HashSet<String>>>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
            keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Count one request as active until the guard is dropped.
    pub fn start(&self) -> LoadingGuard {
        self.count.send_modify(|n| *n += 1);
        LoadingGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn active(&self) -> usize {
        *self.count.borrow()
    }

    pub fn is_loading(&self) -> bool {
        self.active() > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    /// Mark a named operation (e.g. `"upload"`) as loading.
    pub fn start_for(&self, key: impl Into<String>) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into());
    }

    pub fn stop_for(&self, key: &str) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn is_loading_for(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Forget every named flag. Outstanding guards still decrement the
    /// count when dropped, saturating at zero.
    pub fn reset(&self) {
        self.count.send_replace(0);
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for LoadingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the active count when dropped.
pub struct LoadingGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
