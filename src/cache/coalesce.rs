//! Coalescing of identical in-flight requests.
//!
//! When several callers ask for the same [`CacheKey`] while a request for it
//! is already running, only the first one reaches the network; the others
//! await the same shared future and receive a clone of its result.
//!
//! ```text
//! caller A ─┐
//!           │                          one
//! caller B ─┼──► RequestCache::coalesce ──────► producer
//!           │           │                          │
//! caller C ─┘           ▼                          ▼
//!               [A, B, C all receive  ◄────── result
//!                the same result]
//! ```
//!
//! # Cleanup
//!
//! The registration is owned by an [`InFlightGuard`] that lives inside the
//! shared future. It is dropped, and the key deregistered, the moment the
//! producer settles (success or failure) or when every caller has dropped
//! its handle before that. A failed request is therefore never replayed to
//! later callers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use tracing::debug;

use super::response::{CacheKey, RequestCache};
use crate::telemetry;
use crate::transport::HttpResponse;
use crate::Result;

type SharedResponse = Shared<BoxFuture<'static, Result<HttpResponse>>>;

struct InFlight {
    id: u64,
    handle: WeakShared<BoxFuture<'static, Result<HttpResponse>>>,
}

/// Registry of in-flight requests, keyed by [`CacheKey`].
#[derive(Default)]
pub(crate) struct InFlightMap {
    requests: HashMap<CacheKey, InFlight>,
    next_id: u64,
    coalesced: u64,
}

impl InFlightMap {
    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    pub(crate) fn clear(&mut self) {
        self.requests.clear();
    }

    pub(crate) fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

/// Deregisters its key when dropped, unless the slot has since been taken
/// by a newer request.
struct InFlightGuard {
    registry: Arc<Mutex<InFlightMap>>,
    key: CacheKey,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if registry.requests.get(&self.key).is_some_and(|f| f.id == self.id) {
            registry.requests.remove(&self.key);
        }
    }
}

impl RequestCache {
    pub(super) fn flights(&self) -> MutexGuard<'_, InFlightMap> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `producer` for `key`, or join the identical request already in
    /// flight.
    ///
    /// `producer` is only called when no request for `key` is running. All
    /// callers joined to one request observe the same result.
    pub async fn coalesce<F, Fut>(&self, key: CacheKey, producer: F) -> Result<HttpResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        let (shared, joined) = self.join_or_register(key.clone(), producer);
        if joined {
            metrics::counter!(telemetry::COALESCED_REQUESTS_TOTAL).increment(1);
            debug!(key = %key, "joined in-flight request");
        }
        shared.await
    }

    fn join_or_register<F, Fut>(&self, key: CacheKey, producer: F) -> (SharedResponse, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        let mut registry = self.flights();
        if let Some(existing) = registry.requests.get(&key).and_then(|f| f.handle.upgrade()) {
            registry.coalesced += 1;
            return (existing, true);
        }

        registry.next_id += 1;
        let id = registry.next_id;
        let guard = InFlightGuard {
            registry: Arc::clone(&self.in_flight),
            key: key.clone(),
            id,
        };
        let request = producer();
        let shared = async move {
            let _guard = guard;
            request.await
        }
        .boxed()
        .shared();

        if let Some(handle) = shared.downgrade() {
            registry.requests.insert(key, InFlight { id, handle });
        }
        (shared, false)
    }

    /// Number of requests currently registered as in flight.
    pub fn in_flight_count(&self) -> usize {
        self.flights().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WeubError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn failure_is_not_replayed() {
        let cache = RequestCache::default();
        let key = CacheKey::get("http://h/a");

        let first = cache
            .coalesce(key.clone(), || async { Err(WeubError::Network("down".into())) })
            .await;
        assert!(first.is_err());
        assert_eq!(cache.in_flight_count(), 0);

        let second = cache
            .coalesce(key, || async { Ok(HttpResponse::new(200, "ok")) })
            .await;
        assert_eq!(second.unwrap().body, "ok");
    }

    #[tokio::test]
    async fn dropped_callers_deregister() {
        let cache = RequestCache::default();
        let key = CacheKey::get("http://h/slow");
        let calls = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&calls);
        let pending = cache.coalesce(key.clone(), move || async move {
            c.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(HttpResponse::new(200, "late"))
        });
        // Poll once so the request is registered, then abandon it.
        let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert_eq!(cache.in_flight_count(), 0);
    }
}
