//! In-memory response cache with TTL, capacity-bounded eviction and a
//! periodic sweep.
//!
//! # Expiry
//!
//! An entry is live while `now - captured_at <= ttl`. Expired entries are
//! removed lazily when a lookup finds them, and in bulk by the sweep, which
//! [`RequestCache::store`] runs at most once per `sweep_interval`. No
//! background task is spawned.
//!
//! # Eviction
//!
//! Inserting a *new* key into a full cache first removes the single entry
//! with the oldest `captured_at`. Overwriting an existing key never evicts.
//!
//! # Clock
//!
//! Timestamps use [`tokio::time::Instant`], so a paused test runtime can
//! advance time deterministically.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::coalesce::InFlightMap;
use crate::telemetry;
use crate::transport::HttpResponse;

/// Configuration for the response cache.
///
/// ```rust
/// # use weub::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .default_ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached responses. Default: 100.
    pub max_entries: usize,
    /// TTL when neither headers nor resource class set one. Default: 5 minutes.
    pub default_ttl: Duration,
    /// Minimum time between two sweeps. Default: 10 minutes.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            default_ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached responses.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the fallback TTL.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the minimum time between sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Identity of a request: `"<METHOD>:<full URL including query>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &str, url: &str) -> Self {
        Self(format!("{}:{url}", method.to_ascii_uppercase()))
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL part of the key.
    pub fn url(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, url)| url)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time counters for a [`RequestCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub coalesced: u64,
}

#[derive(Debug)]
struct CacheEntry {
    response: HttpResponse,
    captured_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.captured_at) > self.ttl
    }
}

#[derive(Debug)]
struct State {
    entries: HashMap<CacheKey, CacheEntry>,
    last_sweep: Instant,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl State {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        self.last_sweep = now;
        before - self.entries.len()
    }
}

/// Response cache plus the registry of in-flight requests.
///
/// One instance is shared (behind an `Arc`) by every pipeline that should
/// see the same cache. Every mutation happens inside one short critical
/// section; nothing is awaited while a lock is held.
pub struct RequestCache {
    config: CacheConfig,
    state: Mutex<State>,
    pub(super) in_flight: Arc<Mutex<InFlightMap>>,
}

impl RequestCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            in_flight: Arc::new(Mutex::new(InFlightMap::default())),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Every critical section leaves the maps consistent, so a poisoned
        // lock is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the live response for `key`, removing it if it has expired.
    pub fn lookup(&self, key: &CacheKey) -> Option<HttpResponse> {
        let now = Instant::now();
        let mut state = self.state();
        let (expired, cached) = match state.entries.get(key) {
            Some(entry) if entry.is_expired(now) => (true, None),
            Some(entry) => (false, Some(entry.response.clone())),
            None => (false, None),
        };
        if expired {
            state.entries.remove(key);
        }
        match cached {
            Some(response) => {
                state.hits += 1;
                drop(state);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                debug!(key = %key, "cache hit");
                Some(response)
            }
            None => {
                state.misses += 1;
                drop(state);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(key = %key, expired, "cache miss");
                None
            }
        }
    }

    /// Insert or overwrite the response for `key`.
    ///
    /// A new key in a full cache evicts the oldest entry first. Runs the
    /// sweep afterwards if `sweep_interval` has passed since the last one.
    pub fn store(&self, key: CacheKey, response: HttpResponse, ttl: Duration) {
        if self.config.max_entries == 0 {
            return;
        }
        let now = Instant::now();
        let mut state = self.state();

        let mut evicted = None;
        if !state.entries.contains_key(&key) && state.entries.len() >= self.config.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.captured_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                state.evictions += 1;
                evicted = Some(oldest);
            }
        }

        state.entries.insert(
            key,
            CacheEntry {
                response,
                captured_at: now,
                ttl,
            },
        );

        let swept = if now.saturating_duration_since(state.last_sweep) >= self.config.sweep_interval
        {
            Some(state.sweep(now))
        } else {
            None
        };
        drop(state);

        if let Some(evicted) = evicted {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
            debug!(key = %evicted, "evicted oldest cache entry");
        }
        if let Some(removed) = swept {
            debug!(removed, "cache sweep");
        }
    }

    /// Remove the entry for `key`. Returns whether one was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.state().entries.remove(key).is_some()
    }

    /// Remove every entry whose key matches. Returns how many were removed.
    pub fn invalidate_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CacheKey) -> bool,
    {
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|key, _| !predicate(key));
        before - state.entries.len()
    }

    /// Drop every entry and every in-flight registration.
    ///
    /// Requests already in flight still complete for the callers awaiting
    /// them, but new callers will no longer join them.
    pub fn clear(&self) {
        self.state().entries.clear();
        self.flights().clear();
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.state().sweep(Instant::now())
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, hits, misses, evictions) = {
            let state = self.state();
            (state.entries.len(), state.hits, state.misses, state.evictions)
        };
        let (in_flight, coalesced) = {
            let flights = self.flights();
            (flights.len(), flights.coalesced())
        };
        CacheStats {
            entries,
            in_flight,
            hits,
            misses,
            evictions,
            coalesced,
        }
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
