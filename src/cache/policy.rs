//! What may be cached, and for how long.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CACHE_CONTROL, HeaderMap};

/// Request header that opts a single request out of caching and coalescing.
/// Stripped before the request is sent.
pub const SKIP_CACHE_HEADER: &str = "x-skip-cache";

/// Paths whose responses change too quickly to cache.
const VOLATILE_PATHS: &[&str] = &["/status", "/health", "/stream/"];

const MINUTE: u64 = 60;

/// TTL by resource class, first match wins.
const RESOURCE_TTLS: &[(&[&str], Duration)] = &[
    (&["/assets/", "/static/"], Duration::from_secs(60 * MINUTE)),
    (&["/user/", "/profile/"], Duration::from_secs(15 * MINUTE)),
    (&["/config/", "/settings/"], Duration::from_secs(30 * MINUTE)),
    (&["/categories", "/tags", "/lookup/"], Duration::from_secs(60 * MINUTE)),
    (&["/search/"], Duration::from_secs(2 * MINUTE)),
    (&["/dashboard/"], Duration::from_secs(MINUTE)),
];

/// Whether a request may be served from, and stored into, the cache.
///
/// Only `GET` qualifies, and never when the caller set [`SKIP_CACHE_HEADER`]
/// or the path is a status, health or stream endpoint.
pub fn is_cacheable(method: &Method, path: &str, skip_cache: bool) -> bool {
    *method == Method::GET && !skip_cache && !is_volatile(path)
}

pub fn is_volatile(path: &str) -> bool {
    VOLATILE_PATHS.iter().any(|p| path.contains(p))
}

/// TTL for a response, or `None` if it must not be stored.
///
/// Precedence: response `no-store`, response `max-age`, resource class,
/// request `max-age`, `default_ttl`.
pub fn ttl_for(
    path: &str,
    request_headers: &HeaderMap,
    response_headers: &HeaderMap,
    default_ttl: Duration,
) -> Option<Duration> {
    if is_no_store(response_headers) {
        return None;
    }
    if let Some(ttl) = max_age(response_headers) {
        return Some(ttl);
    }
    if let Some(ttl) = resource_ttl(path) {
        return Some(ttl);
    }
    Some(max_age(request_headers).unwrap_or(default_ttl))
}

/// TTL for a known resource class.
pub fn resource_ttl(path: &str) -> Option<Duration> {
    RESOURCE_TTLS
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| path.contains(p)))
        .map(|(_, ttl)| *ttl)
}

fn cache_directives(headers: &HeaderMap) -> impl Iterator<Item = String> + '_ {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|d| d.trim().to_ascii_lowercase())
}

pub fn is_no_store(headers: &HeaderMap) -> bool {
    cache_directives(headers).any(|d| d == "no-store")
}

/// `max-age=N` from `Cache-Control`, in seconds.
pub fn max_age(headers: &HeaderMap) -> Option<Duration> {
    cache_directives(headers)
        .find_map(|d| d.strip_prefix("max-age=").and_then(|n| n.trim().parse().ok()))
        .map(Duration::from_secs)
}
