//! Caching subsystem.
//!
//! - [`response::RequestCache`]: TTL + capacity-bounded response cache
//!   with an opportunistic sweep. One instance is injected into each
//!   [`RequestPipeline`](crate::pipeline::RequestPipeline); share it by
//!   passing the same `Arc` to several pipelines.
//!
//! - [`coalesce`]: de-duplication of identical in-flight requests, keyed
//!   on the same [`CacheKey`] as the response cache.
//!
//! - [`policy`]: which requests are cacheable and the TTL of each
//!   response.

pub mod coalesce;
pub mod policy;
pub mod response;

pub use policy::SKIP_CACHE_HEADER;
pub use response::{CacheConfig, CacheKey, CacheStats, RequestCache};
