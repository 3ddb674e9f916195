//! TTL response cache for rendered feed pages.
//!
//! Entries are keyed by request path and query string and expire after a
//! fixed time-to-live. There is no write-through invalidation: a freshly
//! published post becomes visible on a cached page only once its entry
//! expires.

pub mod clock;
pub mod config;
pub mod keys;
mod lock;
pub mod middleware;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use config::CacheConfig;
pub use keys::{PageKey, hash_query};
pub use middleware::{CacheState, page_cache_layer};
pub use store::{CachedPage, PageStore};
