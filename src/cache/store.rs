//! In-memory TTL page store.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;

use super::clock::Clock;
use super::config::CacheConfig;
use super::keys::PageKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_PAGE_CACHE_HIT: &str = "foglio_page_cache_hit_total";
const METRIC_PAGE_CACHE_MISS: &str = "foglio_page_cache_miss_total";
const METRIC_PAGE_CACHE_EXPIRED: &str = "foglio_page_cache_expired_total";
const METRIC_PAGE_CACHE_EVICT: &str = "foglio_page_cache_evict_total";

/// Cached HTTP response body and metadata.
#[derive(Clone)]
pub struct CachedPage {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct StoredPage {
    page: CachedPage,
    stored_at: Instant,
}

/// LRU page store with per-entry TTL expiry.
///
/// Expiry is lazy: an entry past its TTL is dropped on the next lookup.
/// There is no invalidation on writes, so a page can be up to one TTL
/// stale relative to the database.
pub struct PageStore {
    pages: RwLock<LruCache<PageKey, StoredPage>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PageStore {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pages: RwLock::new(LruCache::new(config.max_pages_non_zero())),
            ttl: config.ttl(),
            clock,
        }
    }

    /// Look up a page, dropping it if it has outlived the TTL.
    pub fn get(&self, key: &PageKey) -> Option<CachedPage> {
        let now = self.clock.now();
        let mut pages = rw_write(&self.pages, SOURCE, "get");

        match pages.get(key) {
            Some(stored) if now.duration_since(stored.stored_at) < self.ttl => {
                counter!(METRIC_PAGE_CACHE_HIT).increment(1);
                Some(stored.page.clone())
            }
            Some(_) => {
                pages.pop(key);
                counter!(METRIC_PAGE_CACHE_EXPIRED).increment(1);
                None
            }
            None => {
                counter!(METRIC_PAGE_CACHE_MISS).increment(1);
                None
            }
        }
    }

    /// Store a page, stamping it with the current time. Returns the key
    /// evicted to make room, if any.
    pub fn set(&self, key: PageKey, page: CachedPage) -> Option<PageKey> {
        let stored = StoredPage {
            page,
            stored_at: self.clock.now(),
        };
        let evicted = rw_write(&self.pages, SOURCE, "set")
            .push(key, stored)
            .map(|(evicted_key, _)| evicted_key);
        if evicted.is_some() {
            counter!(METRIC_PAGE_CACHE_EVICT).increment(1);
        }
        evicted
    }

    pub fn clear(&self) {
        rw_write(&self.pages, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.pages, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
