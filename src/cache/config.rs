//! Page cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECONDS: u64 = 20;
const DEFAULT_MAX_PAGES: usize = 200;

/// Page cache configuration from `foglio.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache on feed pages.
    pub enabled: bool,
    /// How long a cached page stays servable.
    pub ttl_seconds: u64,
    /// Maximum cached pages before LRU eviction.
    pub max_pages: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl_seconds: settings.ttl_seconds.get(),
            max_pages: settings.max_pages,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Maximum pages as NonZeroUsize, clamping to 1 if zero.
    pub fn max_pages_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_pages).unwrap_or(NonZeroUsize::MIN)
    }
}
