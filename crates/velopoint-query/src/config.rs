//! Configuration for the query cache.

use std::time::Duration;

/// Default staleness window. Call sites override this per query; the
/// platform's screens use windows between one and five minutes.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);

/// Default time an unused entry stays cached before it is eligible for
/// eviction.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of cache entries before LRU eviction.
pub const DEFAULT_MAX_ENTRIES: usize = 512;

/// Per-query options.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// How long a successful result counts as fresh.
    pub stale_after: Duration,

    /// How long an unused entry is kept before [`evict_idle`] removes it.
    ///
    /// [`evict_idle`]: crate::QueryCache::evict_idle
    pub cache_time: Duration,

    /// Bounded retry count for a failed fetch. Zero by default.
    pub retry: u32,

    /// Fixed refetch interval while at least one subscriber is mounted,
    /// independent of staleness.
    pub poll_interval: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            cache_time: DEFAULT_CACHE_TIME,
            retry: 0,
            poll_interval: None,
        }
    }
}

impl QueryOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the staleness window.
    pub fn with_stale_after(mut self, window: Duration) -> Self {
        self.stale_after = window;
        self
    }

    /// Set the cache time.
    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }

    /// Set the bounded retry count.
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Enable interval polling.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

/// Cache-wide configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before the least recently used one is
    /// evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}
