//! Keyed request cache with staleness windows, deduplication, polling,
//! and prefix invalidation.
//!
//! The cache map is the one shared mutable resource in this subsystem.
//! It lives behind a synchronous lock that is never held across an
//! await: fetches run in spawned tasks and write their outcome back on
//! completion, so a fetch keeps running (and its result is kept) even if
//! every interested caller has gone away.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, trace};

use crate::config::{CacheConfig, QueryOptions};
use crate::key::QueryKey;

/// Error produced by a fetch, shared between all callers awaiting it.
pub type FetchError = Arc<velopoint_client::Error>;

/// Outcome of a fetch.
pub type FetchResult = std::result::Result<Value, FetchError>;

/// A registered fetch function.
pub type Fetcher =
    Arc<dyn Fn() -> BoxFuture<'static, velopoint_client::Result<Value>> + Send + Sync>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// No fetch has happened yet.
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// The most recent fetch succeeded.
    Success,
    /// The most recent fetch failed.
    Error,
}

/// Point-in-time view of a cache entry.
///
/// `data` survives a failed refetch: the last successful payload is kept
/// alongside the error so the UI may render stale data with an error
/// state.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    /// Last successful payload, if any.
    pub data: Option<Value>,
    /// Lifecycle state.
    pub status: QueryStatus,
    /// Error from the most recent failed fetch.
    pub error: Option<FetchError>,
}

impl QuerySnapshot {
    fn idle() -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: None,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current number of entries.
    pub size: usize,
    /// Maximum capacity.
    pub capacity: usize,
}

struct Entry {
    data: Option<Value>,
    error: Option<FetchError>,
    fetched_at: Option<Instant>,
    status: QueryStatus,
    options: QueryOptions,
    fetcher: Fetcher,
    inflight: Option<SharedFetch>,
    watch_tx: watch::Sender<QuerySnapshot>,
    subscribers: usize,
    poll_task: Option<JoinHandle<()>>,
    last_used: Instant,
}

impl Entry {
    fn new(fetcher: Fetcher, options: QueryOptions) -> Self {
        let (watch_tx, _) = watch::channel(QuerySnapshot::idle());
        Self {
            data: None,
            error: None,
            fetched_at: None,
            status: QueryStatus::Idle,
            options,
            fetcher,
            inflight: None,
            watch_tx,
            subscribers: 0,
            poll_task: None,
            last_used: Instant::now(),
        }
    }

    fn is_fresh(&self) -> bool {
        match self.fetched_at {
            Some(at) => at.elapsed() < self.options.stale_after,
            None => false,
        }
    }

    fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
        }
    }

    fn publish(&self) {
        self.watch_tx.send_replace(self.snapshot());
    }
}

struct CacheState {
    entries: LruCache<QueryKey, Entry>,
}

struct CacheShared {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

/// Keyed query cache. Cheap to clone; all clones share the same map.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheShared>,
}

/// Subscription to a cache entry.
///
/// Holds a change receiver for the entry's snapshots. Dropping the last
/// subscription for a key synchronously cancels its polling task; an
/// in-flight fetch still runs to completion and its result is cached.
pub struct Subscription {
    cache: QueryCache,
    key: QueryKey,
    receiver: watch::Receiver<QuerySnapshot>,
}

impl Subscription {
    /// The subscribed key.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current snapshot for the key.
    pub fn snapshot(&self) -> QuerySnapshot {
        self.receiver.borrow().clone()
    }

    /// The change receiver, for awaiting updates.
    pub fn receiver(&mut self) -> &mut watch::Receiver<QuerySnapshot> {
        &mut self.receiver
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut state = self.cache.inner.state.lock();
        if let Some(entry) = state.entries.peek_mut(&self.key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                if let Some(task) = entry.poll_task.take() {
                    task.abort();
                    trace!(key = %self.key, "polling stopped, last subscriber gone");
                }
            }
        }
    }
}

impl QueryCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheShared {
                state: Mutex::new(CacheState {
                    entries: LruCache::unbounded(),
                }),
                config,
            }),
        }
    }

    /// Create a cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.inner.config.max_entries,
        }
    }

    /// Snapshot of a key without touching freshness or triggering a fetch.
    pub fn peek(&self, key: &QueryKey) -> Option<QuerySnapshot> {
        let state = self.inner.state.lock();
        state.entries.peek(key).map(Entry::snapshot)
    }

    /// Awaitable read.
    ///
    /// A fresh entry resolves immediately from cache. A stale or missing
    /// entry triggers exactly one underlying fetch; callers arriving
    /// while that fetch is in flight share its outcome instead of
    /// starting another.
    pub async fn fetch<F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> FetchResult
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = velopoint_client::Result<Value>> + Send + 'static,
    {
        let fetcher = to_fetcher(fetcher);

        let shared = {
            let mut state = self.inner.state.lock();
            let entry = self.ensure_entry(&mut state, key, fetcher, options);

            if let Some(inflight) = &entry.inflight {
                trace!(key = %key, "joining in-flight fetch");
                inflight.clone()
            } else if entry.is_fresh() {
                if let Some(data) = entry.data.clone() {
                    trace!(key = %key, "cache hit");
                    return Ok(data);
                }
                self.spawn_fetch(key, entry)
            } else {
                self.spawn_fetch(key, entry)
            }
        };

        shared.await
    }

    /// Awaitable read with a pure projection applied to the raw payload.
    ///
    /// The projection runs on every call and its output is never cached.
    pub async fn fetch_with<F, Fut, S>(
        &self,
        key: &QueryKey,
        fetcher: F,
        options: QueryOptions,
        select: S,
    ) -> FetchResult
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = velopoint_client::Result<Value>> + Send + 'static,
        S: Fn(&Value) -> Value,
    {
        let raw = self.fetch(key, fetcher, options).await?;
        Ok(select(&raw))
    }

    /// Awaitable read deserialized into a typed payload.
    pub async fn fetch_as<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> std::result::Result<T, FetchError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = velopoint_client::Result<Value>> + Send + 'static,
    {
        let raw = self.fetch(key, fetcher, options).await?;
        serde_json::from_value(raw).map_err(|e| Arc::new(velopoint_client::Error::Json(e)))
    }

    /// Non-blocking read.
    ///
    /// Returns the current snapshot immediately; when the entry is stale
    /// and no fetch is in flight, one is started in the background.
    pub async fn read<F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> QuerySnapshot
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = velopoint_client::Result<Value>> + Send + 'static,
    {
        let fetcher = to_fetcher(fetcher);

        let mut state = self.inner.state.lock();
        let entry = self.ensure_entry(&mut state, key, fetcher, options);

        if entry.inflight.is_none() && !entry.is_fresh() {
            self.spawn_fetch(key, entry);
        }
        entry.snapshot()
    }

    /// Subscribe to a key.
    ///
    /// Registers the fetcher, triggers a fetch when stale, and starts
    /// interval polling when the options ask for it. Polling continues
    /// while any subscription for the key is alive.
    pub fn subscribe<F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> Subscription
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = velopoint_client::Result<Value>> + Send + 'static,
    {
        let fetcher = to_fetcher(fetcher);

        let mut state = self.inner.state.lock();
        let entry = self.ensure_entry(&mut state, key, fetcher, options);

        entry.subscribers += 1;
        let receiver = entry.watch_tx.subscribe();

        if entry.inflight.is_none() && !entry.is_fresh() {
            self.spawn_fetch(key, entry);
        }

        if let Some(period) = entry.options.poll_interval {
            if entry.poll_task.is_none() {
                debug!(key = %key, period_secs = period.as_secs(), "polling started");
                entry.poll_task = Some(tokio::spawn(poll_loop(self.clone(), key.clone(), period)));
            }
        }

        Subscription {
            cache: self.clone(),
            key: key.clone(),
            receiver,
        }
    }

    /// Mark every entry whose key starts with `prefix` as stale.
    ///
    /// Entries with active subscribers are refetched eagerly; dormant
    /// entries refetch lazily on their next read.
    pub fn invalidate(&self, prefix: &QueryKey) {
        let mut state = self.inner.state.lock();
        let mut marked = 0usize;

        // LruCache has no iter_mut; collect matches first.
        let matches: Vec<QueryKey> = state
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for key in matches {
            if let Some(entry) = state.entries.peek_mut(&key) {
                entry.fetched_at = None;
                marked += 1;
                if entry.subscribers > 0 && entry.inflight.is_none() {
                    self.spawn_fetch(&key, entry);
                }
            }
        }

        debug!(prefix = %prefix, marked, "cache invalidated");
    }

    /// Force a refetch for a key, regardless of freshness.
    ///
    /// No-op for unknown keys; joins rather than duplicates an in-flight
    /// fetch.
    pub fn refetch(&self, key: &QueryKey) {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.entries.peek_mut(key) {
            if entry.inflight.is_none() {
                self.spawn_fetch(key, entry);
            }
        }
    }

    /// Remove entries that have no subscriber, no in-flight fetch, and
    /// have been unused longer than their cache time. Returns how many
    /// were evicted.
    pub fn evict_idle(&self) -> usize {
        let mut state = self.inner.state.lock();

        let expired: Vec<QueryKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.subscribers == 0
                    && entry.inflight.is_none()
                    && entry.last_used.elapsed() > entry.options.cache_time
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(mut entry) = state.entries.pop(key) {
                if let Some(task) = entry.poll_task.take() {
                    task.abort();
                }
                debug!(key = %key, "evicted idle cache entry");
            }
        }

        expired.len()
    }

    /// Drop every entry, cancelling polling tasks. In-flight fetches are
    /// left to finish and discard their write-back.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        while let Some((key, mut entry)) = state.entries.pop_lru() {
            if let Some(task) = entry.poll_task.take() {
                task.abort();
            }
            trace!(key = %key, "cache entry dropped");
        }
    }

    fn ensure_entry<'a>(
        &self,
        state: &'a mut CacheState,
        key: &QueryKey,
        fetcher: Fetcher,
        options: QueryOptions,
    ) -> &'a mut Entry {
        if !state.entries.contains(key) && state.entries.len() >= self.inner.config.max_entries {
            if let Some((victim, mut evicted)) = state.entries.pop_lru() {
                if let Some(task) = evicted.poll_task.take() {
                    task.abort();
                }
                debug!(key = %victim, "evicted LRU cache entry to make room");
            }
        }

        let entry = state
            .entries
            .get_or_insert_mut(key.clone(), || Entry::new(fetcher.clone(), options.clone()));

        // Latest caller wins: keep the most recently supplied fetcher and
        // options so invalidation and polling use current behavior.
        entry.fetcher = fetcher;
        entry.options = options;
        entry.last_used = Instant::now();
        entry
    }

    /// Start the single fetch for an entry and return the shared handle.
    ///
    /// The fetch is driven by a spawned task so it completes (and its
    /// result is cached) even if every caller stops awaiting it.
    fn spawn_fetch(&self, key: &QueryKey, entry: &mut Entry) -> SharedFetch {
        let cache = self.clone();
        let key = key.clone();
        let fetcher = entry.fetcher.clone();
        let retries = entry.options.retry;

        let shared: SharedFetch = async move {
            let mut attempt = 0u32;
            loop {
                match fetcher().await {
                    Ok(value) => {
                        cache.complete_ok(&key, value.clone());
                        return Ok(value);
                    }
                    Err(e) if attempt < retries => {
                        attempt += 1;
                        debug!(key = %key, attempt, error = %e, "fetch failed, retrying");
                    }
                    Err(e) => {
                        let error = Arc::new(e);
                        cache.complete_err(&key, error.clone());
                        return Err(error);
                    }
                }
            }
        }
        .boxed()
        .shared();

        entry.inflight = Some(shared.clone());
        entry.status = QueryStatus::Fetching;
        entry.publish();

        tokio::spawn(shared.clone());
        shared
    }

    fn complete_ok(&self, key: &QueryKey, value: Value) {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.entries.peek_mut(key) {
            entry.data = Some(value);
            entry.error = None;
            entry.fetched_at = Some(Instant::now());
            entry.status = QueryStatus::Success;
            entry.inflight = None;
            entry.publish();
            trace!(key = %key, "fetch succeeded");
        }
    }

    fn complete_err(&self, key: &QueryKey, error: FetchError) {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.entries.peek_mut(key) {
            // Stale-while-error: keep the last successful payload.
            entry.error = Some(error);
            entry.status = QueryStatus::Error;
            entry.inflight = None;
            entry.publish();
            debug!(key = %key, "fetch failed");
        }
    }
}

fn to_fetcher<F, Fut>(f: F) -> Fetcher
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = velopoint_client::Result<Value>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

async fn poll_loop(cache: QueryCache, key: QueryKey, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        trace!(key = %key, "poll tick");
        cache.refetch(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetcher(
        counter: Arc<AtomicUsize>,
        payload: Value,
    ) -> impl Fn() -> futures::future::Ready<velopoint_client::Result<Value>> + Send + Sync + 'static
    {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(payload.clone()))
        }
    }

    #[tokio::test]
    async fn test_fresh_reread_hits_cache() {
        let cache = QueryCache::with_defaults();
        let counter = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("products");

        let first = cache
            .fetch(
                &key,
                counting_fetcher(counter.clone(), json!([1, 2, 3])),
                QueryOptions::default(),
            )
            .await
            .unwrap();
        let second = cache
            .fetch(
                &key,
                counting_fetcher(counter.clone(), json!([1, 2, 3])),
                QueryOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_refetches() {
        let cache = QueryCache::with_defaults();
        let counter = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("products");
        let options = QueryOptions::default().with_stale_after(Duration::from_secs(60));

        cache
            .fetch(&key, counting_fetcher(counter.clone(), json!(1)), options.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;

        cache
            .fetch(&key, counting_fetcher(counter.clone(), json!(2)), options)
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_keeps_previous_data() {
        let cache = QueryCache::with_defaults();
        let key = QueryKey::new("orders");
        let options = QueryOptions::default().with_stale_after(Duration::ZERO);

        cache
            .fetch(
                &key,
                || futures::future::ready(Ok(json!({"count": 1}))),
                options.clone(),
            )
            .await
            .unwrap();

        let err = cache
            .fetch(
                &key,
                || {
                    futures::future::ready(Err(velopoint_client::Error::Http {
                        status: 500,
                        message: "boom".to_string(),
                    }))
                },
                options,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));

        let snapshot = cache.peek(&key).unwrap();
        assert_eq!(snapshot.status, QueryStatus::Error);
        assert_eq!(snapshot.data, Some(json!({"count": 1})));
        assert!(snapshot.error.is_some());
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let cache = QueryCache::with_defaults();
        let attempts = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("flaky");

        let attempts_in = attempts.clone();
        let err = cache
            .fetch(
                &key,
                move || {
                    attempts_in.fetch_add(1, Ordering::SeqCst);
                    futures::future::ready(Err(velopoint_client::Error::Http {
                        status: 503,
                        message: "unavailable".to_string(),
                    }))
                },
                QueryOptions::default().with_retry(2),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_lru_bound_evicts_oldest() {
        let cache = QueryCache::new(CacheConfig::new().with_max_entries(2));

        for name in ["a", "b", "c"] {
            cache
                .fetch(
                    &QueryKey::new(name),
                    || futures::future::ready(Ok(json!(1))),
                    QueryOptions::default(),
                )
                .await
                .unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.peek(&QueryKey::new("a")).is_none());
        assert!(cache.peek(&QueryKey::new("c")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_sweeps_unused() {
        let cache = QueryCache::with_defaults();
        let options = QueryOptions::default().with_cache_time(Duration::from_secs(300));

        cache
            .fetch(
                &QueryKey::new("dormant"),
                || futures::future::ready(Ok(json!(1))),
                options,
            )
            .await
            .unwrap();

        assert_eq!(cache.evict_idle(), 0);

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(cache.evict_idle(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_selector_is_applied_per_read() {
        let cache = QueryCache::with_defaults();
        let key = QueryKey::new("products");

        // Coerce a non-array payload into an empty list.
        let as_list = |raw: &Value| match raw {
            Value::Array(_) => raw.clone(),
            _ => json!([]),
        };

        let shaped = cache
            .fetch_with(
                &key,
                || futures::future::ready(Ok(json!({"detail": "throttled"}))),
                QueryOptions::default(),
                as_list,
            )
            .await
            .unwrap();

        assert_eq!(shaped, json!([]));
        // The raw payload, not the projection, is what the cache holds.
        assert_eq!(
            cache.peek(&key).unwrap().data,
            Some(json!({"detail": "throttled"}))
        );
    }
}
