//! Keyed query cache and mutation orchestration for the velopoint client.
//!
//! UI layers request data by a semantic [`QueryKey`]; the cache answers
//! from memory while fresh, deduplicates concurrent fetches per key,
//! refetches on staleness, polling intervals, or invalidation, and keeps
//! the last good payload through failed refetches. Writes go through
//! [`Mutation`] descriptors that invalidate related keys on success and
//! drive the user-facing side effects.
//!
//! # Example
//!
//! ```rust,ignore
//! use velopoint_query::{QueryCache, QueryKey, QueryOptions};
//!
//! let cache = QueryCache::with_defaults();
//! let key = QueryKey::new("orders").with_value(serde_json::json!({"status": "pending"}));
//!
//! let orders = cache
//!     .fetch(&key, move || {
//!         let client = client.clone();
//!         async move {
//!             let page = client.orders().list(Default::default()).await?;
//!             Ok(serde_json::to_value(page)?)
//!         }
//!     }, QueryOptions::default())
//!     .await?;
//! ```

mod cache;
mod config;
mod key;
mod mutation;

pub use cache::{
    CacheStats, FetchError, FetchResult, Fetcher, QueryCache, QuerySnapshot, QueryStatus,
    Subscription,
};
pub use config::{
    CacheConfig, QueryOptions, DEFAULT_CACHE_TIME, DEFAULT_MAX_ENTRIES, DEFAULT_STALE_AFTER,
};
pub use key::QueryKey;
pub use mutation::{
    Mutation, MutationBuilder, MutationOutcome, MutationStatus, Notifier, TracingNotifier,
};
