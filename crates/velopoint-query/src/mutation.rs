//! Mutation orchestration.
//!
//! A mutation wraps one write operation: the request action, the cache
//! prefixes its success invalidates, and the user-facing side effects.
//! Each `execute` call signals exactly one outcome. Unlike reads,
//! concurrent executions are never deduplicated: writes are not
//! idempotent by default.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{FetchError, QueryCache};
use crate::key::QueryKey;

/// State machine for a single mutation: `Idle → Pending → Success|Error`,
/// terminal until [`Mutation::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// Sink for user-facing transient notifications.
pub trait Notifier: Send + Sync {
    /// A confirmation, e.g. "Order created successfully!".
    fn success(&self, message: &str);

    /// A failure message for the user.
    fn error(&self, message: &str);
}

/// Notifier that logs through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!(message, "notification");
    }

    fn error(&self, message: &str) {
        warn!(message, "notification");
    }
}

/// Successful outcome of a mutation.
#[derive(Debug, Clone)]
pub struct MutationOutcome<O> {
    /// The action's result.
    pub value: O,
    /// Where the UI should navigate, if the descriptor says so.
    pub redirect: Option<String>,
}

type Action<I, O> =
    Box<dyn Fn(I) -> BoxFuture<'static, velopoint_client::Result<O>> + Send + Sync>;

type SuccessHook<O> = Box<dyn Fn(&O) + Send + Sync>;

/// A write operation tied to cache invalidation and side effects.
pub struct Mutation<I, O> {
    cache: QueryCache,
    action: Action<I, O>,
    invalidates: Vec<QueryKey>,
    notifier: Arc<dyn Notifier>,
    success_message: Option<String>,
    error_message: Option<String>,
    redirect: Option<String>,
    on_success: Option<SuccessHook<O>>,
    status_tx: watch::Sender<MutationStatus>,
}

impl<I, O> Mutation<I, O> {
    /// Start building a mutation around an action.
    pub fn builder<F, Fut>(cache: QueryCache, action: F) -> MutationBuilder<I, O>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = velopoint_client::Result<O>> + Send + 'static,
    {
        MutationBuilder {
            cache,
            action: Box::new(move |input| action(input).boxed()),
            invalidates: Vec::new(),
            notifier: Arc::new(TracingNotifier),
            success_message: None,
            error_message: None,
            redirect: None,
            on_success: None,
        }
    }

    /// Current status.
    pub fn status(&self) -> MutationStatus {
        *self.status_tx.borrow()
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<MutationStatus> {
        self.status_tx.subscribe()
    }

    /// Return a terminal mutation to `Idle` so it can run again.
    pub fn reset(&self) {
        self.status_tx.send_replace(MutationStatus::Idle);
    }

    /// Run the action once.
    ///
    /// On success every registered prefix is invalidated before this
    /// returns, then the success side effects run. On failure nothing is
    /// invalidated and the error side effect runs with the server's
    /// message (or the descriptor's fallback).
    pub async fn execute(&self, input: I) -> std::result::Result<MutationOutcome<O>, FetchError> {
        self.status_tx.send_replace(MutationStatus::Pending);

        match (self.action)(input).await {
            Ok(value) => {
                for prefix in &self.invalidates {
                    self.cache.invalidate(prefix);
                }
                if let Some(message) = &self.success_message {
                    self.notifier.success(message);
                }
                if let Some(hook) = &self.on_success {
                    hook(&value);
                }
                self.status_tx.send_replace(MutationStatus::Success);
                Ok(MutationOutcome {
                    value,
                    redirect: self.redirect.clone(),
                })
            }
            Err(e) => {
                let fallback = self.error_message.as_deref().unwrap_or("Request failed");
                let message = e.message_or(fallback);
                debug!(error = %e, "mutation failed");
                self.notifier.error(&message);
                self.status_tx.send_replace(MutationStatus::Error);
                Err(Arc::new(e))
            }
        }
    }
}

/// Builder for [`Mutation`].
pub struct MutationBuilder<I, O> {
    cache: QueryCache,
    action: Action<I, O>,
    invalidates: Vec<QueryKey>,
    notifier: Arc<dyn Notifier>,
    success_message: Option<String>,
    error_message: Option<String>,
    redirect: Option<String>,
    on_success: Option<SuccessHook<O>>,
}

impl<I, O> MutationBuilder<I, O> {
    /// Invalidate every cached key starting with `prefix` on success.
    pub fn invalidates(mut self, prefix: QueryKey) -> Self {
        self.invalidates.push(prefix);
        self
    }

    /// Confirmation text shown on success.
    pub fn notify_success(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Fallback text shown when a failure carries no server message.
    pub fn notify_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Navigation directive surfaced on success.
    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(path.into());
        self
    }

    /// Replace the notifier (the default logs through `tracing`).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Hook run with the action's result on success, after invalidation.
    pub fn on_success<H>(mut self, hook: H) -> Self
    where
        H: Fn(&O) + Send + Sync + 'static,
    {
        self.on_success = Some(Box::new(hook));
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> Mutation<I, O> {
        let (status_tx, _) = watch::channel(MutationStatus::Idle);
        Mutation {
            cache: self.cache,
            action: self.action,
            invalidates: self.invalidates,
            notifier: self.notifier,
            success_message: self.success_message,
            error_message: self.error_message,
            redirect: self.redirect,
            on_success: self.on_success,
            status_tx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryOptions;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Notifier capturing messages for assertions.
    #[derive(Default)]
    struct RecordingNotifier {
        successes: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn success(&self, message: &str) {
            self.successes.lock().push(message.to_string());
        }

        fn error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }
    }

    #[tokio::test]
    async fn test_success_path_invalidates_and_notifies() {
        let cache = QueryCache::with_defaults();
        let fetches = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("orders");

        // Prime the cache with a fresh entry.
        let fetches_in = fetches.clone();
        cache
            .fetch(
                &key,
                move || {
                    fetches_in.fetch_add(1, Ordering::SeqCst);
                    futures::future::ready(Ok(json!({"count": 1})))
                },
                QueryOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        let notifier = Arc::new(RecordingNotifier::default());
        let mutation: Mutation<Value, Value> = Mutation::builder(cache.clone(), |input: Value| {
            futures::future::ready(Ok(input))
        })
        .invalidates(QueryKey::new("orders"))
        .notify_success("Order created successfully!")
        .notifier(notifier.clone())
        .build();

        let outcome = mutation.execute(json!({"product_id": 4})).await.unwrap();
        assert_eq!(outcome.value, json!({"product_id": 4}));
        assert_eq!(mutation.status(), MutationStatus::Success);
        assert_eq!(
            notifier.successes.lock().as_slice(),
            ["Order created successfully!"]
        );

        // The primed entry is stale now: the next fetch goes to the network.
        let fetches_in = fetches.clone();
        cache
            .fetch(
                &key,
                move || {
                    fetches_in.fetch_add(1, Ordering::SeqCst);
                    futures::future::ready(Ok(json!({"count": 2})))
                },
                QueryOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_path_skips_invalidation() {
        let cache = QueryCache::with_defaults();
        let fetches = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("sales");

        let fetches_in = fetches.clone();
        cache
            .fetch(
                &key,
                move || {
                    fetches_in.fetch_add(1, Ordering::SeqCst);
                    futures::future::ready(Ok(json!([])))
                },
                QueryOptions::default(),
            )
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let mutation: Mutation<Value, Value> = Mutation::builder(cache.clone(), |_input: Value| {
            futures::future::ready(Err(velopoint_client::Error::Http {
                status: 400,
                message: "Insufficient stock".to_string(),
            }))
        })
        .invalidates(QueryKey::new("sales"))
        .notify_error("Failed to create sale")
        .notifier(notifier.clone())
        .build();

        let err = mutation.execute(json!({})).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(mutation.status(), MutationStatus::Error);
        assert_eq!(notifier.errors.lock().as_slice(), ["Insufficient stock"]);

        // Still fresh: no refetch happened.
        let fetches_in = fetches.clone();
        cache
            .fetch(
                &key,
                move || {
                    fetches_in.fetch_add(1, Ordering::SeqCst);
                    futures::future::ready(Ok(json!([])))
                },
                QueryOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_fallback_message() {
        let cache = QueryCache::with_defaults();
        let notifier = Arc::new(RecordingNotifier::default());

        let mutation: Mutation<(), Value> = Mutation::builder(cache, |_: ()| {
            futures::future::ready(Err(velopoint_client::Error::Config("oops".to_string())))
        })
        .notify_error("Failed to create order")
        .notifier(notifier.clone())
        .build();

        let _ = mutation.execute(()).await;
        assert_eq!(notifier.errors.lock().as_slice(), ["Failed to create order"]);
    }

    #[tokio::test]
    async fn test_state_machine_transitions() {
        let cache = QueryCache::with_defaults();
        let mutation: Mutation<(), Value> =
            Mutation::builder(cache, |_: ()| futures::future::ready(Ok(json!(1)))).build();

        assert_eq!(mutation.status(), MutationStatus::Idle);

        let mut rx = mutation.subscribe();
        mutation.execute(()).await.unwrap();

        // Both transitions were published; the receiver sees the latest.
        rx.changed().await.unwrap();
        assert_eq!(mutation.status(), MutationStatus::Success);

        mutation.reset();
        assert_eq!(mutation.status(), MutationStatus::Idle);

        mutation.execute(()).await.unwrap();
        assert_eq!(mutation.status(), MutationStatus::Success);
    }

    #[tokio::test]
    async fn test_redirect_surfaces_in_outcome() {
        let cache = QueryCache::with_defaults();
        let mutation: Mutation<(), Value> =
            Mutation::builder(cache, |_: ()| futures::future::ready(Ok(json!(1))))
                .redirect_to("/customer/dashboard")
                .build();

        let outcome = mutation.execute(()).await.unwrap();
        assert_eq!(outcome.redirect.as_deref(), Some("/customer/dashboard"));
    }

    #[tokio::test]
    async fn test_on_success_hook_runs() {
        let cache = QueryCache::with_defaults();
        let seen = Arc::new(Mutex::new(None));
        let seen_in = seen.clone();

        let mutation: Mutation<(), Value> =
            Mutation::builder(cache, |_: ()| futures::future::ready(Ok(json!({"id": 9}))))
                .on_success(move |value: &Value| {
                    *seen_in.lock() = Some(value.clone());
                })
                .build();

        mutation.execute(()).await.unwrap();
        assert_eq!(seen.lock().clone(), Some(json!({"id": 9})));
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_independent() {
        let cache = QueryCache::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();

        let mutation: Arc<Mutation<u32, Value>> = Arc::new(
            Mutation::builder(cache, move |n: u32| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Ok(json!(n)))
            })
            .build(),
        );

        let a = mutation.clone();
        let b = mutation.clone();
        let (ra, rb) = tokio::join!(a.execute(1), b.execute(2));

        // No deduplication: both actions ran.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ra.unwrap().value, json!(1));
        assert_eq!(rb.unwrap().value, json!(2));
    }
}
