//! Observable properties of the query cache and mutation orchestration.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use velopoint_query::{
    Mutation, QueryCache, QueryKey, QueryOptions, QueryStatus,
};

/// Fetcher that counts invocations and resolves immediately.
fn counting_fetcher(
    calls: Arc<AtomicUsize>,
    payload: Value,
) -> impl Fn() -> futures::future::Ready<velopoint_client::Result<Value>> + Send + Sync + 'static {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(payload.clone()))
    }
}

/// Fetcher that counts invocations and takes simulated time to resolve.
fn slow_fetcher(
    calls: Arc<AtomicUsize>,
    payload: Value,
) -> impl Fn() -> futures::future::BoxFuture<'static, velopoint_client::Result<Value>>
       + Send
       + Sync
       + 'static {
    use futures::future::FutureExt;
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        let payload = payload.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(payload)
        }
        .boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_reads_trigger_exactly_one_fetch() {
    let cache = QueryCache::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("orders").with_value(json!({"status": "pending"}));

    let (a, b, c) = tokio::join!(
        cache.fetch(
            &key,
            slow_fetcher(calls.clone(), json!({"count": 1})),
            QueryOptions::default()
        ),
        cache.fetch(
            &key,
            slow_fetcher(calls.clone(), json!({"count": 1})),
            QueryOptions::default()
        ),
        cache.fetch(
            &key,
            slow_fetcher(calls.clone(), json!({"count": 1})),
            QueryOptions::default()
        ),
    );

    // All callers observe the same single fetch's outcome.
    assert_eq!(a.unwrap(), json!({"count": 1}));
    assert_eq!(b.unwrap(), json!({"count": 1}));
    assert_eq!(c.unwrap(), json!({"count": 1}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distinct_keys_fetch_independently() {
    let cache = QueryCache::with_defaults();
    let pending = QueryKey::new("orders").with_value(json!({"status": "pending"}));
    let approved = QueryKey::new("orders").with_value(json!({"status": "approved"}));

    cache
        .fetch(
            &pending,
            || futures::future::ready(Ok(json!({"count": 2}))),
            QueryOptions::default(),
        )
        .await
        .unwrap();

    // The other key's fetch fails; the first key's data is untouched.
    let err = cache
        .fetch(
            &approved,
            || {
                futures::future::ready(Err(velopoint_client::Error::Http {
                    status: 500,
                    message: "boom".to_string(),
                }))
            },
            QueryOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));

    let snapshot = cache.peek(&pending).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.data, Some(json!({"count": 2})));
}

#[tokio::test]
async fn fresh_rereads_are_idempotent() {
    let cache = QueryCache::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("products");

    let first = cache
        .fetch(
            &key,
            counting_fetcher(calls.clone(), json!([{"id": 1}])),
            QueryOptions::default(),
        )
        .await
        .unwrap();

    for _ in 0..5 {
        let again = cache
            .fetch(
                &key,
                counting_fetcher(calls.clone(), json!([{"id": 1}])),
                QueryOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(again, first);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalidation_forces_refetch_regardless_of_freshness() {
    let cache = QueryCache::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("orders").with_value(json!({"status": "pending"}));

    cache
        .fetch(
            &key,
            counting_fetcher(calls.clone(), json!({"count": 1})),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache.invalidate(&QueryKey::new("orders"));

    cache
        .fetch(
            &key,
            counting_fetcher(calls.clone(), json!({"count": 1})),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidation_leaves_unrelated_prefixes_alone() {
    let cache = QueryCache::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let notifications = QueryKey::of(["notifications", "unread-count"]);

    cache
        .fetch(
            &notifications,
            counting_fetcher(calls.clone(), json!({"count": 3})),
            QueryOptions::default(),
        )
        .await
        .unwrap();

    cache.invalidate(&QueryKey::new("orders"));

    cache
        .fetch(
            &notifications,
            counting_fetcher(calls.clone(), json!({"count": 3})),
            QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalidation_eagerly_refetches_subscribed_entries() {
    let cache = QueryCache::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("orders").with_value(json!({"status": "pending"}));

    // Each fetch returns its own sequence number so the test can await
    // the refetch through the watch channel.
    let seq = calls.clone();
    let fetcher = move || {
        let n = seq.fetch_add(1, Ordering::SeqCst) + 1;
        futures::future::ready(Ok(json!({"seq": n})))
    };

    let mut sub = cache.subscribe(&key, fetcher, QueryOptions::default());

    sub.receiver()
        .wait_for(|s| s.data == Some(json!({"seq": 1})))
        .await
        .unwrap();

    cache.invalidate(&QueryKey::new("orders"));

    // The subscribed entry refetches without being read again.
    sub.receiver()
        .wait_for(|s| s.data == Some(json!({"seq": 2})))
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(sub.snapshot().status, QueryStatus::Success);
}

#[tokio::test]
async fn invalidation_is_lazy_for_dormant_entries() {
    let cache = QueryCache::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("sales");

    cache
        .fetch(
            &key,
            counting_fetcher(calls.clone(), json!([])),
            QueryOptions::default(),
        )
        .await
        .unwrap();

    cache.invalidate(&QueryKey::new("sales"));
    tokio::task::yield_now().await;

    // Marked stale, but nothing refetched it yet.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache
        .fetch(
            &key,
            counting_fetcher(calls.clone(), json!([])),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn polling_refetches_while_subscribed() {
    let cache = QueryCache::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::of(["notifications", "unread-count"]);

    let sub = cache.subscribe(
        &key,
        counting_fetcher(calls.clone(), json!({"count": 2})),
        QueryOptions::default().with_poll_interval(Duration::from_secs(30)),
    );

    // Initial fetch on subscribe.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Three 30-second intervals pass: exactly three more fetches.
    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // Unmounting the last subscriber stops the interval.
    drop(sub);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn mutation_success_refreshes_order_listings() {
    let cache = QueryCache::with_defaults();
    let key = QueryKey::new("orders").with_value(json!({"status": "pending"}));

    // Simulated server state: one pending order until it gets approved.
    let pending_on_server = Arc::new(AtomicI64::new(1));

    let server = pending_on_server.clone();
    let fetcher = move || {
        let n = server.load(Ordering::SeqCst);
        let results: Vec<Value> = (0..n).map(|i| json!({"id": i + 1, "status": "pending"})).collect();
        futures::future::ready(Ok(json!({"results": results, "count": n})))
    };

    let page = cache
        .fetch(&key, fetcher.clone(), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(page["count"], json!(1));
    assert_eq!(page["results"].as_array().unwrap().len(), 1);

    // Approving the order empties the pending queue server-side.
    let server = pending_on_server.clone();
    let approve: Mutation<i64, Value> = Mutation::builder(cache.clone(), move |_order_id: i64| {
        server.store(0, Ordering::SeqCst);
        futures::future::ready(Ok(json!({"status": "approved"})))
    })
    .invalidates(QueryKey::new("orders"))
    .build();

    approve.execute(1).await.unwrap();

    let page = cache
        .fetch(&key, fetcher, QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(page["count"], json!(0));
    assert_eq!(page["results"], json!([]));
}

#[tokio::test(start_paused = true)]
async fn unmounted_fetch_still_lands_in_cache() {
    let cache = QueryCache::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("products");

    {
        let _sub = cache.subscribe(
            &key,
            slow_fetcher(calls.clone(), json!([{"id": 1}])),
            QueryOptions::default(),
        );
        // Subscriber unmounts while the fetch is still in flight.
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = cache.peek(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.data, Some(json!([{"id": 1}])));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
