use predictdash::application::query::{
    QueryCacheConfig, QueryClient, QueryStatus, RetryPolicy, query_fn,
};
use predictdash::domain::errors::DashboardError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn counting_fetcher(
    calls: Arc<AtomicUsize>,
    delay: Duration,
) -> predictdash::application::query::QueryFn<&'static str, String> {
    query_fn(move |key: &'static str| {
        let calls = calls.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(format!("{}#{}", key, n))
        }
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("predictdash=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_subscribers_share_one_fetch() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(200));

    let mut first = client.subscribe("chart", fetcher.clone());
    let mut second = client.subscribe("chart", fetcher.clone());
    let mut third = client.subscribe("chart", fetcher);

    let a = first.settled().await;
    let b = second.settled().await;
    let c = third.settled().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data.as_deref(), Some("chart#0"));
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_result_is_served_from_cache() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig {
        stale_time: Duration::from_secs(30),
        ..QueryCacheConfig::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(10));

    let mut observer = client.subscribe("history", fetcher.clone());
    observer.settled().await;
    drop(observer);

    let mut again = client.subscribe("history", fetcher.clone());
    assert_eq!(again.settled().await.data.as_deref(), Some("history#0"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    drop(again);

    // Past stale_time the next subscription refetches.
    tokio::time::sleep(Duration::from_secs(31)).await;
    let mut later = client.subscribe("history", fetcher);
    assert_eq!(later.settled().await.data.as_deref(), Some("history#1"));
}

#[tokio::test(start_paused = true)]
async fn test_superseded_response_never_commits() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    // First request is slow, every later one is fast.
    let fetcher = query_fn(move |_key: &'static str| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            let delay = if n == 0 { 500 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, DashboardError>(n)
        }
    });

    let mut observer = client.subscribe("chart", fetcher);
    observer.refetch();

    let entry = observer.settled().await;
    assert_eq!(entry.data, Some(1));

    // Let the slow first response arrive; it must be dropped.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let entry = observer.current();
    assert_eq!(entry.status, QueryStatus::Success);
    assert_eq!(entry.data, Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_keeps_data_visible_while_refetching() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut observer =
        client.subscribe("history", counting_fetcher(calls.clone(), Duration::from_millis(100)));
    observer.settled().await;

    client.invalidate(&"history");
    tokio::time::sleep(Duration::from_millis(10)).await;
    let revalidating = observer.current();
    assert!(revalidating.is_revalidating());
    assert_eq!(revalidating.data.as_deref(), Some("history#0"));

    let refreshed = observer.settled().await;
    assert_eq!(refreshed.data.as_deref(), Some("history#1"));
    assert!(!refreshed.is_stale);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_during_unobserved_fetch_forces_refetch() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig {
        stale_time: Duration::from_secs(30),
        ..QueryCacheConfig::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(200));

    let observer = client.subscribe("history", fetcher.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(observer);
    client.invalidate(&"history");

    // The pre-invalidation fetch settles with nobody watching.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let cached = client.entry(&"history").unwrap();
    assert_eq!(cached.data.as_deref(), Some("history#0"));
    assert!(cached.is_stale);

    let mut again = client.subscribe("history", fetcher);
    let entry = again.settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(entry.data.as_deref(), Some("history#1"));
    assert!(!entry.is_stale);
}

#[tokio::test(start_paused = true)]
async fn test_resubscribe_after_invalidate_skips_older_in_flight_fetch() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig {
        stale_time: Duration::from_secs(30),
        ..QueryCacheConfig::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(200));

    let observer = client.subscribe("history", fetcher.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(observer);
    client.invalidate(&"history");

    let mut again = client.subscribe("history", fetcher);
    let entry = again.settled().await;
    assert_eq!(entry.data.as_deref(), Some("history#1"));
    assert!(!entry.is_stale);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(again.current().data.as_deref(), Some("history#1"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_is_recorded_per_key() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig::default());
    let failing = query_fn(|_key: &'static str| async {
        Err::<String, _>(DashboardError::ServerError {
            status: 500,
            message: "model unavailable".into(),
        })
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let mut broken = client.subscribe("chart", failing);
    let mut healthy = client.subscribe("history", counting_fetcher(calls, Duration::ZERO));

    let broken = broken.settled().await;
    assert_eq!(broken.status, QueryStatus::Error);
    assert!(broken.data.is_none());
    assert!(matches!(broken.error, Some(DashboardError::ServerError { status: 500, .. })));

    let healthy = healthy.settled().await;
    assert_eq!(healthy.status, QueryStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_are_retried() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig {
        retry: RetryPolicy::exponential(2, Duration::from_millis(100), Duration::from_secs(1)),
        ..QueryCacheConfig::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let flaky = query_fn(move |_key: &'static str| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err(DashboardError::network("connection reset"))
            } else {
                Ok(n)
            }
        }
    });

    let mut observer = client.subscribe("chart", flaky);
    let entry = observer.settled().await;
    assert_eq!(entry.data, Some(2));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unobserved_entries_are_collected() {
    init_tracing();
    let client = QueryClient::spawn(QueryCacheConfig {
        gc_time: Duration::from_secs(5),
        gc_interval: Duration::from_secs(1),
        ..QueryCacheConfig::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls, Duration::ZERO);

    let mut kept = client.subscribe("kept", fetcher.clone());
    let mut dropped = client.subscribe("dropped", fetcher);
    kept.settled().await;
    dropped.settled().await;
    drop(dropped);

    tokio::time::sleep(Duration::from_secs(10)).await;

    let mut keys = client.cached_keys();
    keys.sort();
    assert_eq!(keys, vec!["kept"]);
    assert_eq!(kept.current().data.as_deref(), Some("kept#0"));
}
