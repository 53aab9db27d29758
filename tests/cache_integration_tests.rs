//! Integration tests for the caching layer
//!
//! These tests verify the complete interceptor behaviour including:
//! - Single-flight sharing of concurrent computations
//! - Key distinctness across argument lists
//! - TTL expiration measured from completion
//! - Failure non-retention
//! - Multi-value replay
//! - Caller cancellation

use async_cacheable::{
    CacheError, CacheInterceptor, CachePolicy, CacheRegistry, CachedOperation, CallArgs, Stage,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_test::{assert_err, assert_ok};

async fn setup(operation: &CachedOperation) -> Arc<CacheInterceptor> {
    let registry = Arc::new(CacheRegistry::new());
    registry.register(operation).await.unwrap();
    Arc::new(CacheInterceptor::new(registry))
}

/// Single-value call that counts invocations and takes `delay` to answer
async fn slow_lookup(
    interceptor: &CacheInterceptor,
    operation: &CachedOperation,
    args: &CallArgs,
    calls: &Arc<AtomicUsize>,
    delay: Duration,
    value: u64,
) -> async_cacheable::Result<u64> {
    let calls = calls.clone();
    interceptor
        .single(operation, args, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(delay).await;
            Ok::<_, anyhow::Error>(value)
        })
        .await
}

#[tokio::test]
async fn test_concurrent_callers_share_one_computation() {
    let op = CachedOperation::single("inventory.count", CachePolicy::new("inventory", 100, 60));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let interceptor = interceptor.clone();
            let op = op.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                let args = CallArgs::new().arg("warehouse-1");
                slow_lookup(&interceptor, &op, &args, &calls, Duration::from_millis(100), i).await
            })
        })
        .collect();

    let results: Vec<u64> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|value| *value == results[0]));

    let stats = interceptor.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 19);
}

#[tokio::test]
async fn test_argument_order_yields_distinct_entries() {
    let op = CachedOperation::single("math.sub", CachePolicy::new("math", 100, 60));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let forward = CallArgs::new().arg(1).arg(2);
    let backward = CallArgs::new().arg(2).arg(1);

    let a = slow_lookup(&interceptor, &op, &forward, &calls, Duration::ZERO, 10).await;
    let b = slow_lookup(&interceptor, &op, &backward, &calls, Duration::ZERO, 20).await;
    let a_again = slow_lookup(&interceptor, &op, &forward, &calls, Duration::ZERO, 30).await;

    assert_eq!(assert_ok!(a), 10);
    assert_eq!(assert_ok!(b), 20);
    assert_eq!(assert_ok!(a_again), 10);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_operations_do_not_share_entries() {
    let policy = CachePolicy::new("shared", 100, 60);
    let first = CachedOperation::single("a.get", policy.clone());
    let second = CachedOperation::single("b.get", policy);
    let interceptor = setup(&first).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let args = CallArgs::new().arg(7);

    let a = slow_lookup(&interceptor, &first, &args, &calls, Duration::ZERO, 1).await;
    let b = slow_lookup(&interceptor, &second, &args, &calls, Duration::ZERO, 2).await;

    assert_eq!(assert_ok!(a), 1);
    assert_eq!(assert_ok!(b), 2);
    assert_eq!(interceptor.registry().len().await, 1);
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let op = CachedOperation::single("clock.read", CachePolicy::new("clock", 100, 1));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let args = CallArgs::new();

    let first = slow_lookup(&interceptor, &op, &args, &calls, Duration::ZERO, 1).await;
    let within_ttl = slow_lookup(&interceptor, &op, &args, &calls, Duration::ZERO, 2).await;
    assert_eq!(assert_ok!(first), 1);
    assert_eq!(assert_ok!(within_ttl), 1);

    sleep(Duration::from_millis(1300)).await;

    let after_ttl = slow_lookup(&interceptor, &op, &args, &calls, Duration::ZERO, 3).await;
    assert_eq!(assert_ok!(after_ttl), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_late_joiner_and_post_ttl_caller() {
    let op = CachedOperation::single("report.build", CachePolicy::new("reports", 100, 1));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let a = {
        let interceptor = interceptor.clone();
        let op = op.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            let args = CallArgs::new().arg("q3");
            slow_lookup(&interceptor, &op, &args, &calls, Duration::from_millis(200), 1).await
        })
    };

    sleep(Duration::from_millis(50)).await;
    let args = CallArgs::new().arg("q3");
    let b = slow_lookup(&interceptor, &op, &args, &calls, Duration::from_millis(200), 2).await;
    assert_eq!(assert_ok!(b), 1);
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(a.await.unwrap().unwrap(), 1);

    sleep(Duration::from_millis(1200)).await;
    let c = slow_lookup(&interceptor, &op, &args, &calls, Duration::ZERO, 3).await;
    assert_eq!(assert_ok!(c), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failure_reaches_every_waiter_and_is_forgotten() {
    let op = CachedOperation::single("orders.fetch", CachePolicy::new("orders", 100, 60));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let failing = |interceptor: Arc<CacheInterceptor>, op: CachedOperation, calls: Arc<AtomicUsize>| async move {
        interceptor
            .single(&op, &CallArgs::new().arg(99), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(50)).await;
                Err::<u64, _>(anyhow::anyhow!("database unavailable"))
            })
            .await
    };

    let (first, second) = tokio::join!(
        failing(interceptor.clone(), op.clone(), calls.clone()),
        failing(interceptor.clone(), op.clone(), calls.clone()),
    );

    for result in [first, second] {
        let error = assert_err!(result);
        assert!(matches!(error, CacheError::Computation { stage: Stage::Single, .. }));
        assert_eq!(error.to_string(), "Error processing async cache with single");
        let cause = error.producer_failure().unwrap();
        assert_eq!(cause.to_string(), "database unavailable");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let retry = slow_lookup(&interceptor, &op, &CallArgs::new().arg(99), &calls, Duration::ZERO, 5).await;
    assert_eq!(assert_ok!(retry), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(interceptor.stats().failures, 1);
}

#[tokio::test]
async fn test_multi_value_replay_for_every_consumer() {
    let op = CachedOperation::multi("events.recent", CachePolicy::new("events", 100, 60));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let consume = |interceptor: Arc<CacheInterceptor>, op: CachedOperation, calls: Arc<AtomicUsize>| async move {
        let replay = interceptor
            .multi(&op, &CallArgs::new().arg("eu"), move || {
                calls.fetch_add(1, Ordering::SeqCst);
                futures::stream::iter(vec!["login", "view", "logout"])
                    .then(|event| async move {
                        sleep(Duration::from_millis(10)).await;
                        Ok::<_, anyhow::Error>(event.to_string())
                    })
            })
            .await
            .unwrap();
        replay.collect::<Vec<_>>().await
    };

    let (first, second) = tokio::join!(
        consume(interceptor.clone(), op.clone(), calls.clone()),
        consume(interceptor.clone(), op.clone(), calls.clone()),
    );
    let expected = vec!["login", "view", "logout"];
    assert_eq!(first, expected);
    assert_eq!(second, expected);

    let third = consume(interceptor.clone(), op.clone(), calls.clone()).await;
    assert_eq!(third, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_multi_value_replays_are_independent() {
    let op = CachedOperation::multi("letters", CachePolicy::new("letters", 100, 60));
    let interceptor = setup(&op).await;

    let mut first = interceptor
        .multi(&op, &CallArgs::new(), || {
            futures::stream::iter(vec![Ok::<_, anyhow::Error>('a'), Ok('b'), Ok('c')])
        })
        .await
        .unwrap();
    assert_eq!(first.next().await, Some('a'));
    assert_eq!(first.next().await, Some('b'));

    let second = interceptor
        .multi(&op, &CallArgs::new(), || futures::stream::empty::<anyhow::Result<char>>())
        .await
        .unwrap();
    assert_eq!(second.collect::<Vec<_>>().await, vec!['a', 'b', 'c']);
    assert_eq!(first.next().await, Some('c'));
}

#[tokio::test]
async fn test_multi_value_failure_is_not_cached() {
    let op = CachedOperation::multi("pages", CachePolicy::new("pages", 100, 60));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let broken = interceptor
        .multi(&op, &CallArgs::new(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::stream::iter(vec![Ok(1u32), Err(anyhow::anyhow!("page 2 missing"))])
        })
        .await;
    let error = assert_err!(broken);
    assert_eq!(error.to_string(), "Error processing async cache with multi");

    let counter = calls.clone();
    let healed = interceptor
        .multi(&op, &CallArgs::new(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::stream::iter(vec![Ok::<_, anyhow::Error>(1u32), Ok(2)])
        })
        .await;
    assert_eq!(assert_ok!(healed).to_vec(), vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancelled_caller_does_not_cancel_computation() {
    let op = CachedOperation::single("search.run", CachePolicy::new("search", 100, 60));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let args = CallArgs::new().arg("rust");

    let impatient = timeout(
        Duration::from_millis(30),
        slow_lookup(&interceptor, &op, &args, &calls, Duration::from_millis(150), 1),
    )
    .await;
    assert!(impatient.is_err());

    let patient = slow_lookup(&interceptor, &op, &args, &calls, Duration::from_millis(150), 2).await;
    assert_eq!(assert_ok!(patient), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_abandoned_computation_still_populates_cache() {
    let op = CachedOperation::single("search.run", CachePolicy::new("search", 100, 60));
    let interceptor = setup(&op).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let args = CallArgs::new().arg("tokio");

    let abandoned = {
        let interceptor = interceptor.clone();
        let op = op.clone();
        let args = args.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            slow_lookup(&interceptor, &op, &args, &calls, Duration::from_millis(100), 1).await
        })
    };
    sleep(Duration::from_millis(20)).await;
    abandoned.abort();

    sleep(Duration::from_millis(200)).await;
    let later = slow_lookup(&interceptor, &op, &args, &calls, Duration::ZERO, 2).await;
    assert_eq!(assert_ok!(later), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(interceptor.stats().hits, 1);
}
