use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tollbooth::{wrap_async, wrap_async_with, AcquireOptions, TokenBucket};

#[tokio::test]
async fn test_async_burst_then_wait() {
    let bucket = TokenBucket::new(10.0, 2.0).unwrap();
    assert!(bucket.acquire_async(None).await);
    assert!(bucket.acquire_async(None).await);

    let start = Instant::now();
    assert!(bucket.acquire_async(Some(Duration::from_secs(1))).await);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(80), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(500), "{:?}", elapsed);
}

#[tokio::test]
async fn test_async_timeout() {
    let bucket = TokenBucket::new(0.5, 1.0).unwrap();
    assert!(bucket.acquire_async(None).await);

    let start = Instant::now();
    assert!(!bucket.acquire_async(Some(Duration::from_millis(100))).await);
    assert!(start.elapsed() < Duration::from_millis(500));

    let stats = bucket.stats();
    assert_eq!(stats.allowed, 1);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_are_paced() {
    // rate 20, capacity 5, 15 tasks: the last 10 need ~0.5s of refill
    let bucket = Arc::new(TokenBucket::new(20.0, 5.0).unwrap());
    let start = Instant::now();

    let handles: Vec<_> = (0..15)
        .map(|_| {
            let bucket = bucket.clone();
            tokio::spawn(async move { bucket.acquire_async(Some(Duration::from_secs(5))).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap());
    }

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(450), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);

    let stats = bucket.stats();
    assert_eq!(stats.allowed, 15);
    assert_eq!(stats.rejected, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_threads_and_tasks_share_a_bucket() {
    let bucket = Arc::new(TokenBucket::new(50.0, 4.0).unwrap());

    let threads: Vec<_> = (0..3)
        .map(|_| {
            let bucket = bucket.clone();
            std::thread::spawn(move || {
                (0..5)
                    .filter(|_| bucket.acquire(true, Some(Duration::from_secs(2))))
                    .count()
            })
        })
        .collect();

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let bucket = bucket.clone();
            tokio::spawn(async move {
                let mut acquired = 0;
                for _ in 0..5 {
                    if bucket.acquire_async(Some(Duration::from_secs(2))).await {
                        acquired += 1;
                    }
                }
                acquired
            })
        })
        .collect();

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap();
    }
    for thread in threads {
        total += thread.join().unwrap();
    }

    assert_eq!(total, 30);
    let stats = bucket.stats();
    assert_eq!(stats.total_requests, 30);
    assert_eq!(stats.allowed, 30);
}

#[tokio::test(flavor = "current_thread")]
async fn test_waiting_task_does_not_block_the_runtime() {
    // On a single-threaded runtime a waiting task must yield, so the
    // ticker keeps running and the stats lock stays free.
    let bucket = Arc::new(TokenBucket::new(5.0, 1.0).unwrap());
    assert!(bucket.try_acquire());

    let waiter = {
        let bucket = bucket.clone();
        tokio::spawn(async move { bucket.acquire_async(Some(Duration::from_secs(2))).await })
    };

    let ticks = Arc::new(AtomicU32::new(0));
    let ticker = {
        let ticks = ticks.clone();
        let bucket = bucket.clone();
        tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                // Would deadlock if the waiter kept the lock across its sleep
                let _ = bucket.stats();
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    ticker.await.unwrap();
    assert_eq!(ticks.load(Ordering::SeqCst), 5);
    assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn test_async_wrapper_refuses_when_non_blocking() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let bucket = Arc::new(TokenBucket::new(0.1, 1.0).unwrap());

    let limited = wrap_async_with(
        move |x: u32| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                x + 1
            }
        },
        bucket,
        AcquireOptions::non_blocking(),
    )
    .named("increment");

    assert_eq!(limited.call((1,)).await.unwrap(), 2);
    let err = limited.call((2,)).await.unwrap_err();
    assert_eq!(err.name, "increment");
    assert_eq!(err.timeout, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_async_wrapper_paces_calls() {
    async fn page(n: u32) -> String {
        format!("page {}", n)
    }

    let limited = wrap_async(page, 10.0, 1.0).unwrap();
    let start = Instant::now();
    for n in 0..3 {
        assert_eq!(limited.call((n,)).await.unwrap(), format!("page {}", n));
    }
    // Two refills at 10/s
    assert!(start.elapsed() >= Duration::from_millis(180));
    assert_eq!(limited.bucket().stats().allowed, 3);
}
