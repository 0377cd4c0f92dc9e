//! Basic usage example for the tollbooth crate.
//!
//! Run with `RUST_LOG=tollbooth=debug cargo run --example basic` to see the
//! bucket's own log lines.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tollbooth::{wrap, wrap_with, AcquireOptions, BucketConfig, KeyedLimiter, TokenBucket};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("=== Token Bucket Example ===\n");

    // Example 1: Burst, then paced
    burst_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Wrapping a function
    wrap_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Refusals
    refusal_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 4: Shared across threads
    threaded_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 5: One bucket per client
    keyed_example();
}

fn burst_example() {
    println!("1. Burst Capacity and Pacing:");

    // 5 requests per second, burst of 3
    let bucket = TokenBucket::new(5.0, 3.0).expect("valid parameters");

    println!("   Testing burst capacity (3 quick requests)...");
    for i in 1..=3 {
        let start = Instant::now();
        bucket.acquire(true, None);
        println!("   Request {}: {:.2}ms", i, start.elapsed().as_secs_f64() * 1000.0);
    }

    println!("   Testing rate limiting (next 5 requests)...");
    for i in 4..=8 {
        let start = Instant::now();
        bucket.acquire(true, None);
        println!(
            "   Request {}: waited {:.2}ms",
            i,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    println!();
    for line in bucket.stats().summary().lines() {
        println!("   {}", line);
    }
}

fn simulated_api_call(n: u32) -> String {
    format!("Response #{}", n)
}

fn wrap_example() {
    println!("2. Rate-Limited Function:");

    let limited = wrap(simulated_api_call, 2.0, 2.0).expect("valid parameters");

    println!("   Calling rate-limited function 5 times...");
    for n in 1..=5 {
        let start = Instant::now();
        match limited.call((n,)) {
            Ok(response) => println!(
                "   {} (waited {:.2}ms)",
                response,
                start.elapsed().as_secs_f64() * 1000.0
            ),
            Err(err) => println!("   ❌ {}", err),
        }
    }
}

fn refusal_example() {
    println!("3. Refusals:");

    let bucket = Arc::new(TokenBucket::new(1.0, 2.0).expect("valid parameters"));
    let ping = wrap_with(|| "pong", bucket.clone(), AcquireOptions::non_blocking()).named("ping");

    for i in 1..=4 {
        match ping.call(()) {
            Ok(reply) => println!("   Call {} - ✅ {}", i, reply),
            Err(err) => println!("   Call {} - ❌ {}", i, err),
        }
    }

    let stats = bucket.stats();
    println!(
        "   Rejection rate: {:.2}% ({} of {})",
        stats.rejection_rate() * 100.0,
        stats.rejected,
        stats.total_requests
    );
}

fn threaded_example() {
    println!("4. Shared Across Threads:");

    let bucket = Arc::new(TokenBucket::new(20.0, 5.0).expect("valid parameters"));
    let start = Instant::now();

    let handles: Vec<_> = (0..4)
        .map(|id| {
            let bucket = bucket.clone();
            thread::spawn(move || {
                let mut admitted = 0;
                for _ in 0..5 {
                    if bucket.acquire(true, Some(Duration::from_secs(2))) {
                        admitted += 1;
                    }
                }
                (id, admitted)
            })
        })
        .collect();

    for handle in handles {
        let (id, admitted) = handle.join().expect("worker panicked");
        println!("   Thread {}: {} admitted", id, admitted);
    }

    println!(
        "   20 requests at 20/s with burst 5 took {:.2}s",
        start.elapsed().as_secs_f64()
    );
}

fn keyed_example() {
    println!("5. Per-Client Buckets:");

    let limiter = KeyedLimiter::new(BucketConfig::per_second(2)).expect("valid parameters");

    for client in ["alice", "alice", "alice", "bob"] {
        let verdict = if limiter.try_acquire(&client) {
            "✅ Allowed"
        } else {
            "❌ Rate limited"
        };
        println!("   {} - {}", client, verdict);
    }

    let mut all = limiter.all_stats();
    all.sort_by_key(|(client, _)| *client);
    for (client, stats) in all {
        println!(
            "   {}: {} allowed, {} rejected",
            client, stats.allowed, stats.rejected
        );
    }
}
