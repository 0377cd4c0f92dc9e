//! # Tollbooth - Token Bucket Rate Limiting
//!
//! A small admission-control library: callers ask a [`TokenBucket`] for a
//! token before doing work, and the bucket decides whether they may proceed
//! now, after a short wait, or not at all.
//!
//! ## The Token Bucket Algorithm
//!
//! ```text
//!     rate = 5 tokens/s, capacity = 3
//!
//!     t=0.0s  [🪙🪙🪙]  request ×3 → ✅ ✅ ✅   (burst)
//!     t=0.0s  [      ]  request    → ⏳ wait 0.2s
//!     t=0.2s  [🪙    ]             → ✅
//!     t=2.0s  [🪙🪙🪙]  idle time refills up to capacity, never beyond
//! ```
//!
//! - **Tokens** accrue continuously at `rate` per second
//! - **Capacity** caps the bank and so bounds the burst
//! - **Refill** is lazy: computed on access, no background thread
//!
//! ## Quick Start
//!
//! ### Raw bucket
//!
//! ```rust
//! use std::time::Duration;
//! use tollbooth::TokenBucket;
//!
//! let bucket = TokenBucket::new(5.0, 3.0).unwrap();
//!
//! if bucket.try_acquire() {
//!     // proceed
//! }
//!
//! // Wait up to one second for a token
//! if bucket.acquire(true, Some(Duration::from_secs(1))) {
//!     // proceed
//! }
//!
//! println!("{}", bucket.stats());
//! ```
//!
//! ### Wrapping a function
//!
//! ```rust
//! use tollbooth::wrap;
//!
//! fn simulated_api_call(n: u32) -> String {
//!     format!("Response #{}", n)
//! }
//!
//! let limited = wrap(simulated_api_call, 2.0, 2.0).unwrap();
//! assert_eq!(limited.call((1,)).unwrap(), "Response #1");
//!
//! // The bucket stays reachable for statistics
//! assert_eq!(limited.bucket().stats().allowed, 1);
//! ```
//!
//! ### Async
//!
//! ```rust
//! use tollbooth::TokenBucket;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bucket = TokenBucket::new(10.0, 1.0).unwrap();
//! assert!(bucket.acquire_async(None).await);
//! assert!(bucket.acquire_async(None).await); // yields ~100ms instead of blocking
//! # }
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │   Your Application      │
//!                    └──────────┬──────────────┘
//!                               │
//!              ┌────────────────┼─────────────────┐
//!              ▼                ▼                 ▼
//!     ┌────────────────┐ ┌─────────────┐ ┌────────────────┐
//!     │ RateLimited /  │ │ TokenBucket │ │ KeyedLimiter   │
//!     │ AsyncRateLim.  │ │  (raw API)  │ │ (per-key)      │
//!     └───────┬────────┘ └──────┬──────┘ └───────┬────────┘
//!             └─────────────────┼────────────────┘
//!                               ▼
//!                    ┌─────────────────────────┐
//!                    │ Mutex<tokens, last,     │
//!                    │       stats>            │
//!                    └─────────────────────────┘
//! ```
//!
//! ## Thread Safety
//!
//! A bucket is `Send + Sync`; share it with `Arc`. Each bucket has exactly one
//! lock and it is never held while a caller sleeps or awaits, so blocking
//! threads and async tasks can share a bucket.
//!
//! ## Fairness
//!
//! Waiters are not queued. When a token accrues, whichever waiter reaches the
//! lock first takes it. FIFO admission would need a wait queue and is not
//! provided.
//!
//! ## Errors
//!
//! - Invalid parameters fail construction with [`ConfigError`].
//! - At the bucket level a refusal is just `false`.
//! - The wrappers turn a refusal into [`RateLimitExceeded`]; errors from the
//!   wrapped function are passed through untouched.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

mod rate_limiter;

pub use rate_limiter::{
    wrap, wrap_async, wrap_async_with, wrap_with, AcquireOptions, AsyncRateLimited,
    BucketConfig, Clock, ConfigError, Invoke, InvokeAsync, KeyedLimiter, ManualClock,
    MonotonicClock, RateLimitExceeded, RateLimited, RateLimiterStats, StatsSnapshot,
    TokenBucket, DEFAULT_WRAP_TIMEOUT,
};

/// A bucket wrapped in `Arc` for sharing across threads and tasks.
///
/// # Example
/// ```rust
/// use tollbooth::{SharedBucket, TokenBucket};
/// use std::sync::Arc;
///
/// let shared: SharedBucket = Arc::new(TokenBucket::new(10.0, 10.0).unwrap());
///
/// let bucket = shared.clone();
/// std::thread::spawn(move || {
///     bucket.try_acquire();
/// })
/// .join()
/// .unwrap();
/// ```
pub type SharedBucket = std::sync::Arc<TokenBucket>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
///
/// ```rust
/// use tollbooth::prelude::*;
///
/// let bucket = TokenBucket::new(5.0, 3.0).unwrap();
/// let config = BucketConfig::per_second(5);
/// let options = AcquireOptions::non_blocking();
/// ```
pub mod prelude {
    //! Common imports for typical rate limiting use cases.

    pub use crate::{
        wrap, wrap_async, AcquireOptions, AsyncRateLimited, BucketConfig, ConfigError,
        KeyedLimiter, RateLimitExceeded, RateLimited, SharedBucket, StatsSnapshot, TokenBucket,
        TokenBucketBuilder,
    };
}

/// Fluent construction of a [`TokenBucket`].
///
/// # Example
///
/// ```rust
/// use tollbooth::TokenBucketBuilder;
///
/// let bucket = TokenBucketBuilder::new()
///     .rate(5.0)        // tokens per second
///     .capacity(3.0)    // burst size
///     .build()
///     .unwrap();
/// assert_eq!(bucket.capacity(), 3.0);
///
/// // Invalid parameters are reported, not clamped
/// assert!(TokenBucketBuilder::new().rate(0.0).build().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TokenBucketBuilder {
    config: BucketConfig,
}

impl TokenBucketBuilder {
    /// Starts from [`BucketConfig::default`] (10 tokens/s, burst 10).
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: BucketConfig) -> Self {
        Self { config }
    }

    /// Tokens added per second (must be > 0).
    pub fn rate(mut self, rate: f64) -> Self {
        self.config.rate = rate;
        self
    }

    /// Sustained rate expressed per minute.
    pub fn rate_per_minute(mut self, per_minute: f64) -> Self {
        self.config.rate = per_minute / 60.0;
        self
    }

    /// Burst capacity (must be >= 1). Also the initial token level.
    pub fn capacity(mut self, capacity: f64) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Builds the bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn build(self) -> Result<TokenBucket, ConfigError> {
        TokenBucket::with_config(self.config)
    }

    /// Builds the bucket already wrapped in an `Arc`.
    pub fn build_shared(self) -> Result<SharedBucket, ConfigError> {
        self.build().map(std::sync::Arc::new)
    }

    /// Builds a bucket driven by a custom clock.
    pub fn build_with_clock<C: Clock>(self, clock: C) -> Result<TokenBucket<C>, ConfigError> {
        TokenBucket::with_config_and_clock(self.config, clock)
    }
}
