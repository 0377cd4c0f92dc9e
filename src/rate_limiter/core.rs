//! # Core Token Bucket Implementation
//!
//! This module implements the token bucket the rest of the crate is built on.
//! All mutable state sits behind a single mutex and is refilled lazily: there
//! is no background timer, the caller that touches the bucket pays for the
//! refill arithmetic.
//!
//! ## The Token Bucket Algorithm
//!
//! ```text
//!     rate = 5/s, capacity = 3
//!
//!     t=0.0   [🪙🪙🪙]  3.0   acquire ×3 → ✅ ✅ ✅
//!     t=0.0   [      ]  0.0   acquire    → wait (1 - 0.0) / 5 = 0.2s
//!     t=0.2   [🪙    ]  1.0   retry      → ✅ (waited 0.2s)
//!     t=1.0   [🪙🪙🪙]  3.0   refill is capped at capacity
//! ```
//!
//! ## Lock Discipline
//!
//! ```text
//!     acquire():
//!
//!     ┌─ lock ─────────────────────────┐
//!     │ total += 1, refill, take?      │──► ✅ / ❌ (non-blocking)
//!     └────────────────────────────────┘
//!                  │ short
//!                  ▼
//!     sleep / .await  (lock released) ◄──────┐
//!                  │                          │
//!     ┌─ lock ─────▼───────────────────┐      │
//!     │ refill, take?                  │──────┘ still short
//!     └────────────────────────────────┘
//!                  │
//!                  ▼
//!            ✅ / ❌ (deadline passed)
//! ```
//!
//! The lock is never held while sleeping, so waiters do not block callers
//! that can be served from banked tokens. There is no queue: when a token
//! accrues, whichever waiter takes the lock first gets it.

use super::{
    clock::{Clock, MonotonicClock},
    config::BucketConfig,
    error::ConfigError,
    stats::{RateLimiterStats, StatsSnapshot},
};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Mutable state guarded by the bucket's lock as one unit.
#[derive(Debug)]
struct BucketState {
    /// Current level, always within `[0, capacity]`.
    tokens: f64,
    /// Instant of the last refill computation.
    last_update: Instant,
    stats: RateLimiterStats,
}

impl BucketState {
    /// Credits the tokens accrued since `last_update`.
    #[inline]
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_update);
        if elapsed.is_zero() {
            return;
        }
        let before = self.tokens;
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(capacity);
        self.last_update = now;
        trace!("Refilled {:.4} tokens over {:?}", self.tokens - before, elapsed);
    }

    /// Takes one token if a whole one is banked.
    #[inline]
    fn take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one whole token is banked at `rate`.
    #[inline]
    fn shortfall(&self, rate: f64) -> Duration {
        // Saturates for rates so small the wait overflows a Duration
        Duration::try_from_secs_f64(((1.0 - self.tokens) / rate).max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Outcome of one locked check-and-mutate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Acquired,
    Rejected,
    Wait(Duration),
}

/// Thread-safe token bucket rate limiter.
///
/// Tokens accrue continuously at `rate` per second up to `capacity`, and each
/// admitted caller consumes one. The bucket starts full, so `capacity` calls
/// can proceed back to back before the rate applies.
///
/// Share one bucket per protected resource through an `Arc`; sync threads and
/// async tasks may use the same instance.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
/// use tollbooth::TokenBucket;
///
/// let bucket = Arc::new(TokenBucket::new(50.0, 5.0).unwrap());
///
/// let mut handles = vec![];
/// for _ in 0..4 {
///     let bucket = bucket.clone();
///     handles.push(thread::spawn(move || {
///         bucket.acquire(true, Some(Duration::from_secs(1)))
///     }));
/// }
/// for handle in handles {
///     assert!(handle.join().unwrap());
/// }
/// ```
pub struct TokenBucket<C: Clock = MonotonicClock> {
    state: Mutex<BucketState>,
    rate: f64,
    capacity: f64,
    clock: C,
}

impl TokenBucket<MonotonicClock> {
    /// Creates a full bucket refilling at `rate` tokens per second with a burst
    /// of `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `rate <= 0` or `capacity < 1` (or either is
    /// not finite).
    ///
    /// # Example
    ///
    /// ```rust
    /// use tollbooth::TokenBucket;
    ///
    /// let bucket = TokenBucket::new(5.0, 3.0).unwrap();
    /// assert_eq!(bucket.capacity(), 3.0);
    ///
    /// assert!(TokenBucket::new(0.0, 3.0).is_err());
    /// ```
    pub fn new(rate: f64, capacity: f64) -> Result<Self, ConfigError> {
        Self::with_config(BucketConfig::new(rate, capacity))
    }

    /// Creates a bucket from a [`BucketConfig`].
    pub fn with_config(config: BucketConfig) -> Result<Self, ConfigError> {
        Self::with_config_and_clock(config, MonotonicClock)
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Creates a bucket driven by a custom [`Clock`].
    pub fn with_clock(rate: f64, capacity: f64, clock: C) -> Result<Self, ConfigError> {
        Self::with_config_and_clock(BucketConfig::new(rate, capacity), clock)
    }

    /// Creates a bucket from a [`BucketConfig`] and a custom [`Clock`].
    pub fn with_config_and_clock(config: BucketConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config, clock))
    }

    /// Builds a full bucket from a configuration that already passed
    /// [`BucketConfig::validate`].
    pub(crate) fn from_validated(config: BucketConfig, clock: C) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_update: now,
                stats: RateLimiterStats::default(),
            }),
            rate: config.rate,
            capacity: config.capacity,
            clock,
        }
    }

    /// Tokens added per second.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Burst capacity.
    #[inline]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// The configuration this bucket was built from.
    pub fn config(&self) -> BucketConfig {
        BucketConfig::new(self.rate, self.capacity)
    }

    /// Takes a token if one is banked, without waiting.
    ///
    /// Same as `acquire(false, None)`.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.acquire(false, None)
    }

    /// Acquires one token.
    ///
    /// - A banked token is taken immediately.
    /// - Otherwise, with `blocking == false` or a zero `timeout`, the call
    ///   fails at once.
    /// - Otherwise the calling thread sleeps (without holding the lock) until
    ///   a token accrues or `timeout` expires. `None` waits indefinitely.
    ///
    /// The timeout is measured in real time, whatever [`Clock`] drives refill.
    /// Rejection is an ordinary outcome and is reported as `false`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::{Duration, Instant};
    /// use tollbooth::TokenBucket;
    ///
    /// let bucket = TokenBucket::new(5.0, 3.0).unwrap();
    /// for _ in 0..3 {
    ///     assert!(bucket.acquire(true, None));
    /// }
    ///
    /// // Empty: non-blocking fails at once
    /// assert!(!bucket.acquire(false, None));
    ///
    /// // Blocking waits roughly 1/5 s for the next token
    /// let start = Instant::now();
    /// assert!(bucket.acquire(true, Some(Duration::from_secs(1))));
    /// assert!(start.elapsed() >= Duration::from_millis(150));
    /// ```
    pub fn acquire(&self, blocking: bool, timeout: Option<Duration>) -> bool {
        let start = self.clock.now();
        let reject_if_short = !blocking || timeout == Some(Duration::ZERO);

        let mut wait = match self.begin(start, reject_if_short) {
            Attempt::Acquired => return true,
            Attempt::Rejected => return false,
            Attempt::Wait(wait) => wait,
        };

        let wait_start = Instant::now();
        let deadline = timeout.and_then(|t| wait_start.checked_add(t));
        debug!("Bucket empty, waiting {:?} for next token", wait);

        loop {
            let Some(nap) = remaining_budget(wait, deadline, Instant::now()) else {
                self.reject_after_wait(wait_start.elapsed());
                return false;
            };
            std::thread::sleep(nap);

            match self.retry(start) {
                Attempt::Acquired => return true,
                Attempt::Wait(next) => wait = next,
                Attempt::Rejected => return false,
            }
        }
    }

    /// Async twin of [`acquire`](Self::acquire) that always waits.
    ///
    /// The wait is a `tokio::time::sleep`, so the task yields instead of
    /// blocking its worker thread. The lock is only taken inside synchronous
    /// steps and never held across an `.await`. A zero `timeout` fails at once
    /// when no token is banked.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use tollbooth::TokenBucket;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let bucket = TokenBucket::new(20.0, 1.0).unwrap();
    /// assert!(bucket.acquire_async(None).await);
    /// assert!(bucket.acquire_async(Some(Duration::from_secs(1))).await);
    /// assert!(!bucket.acquire_async(Some(Duration::ZERO)).await);
    /// # }
    /// ```
    pub async fn acquire_async(&self, timeout: Option<Duration>) -> bool {
        let start = self.clock.now();
        let reject_if_short = timeout == Some(Duration::ZERO);

        let mut wait = match self.begin(start, reject_if_short) {
            Attempt::Acquired => return true,
            Attempt::Rejected => return false,
            Attempt::Wait(wait) => wait,
        };

        let wait_start = tokio::time::Instant::now();
        let deadline = timeout.and_then(|t| wait_start.checked_add(t));
        debug!("Bucket empty, task waiting {:?} for next token", wait);

        loop {
            let now = tokio::time::Instant::now().into_std();
            let Some(nap) = remaining_budget(wait, deadline.map(|d| d.into_std()), now) else {
                self.reject_after_wait(wait_start.elapsed());
                return false;
            };
            tokio::time::sleep(nap).await;

            match self.retry(start) {
                Attempt::Acquired => return true,
                Attempt::Wait(next) => wait = next,
                Attempt::Rejected => return false,
            }
        }
    }

    /// First locked step of an acquisition: count the request, refill, and
    /// either take a token, reject, or report how long to wait.
    fn begin(&self, start: Instant, reject_if_short: bool) -> Attempt {
        let mut state = self.state.lock();
        state.stats.record_request();
        state.refill(start, self.rate, self.capacity);

        if state.take() {
            state.stats.record_allowed(Duration::ZERO);
            return Attempt::Acquired;
        }
        if reject_if_short {
            state.stats.record_rejected();
            debug!("Rejected without waiting ({:.3} tokens banked)", state.tokens);
            return Attempt::Rejected;
        }
        Attempt::Wait(state.shortfall(self.rate))
    }

    /// Locked step after a wait: refill and take a token if one accrued.
    fn retry(&self, start: Instant) -> Attempt {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.refill(now, self.rate, self.capacity);

        if state.take() {
            let waited = now.saturating_duration_since(start);
            state.stats.record_allowed(waited);
            debug!("Acquired token after waiting {:?}", waited);
            Attempt::Acquired
        } else {
            Attempt::Wait(state.shortfall(self.rate))
        }
    }

    fn reject_after_wait(&self, waited: Duration) {
        let mut state = self.state.lock();
        state.stats.record_rejected();
        debug!("Rejected after waiting {:?} (deadline reached)", waited);
    }

    /// Time until the next whole token is banked, zero if one is available now.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use tollbooth::TokenBucket;
    ///
    /// let bucket = TokenBucket::new(0.5, 1.0).unwrap();
    /// assert_eq!(bucket.time_until_available(), Duration::ZERO);
    /// bucket.try_acquire();
    /// assert!(bucket.time_until_available() > Duration::from_secs(1));
    /// ```
    pub fn time_until_available(&self) -> Duration {
        let mut state = self.state.lock();
        state.refill(self.clock.now(), self.rate, self.capacity);
        state.shortfall(self.rate)
    }

    /// Current token level after refill.
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock();
        state.refill(self.clock.now(), self.rate, self.capacity);
        state.tokens
    }

    /// Consistent snapshot of the counters and the current token level.
    ///
    /// Taken under the lock, so a half-applied update is never visible.
    pub fn stats(&self) -> StatsSnapshot {
        let mut state = self.state.lock();
        state.refill(self.clock.now(), self.rate, self.capacity);
        StatsSnapshot::new(&state.stats, state.tokens, self.capacity)
    }

    /// Refills the bucket to capacity and zeroes the statistics.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tokens = self.capacity;
        state.last_update = self.clock.now();
        state.stats = RateLimiterStats::default();
    }
}

/// Remaining sleep for one wait iteration, or `None` once the deadline passed.
///
/// Deadlines are real time, independent of the bucket's clock. The budget is
/// recomputed from the fixed deadline on every iteration so many short naps
/// cannot drift past it.
#[inline]
fn remaining_budget(wait: Duration, deadline: Option<Instant>, now: Instant) -> Option<Duration> {
    match deadline {
        None => Some(wait),
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(now);
            if remaining.is_zero() {
                None
            } else {
                Some(wait.min(remaining))
            }
        }
    }
}

impl<C: Clock> std::fmt::Debug for TokenBucket<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .field("current_tokens", &self.available_tokens())
            .finish()
    }
}
