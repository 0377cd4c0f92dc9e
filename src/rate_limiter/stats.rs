//! # Usage Statistics
//!
//! Each bucket owns one [`RateLimiterStats`] and updates it only while its
//! lock is held, so the counters always move together. Callers never see the
//! live counters; [`TokenBucket::stats`](super::TokenBucket::stats) hands out
//! a [`StatsSnapshot`] instead.
//!
//! ```text
//!     Stats Report:
//!     ┌──────────────────────────────────┐
//!     │  Total Requests:  8              │
//!     │  Allowed:         7              │
//!     │  Rejected:        1   (12.50%)   │
//!     │  Avg Wait:        0.1143s        │
//!     │  Current Tokens:  0.02/3         │
//!     └──────────────────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;

/// Raw counters for one bucket.
///
/// Invariant after every completed acquisition:
/// `total_requests == allowed_requests + rejected_requests`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimiterStats {
    /// Every acquisition attempt, counted once when it starts.
    pub total_requests: u64,

    /// Attempts that obtained a token.
    pub allowed_requests: u64,

    /// Attempts that timed out or were refused in non-blocking mode.
    pub rejected_requests: u64,

    /// Time allowed requests spent waiting. Rejected requests do not count.
    pub total_wait: Duration,

    /// Longest single wait of an allowed request.
    pub max_wait: Duration,
}

impl RateLimiterStats {
    #[inline]
    pub(crate) fn record_request(&mut self) {
        self.total_requests += 1;
    }

    #[inline]
    pub(crate) fn record_allowed(&mut self, waited: Duration) {
        self.allowed_requests += 1;
        self.total_wait += waited;
        if waited > self.max_wait {
            self.max_wait = waited;
        }
    }

    #[inline]
    pub(crate) fn record_rejected(&mut self) {
        self.rejected_requests += 1;
    }

    /// Fraction of requests that were rejected, `0.0` before any request.
    pub fn rejection_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.rejected_requests as f64 / self.total_requests as f64
        }
    }

    /// Mean wait of allowed requests, zero before any request is allowed.
    pub fn avg_wait_time(&self) -> Duration {
        mean_wait(self.total_wait, self.allowed_requests)
    }
}

fn mean_wait(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / count as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

/// Consistent point-in-time view of a bucket.
///
/// # Example
///
/// ```rust
/// use tollbooth::TokenBucket;
///
/// let bucket = TokenBucket::new(5.0, 3.0).unwrap();
/// for _ in 0..3 {
///     assert!(bucket.try_acquire());
/// }
/// assert!(!bucket.try_acquire());
///
/// let stats = bucket.stats();
/// assert_eq!(stats.total_requests, 4);
/// assert_eq!(stats.allowed, 3);
/// assert_eq!(stats.rejected, 1);
/// assert_eq!(stats.rejection_rate(), 0.25);
/// println!("{}", stats);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    /// Every acquisition attempt so far.
    pub total_requests: u64,
    /// Attempts that obtained a token.
    pub allowed: u64,
    /// Attempts that were refused or timed out.
    pub rejected: u64,
    /// Cumulative wait of allowed requests.
    pub total_wait: Duration,
    /// Longest wait of a single allowed request.
    pub max_wait: Duration,
    /// Token level at the moment of the snapshot, after refill.
    pub current_tokens: f64,
    /// Configured burst capacity.
    pub capacity: f64,
}

impl StatsSnapshot {
    pub(crate) fn new(stats: &RateLimiterStats, current_tokens: f64, capacity: f64) -> Self {
        Self {
            total_requests: stats.total_requests,
            allowed: stats.allowed_requests,
            rejected: stats.rejected_requests,
            total_wait: stats.total_wait,
            max_wait: stats.max_wait,
            current_tokens,
            capacity,
        }
    }

    /// Fraction of requests that were rejected (0.0 to 1.0).
    #[inline]
    pub fn rejection_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.rejected as f64 / self.total_requests as f64
        }
    }

    /// Mean wait per allowed request.
    #[inline]
    pub fn avg_wait_time(&self) -> Duration {
        mean_wait(self.total_wait, self.allowed)
    }

    /// Multi-line report suitable for logs.
    pub fn summary(&self) -> String {
        format!(
            "TokenBucket Stats:\n\
             ├─ Total Requests: {}\n\
             ├─ Allowed: {}\n\
             ├─ Rejected: {}\n\
             ├─ Rejection Rate: {:.2}%\n\
             ├─ Avg Wait Time: {:.4}s\n\
             ├─ Max Wait Time: {:.4}s\n\
             └─ Current Tokens: {:.2}/{}",
            self.total_requests,
            self.allowed,
            self.rejected,
            self.rejection_rate() * 100.0,
            self.avg_wait_time().as_secs_f64(),
            self.max_wait.as_secs_f64(),
            self.current_tokens,
            self.capacity,
        )
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_rates_when_empty() {
        let stats = RateLimiterStats::default();
        assert_eq!(stats.rejection_rate(), 0.0);
        assert_eq!(stats.avg_wait_time(), Duration::ZERO);
    }

    #[test]
    fn test_counters_stay_balanced() {
        let mut stats = RateLimiterStats::default();
        for i in 0..10 {
            stats.record_request();
            if i % 3 == 0 {
                stats.record_rejected();
            } else {
                stats.record_allowed(Duration::ZERO);
            }
        }
        assert_eq!(stats.total_requests, 10);
        assert_eq!(
            stats.total_requests,
            stats.allowed_requests + stats.rejected_requests
        );
        assert_eq!(stats.rejected_requests, 4);
        assert!((stats.rejection_rate() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_wait_accounting() {
        let mut stats = RateLimiterStats::default();
        stats.record_request();
        stats.record_allowed(Duration::ZERO);
        stats.record_request();
        stats.record_allowed(Duration::from_millis(300));
        stats.record_request();
        stats.record_rejected();

        assert_eq!(stats.total_wait, Duration::from_millis(300));
        assert_eq!(stats.max_wait, Duration::from_millis(300));
        assert_eq!(stats.avg_wait_time(), Duration::from_millis(150));
    }

    #[test]
    fn test_snapshot_matches_counters() {
        let mut stats = RateLimiterStats::default();
        stats.record_request();
        stats.record_allowed(Duration::from_millis(40));
        stats.record_request();
        stats.record_rejected();

        let snapshot = StatsSnapshot::new(&stats, 1.5, 3.0);
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.allowed, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.rejection_rate(), stats.rejection_rate());
        assert_eq!(snapshot.avg_wait_time(), stats.avg_wait_time());
    }

    #[test]
    fn test_summary_format() {
        let mut stats = RateLimiterStats::default();
        for _ in 0..3 {
            stats.record_request();
            stats.record_allowed(Duration::ZERO);
        }
        stats.record_request();
        stats.record_rejected();

        let summary = StatsSnapshot::new(&stats, 0.0, 3.0).to_string();
        assert!(summary.contains("Total Requests: 4"));
        assert!(summary.contains("Rejection Rate: 25.00%"));
        assert!(summary.contains("Avg Wait Time: 0.0000s"));
        assert!(summary.contains("Current Tokens: 0.00/3"));
    }
}
