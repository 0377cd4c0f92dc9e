//! # Time Sources (clock.rs)
//!
//! The bucket never looks at wall-clock time. Refill depends only on how much
//! monotonic time has passed since the previous refill, so a system clock that
//! jumps backwards (NTP, suspend/resume, manual changes) cannot mint or
//! destroy tokens.
//!
//! ```text
//!     Clock implementations:
//!
//!     MonotonicClock ──► std::time::Instant::now()     (production)
//!     ManualClock ─────► fixed origin + offset you move (tests)
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

/// A monotonic time source used to measure elapsed time between refills.
///
/// Implementations must never go backwards. The bucket tolerates a clock that
/// stands still (elapsed time saturates at zero) but not one that runs in
/// reverse.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The default clock, backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only advances when told to.
///
/// Useful for exercising refill arithmetic without sleeping. Refill reads
/// this clock, while wait deadlines are always measured in real time, so a
/// blocking call still honours its timeout when nobody advances the clock.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tollbooth::{ManualClock, TokenBucket};
///
/// let clock = Arc::new(ManualClock::new());
/// let bucket = TokenBucket::with_clock(2.0, 1.0, clock.clone()).unwrap();
///
/// assert!(bucket.try_acquire());
/// assert!(!bucket.try_acquire());
///
/// clock.advance(Duration::from_millis(500)); // one token at 2/s
/// assert!(bucket.try_acquire());
/// ```
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset = offset.saturating_add(by);
    }

    /// Total time this clock has been advanced.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    #[inline(always)]
    fn now(&self) -> Instant {
        (**self).now()
    }
}
