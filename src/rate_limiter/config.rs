//! # Rate Limiter Configuration
//!
//! Two small value types live here:
//!
//! - [`BucketConfig`] describes a bucket: how fast tokens accrue and how many
//!   can be banked for a burst.
//! - [`AcquireOptions`] describes how a wrapped call waits for a token.
//!
//! ```text
//!     Token Bucket Configuration:
//!
//!     ┌──────────────────────────────┐
//!     │   Capacity (burst)           │ ← max banked tokens
//!     │   ┌─────────────────────┐    │
//!     │   │ 🪙 🪙 🪙 🪙 🪙     │    │ ← current tokens (fractional)
//!     │   └─────────────────────┘    │
//!     │                              │
//!     │   Rate: 5.0 tokens/second    │ ← continuous refill
//!     └──────────────────────────────┘
//! ```

use super::error::ConfigError;
use std::time::Duration;

/// Waiting budget the wrapping layer applies when none is configured.
pub const DEFAULT_WRAP_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters of a single token bucket.
///
/// Unlike interval-based refills, tokens accrue continuously: after `t`
/// seconds a bucket has gained `t * rate` tokens (capped at `capacity`).
///
/// # Example
///
/// ```rust
/// use tollbooth::BucketConfig;
///
/// // 10 calls per second, bursts of 10
/// let config = BucketConfig::per_second(10);
/// assert!(config.validate().is_ok());
///
/// // 600 calls per minute with a smaller burst
/// let config = BucketConfig::per_minute(600).with_burst(20.0);
/// assert_eq!(config.rate, 10.0);
/// assert_eq!(config.capacity, 20.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketConfig {
    /// Tokens added per second. Must be finite and greater than zero.
    pub rate: f64,

    /// Maximum number of banked tokens, also the initial level.
    /// Must be finite and at least one.
    pub capacity: f64,
}

impl Default for BucketConfig {
    /// 10 tokens per second with a burst of 10.
    fn default() -> Self {
        Self {
            rate: 10.0,
            capacity: 10.0,
        }
    }
}

impl BucketConfig {
    /// Creates a configuration from a rate (tokens/second) and a capacity.
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self { rate, capacity }
    }

    /// `n` tokens per second, burst of `n`.
    pub fn per_second(n: u32) -> Self {
        Self {
            rate: n as f64,
            capacity: n as f64,
        }
    }

    /// `n` tokens per minute, burst of `n`.
    pub fn per_minute(n: u32) -> Self {
        Self {
            rate: n as f64 / 60.0,
            capacity: n as f64,
        }
    }

    /// Replaces the burst capacity.
    pub fn with_burst(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Checks that the parameters describe a usable bucket.
    ///
    /// Invalid values are rejected, never clamped.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidRate`] if `rate` is not finite or `<= 0`
    /// - [`ConfigError::InvalidCapacity`] if `capacity` is not finite or `< 1`
    ///
    /// # Example
    ///
    /// ```rust
    /// use tollbooth::{BucketConfig, ConfigError};
    ///
    /// let config = BucketConfig::new(0.0, 10.0);
    /// assert_eq!(config.validate(), Err(ConfigError::InvalidRate(0.0)));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(ConfigError::InvalidRate(self.rate));
        }
        if !self.capacity.is_finite() || self.capacity < 1.0 {
            return Err(ConfigError::InvalidCapacity(self.capacity));
        }
        Ok(())
    }

    /// Time needed to accrue a single token.
    ///
    /// Saturates at [`Duration::MAX`] for a rate that fails validation.
    pub fn refill_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.rate).unwrap_or(Duration::MAX)
    }
}

/// How a wrapped call waits for a token.
///
/// The default waits up to [`DEFAULT_WRAP_TIMEOUT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Wait for a token (`true`) or fail immediately when none is banked.
    pub blocking: bool,

    /// Upper bound on waiting. `None` waits indefinitely. Ignored when
    /// `blocking` is false.
    pub timeout: Option<Duration>,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            blocking: true,
            timeout: Some(DEFAULT_WRAP_TIMEOUT),
        }
    }
}

impl AcquireOptions {
    /// Fail immediately when no token is banked.
    pub fn non_blocking() -> Self {
        Self {
            blocking: false,
            timeout: None,
        }
    }

    /// Wait without an upper bound.
    pub fn wait_forever() -> Self {
        Self {
            blocking: true,
            timeout: None,
        }
    }

    /// Wait up to `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            blocking: true,
            timeout: Some(timeout),
        }
    }
}
