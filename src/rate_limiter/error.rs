//! Error types.
//!
//! Only two kinds of error originate here. Misconfiguration fails fast at
//! construction; rejection is a plain `false` at the bucket level and only
//! becomes [`RateLimitExceeded`] in the wrapping layer. Errors produced by a
//! wrapped function are never converted or wrapped.

use std::time::Duration;
use thiserror::Error;

/// Invalid bucket parameters, reported at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    /// The refill rate must be a finite number of tokens per second above zero.
    #[error("invalid rate {0}: must be a finite value greater than 0 tokens/second")]
    InvalidRate(f64),

    /// The capacity must be a finite number of at least one token.
    #[error("invalid capacity {0}: must be a finite value of at least 1 token")]
    InvalidCapacity(f64),
}

/// A wrapped call was refused because no token became available in time.
///
/// The wrapped function was not invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "rate limit exceeded for {name}{}, retry after {retry_after:?}",
    format_timeout(.timeout)
)]
pub struct RateLimitExceeded {
    /// Name of the wrapped function.
    pub name: String,
    /// The waiting budget that was applied, if any.
    pub timeout: Option<Duration>,
    /// How long until the bucket had a whole token again, measured when the
    /// call was refused.
    pub retry_after: Duration,
}

fn format_timeout(timeout: &Option<Duration>) -> String {
    match timeout {
        Some(t) => format!(" (waited up to {:?})", t),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::InvalidRate(0.0).to_string(),
            "invalid rate 0: must be a finite value greater than 0 tokens/second"
        );
        assert!(ConfigError::InvalidCapacity(0.5)
            .to_string()
            .contains("capacity 0.5"));
    }

    #[test]
    fn test_rate_limit_exceeded_message() {
        let err = RateLimitExceeded {
            name: "fetch_page".into(),
            timeout: Some(Duration::from_millis(100)),
            retry_after: Duration::from_millis(400),
        };
        assert_eq!(
            err.to_string(),
            "rate limit exceeded for fetch_page (waited up to 100ms), retry after 400ms"
        );

        let err = RateLimitExceeded {
            name: "fetch_page".into(),
            timeout: None,
            retry_after: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "rate limit exceeded for fetch_page, retry after 250ms"
        );
    }
}
