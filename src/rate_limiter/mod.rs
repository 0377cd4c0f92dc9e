//! # Rate Limiter Module
//!
//! Internal implementation, split by concern.
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs          (module organization)
//!     ├── clock.rs        (monotonic time sources)
//!     ├── config.rs       (bucket parameters and wait policy)
//!     ├── error.rs        (configuration and refusal errors)
//!     ├── core.rs         (token bucket, sync + async acquisition)
//!     ├── stats.rs        (counters and snapshots)
//!     ├── wrap.rs         (function adapters)
//!     └── registry.rs     (one bucket per key)
//! ```
//!
//! ## Dependency Flow
//!
//! ```text
//!     wrap ─────┐      registry
//!               ▼          │
//!     ┌──────────────┐     │
//!     │     core     │ ◄───┘
//!     └──┬───┬───┬───┘
//!        │   │   └──► stats
//!        │   └──────► config ──► error
//!        ▼
//!      clock
//! ```

mod clock;
mod config;
mod core;
mod error;
mod registry;
mod stats;
mod wrap;

/// Time sources
pub use clock::{Clock, ManualClock, MonotonicClock};

/// Bucket parameters and wait policy
pub use config::{AcquireOptions, BucketConfig, DEFAULT_WRAP_TIMEOUT};

/// The token bucket itself
pub use self::core::TokenBucket;

/// Error types
pub use error::{ConfigError, RateLimitExceeded};

/// Per-key bucket registry
pub use registry::KeyedLimiter;

/// Usage statistics
pub use stats::{RateLimiterStats, StatsSnapshot};

/// Function adapters
pub use wrap::{
    wrap, wrap_async, wrap_async_with, wrap_with, AsyncRateLimited, Invoke, InvokeAsync,
    RateLimited,
};
