//! # Per-Key Buckets
//!
//! A registry that hands out one [`TokenBucket`] per key (API key, tenant,
//! client address) from a shared [`BucketConfig`].
//!
//! ```text
//!     "key-a" ──┐                 ┌──────────────────────┐
//!     "key-b" ──┼──► KeyedLimiter │ DashMap<K, Arc<TB>>  │
//!     "key-c" ──┘                 │  key-a → bucket      │
//!                                 │  key-b → bucket      │
//!                                 │  key-c → bucket      │
//!                                 └──────────────────────┘
//! ```
//!
//! Buckets are created on first use and kept for the life of the registry;
//! every caller using a key sees the same bucket for as long as the key is
//! in use.

use super::{
    clock::MonotonicClock,
    config::BucketConfig,
    core::TokenBucket,
    error::ConfigError,
    stats::StatsSnapshot,
};
use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Upper bound on DashMap shards.
const MAX_SHARDS: usize = 64;

/// Lazily created token buckets, one per key, all with the same parameters.
///
/// # Example
///
/// ```rust
/// use tollbooth::{BucketConfig, KeyedLimiter};
///
/// let limiter = KeyedLimiter::new(BucketConfig::per_second(2)).unwrap();
///
/// assert!(limiter.try_acquire(&"alice"));
/// assert!(limiter.try_acquire(&"alice"));
/// assert!(!limiter.try_acquire(&"alice"));
///
/// // Other keys have their own budget
/// assert!(limiter.try_acquire(&"bob"));
/// assert_eq!(limiter.len(), 2);
/// ```
pub struct KeyedLimiter<K>
where
    K: Eq + Hash,
{
    buckets: DashMap<K, Arc<TokenBucket>, ahash::RandomState>,
    config: BucketConfig,
}

impl<K> KeyedLimiter<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty registry whose buckets all use `config`.
    ///
    /// # Errors
    ///
    /// The configuration is validated once here, so later bucket creation
    /// cannot fail.
    pub fn new(config: BucketConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        // Shard count tracks available cores, rounded to a power of two
        let shards = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(2, MAX_SHARDS);

        Ok(Self {
            buckets: DashMap::with_hasher_and_shard_amount(ahash::RandomState::new(), shards),
            config,
        })
    }

    /// Parameters shared by every bucket in the registry.
    pub fn config(&self) -> BucketConfig {
        self.config
    }

    /// Returns the bucket for `key`, creating a full one on first use.
    pub fn bucket(&self, key: &K) -> Arc<TokenBucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return bucket.clone();
        }

        self.buckets
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(
                    "Created bucket for new key ({:.2} tokens/s, burst {})",
                    self.config.rate, self.config.capacity
                );
                Arc::new(TokenBucket::from_validated(self.config, MonotonicClock))
            })
            .clone()
    }

    /// Non-blocking acquisition for `key`.
    pub fn try_acquire(&self, key: &K) -> bool {
        self.bucket(key).try_acquire()
    }

    /// Blocking or non-blocking acquisition for `key`; see
    /// [`TokenBucket::acquire`].
    pub fn acquire(&self, key: &K, blocking: bool, timeout: Option<Duration>) -> bool {
        self.bucket(key).acquire(blocking, timeout)
    }

    /// Async acquisition for `key`; see [`TokenBucket::acquire_async`].
    ///
    /// The map entry is released before waiting, so other keys (and other
    /// callers of this key) are never held up by this task.
    pub async fn acquire_async(&self, key: &K, timeout: Option<Duration>) -> bool {
        let bucket = self.bucket(key);
        bucket.acquire_async(timeout).await
    }

    /// Statistics for `key`, or `None` if the key has never been used.
    pub fn stats(&self, key: &K) -> Option<StatsSnapshot> {
        let bucket = self.buckets.get(key)?.clone();
        Some(bucket.stats())
    }

    /// Statistics for every key seen so far.
    pub fn all_stats(&self) -> Vec<(K, StatsSnapshot)> {
        let buckets: Vec<(K, Arc<TokenBucket>)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        buckets
            .into_iter()
            .map(|(key, bucket)| (key, bucket.stats()))
            .collect()
    }

    /// Number of keys with a bucket.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no key has been used yet.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl<K> fmt::Debug for KeyedLimiter<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLimiter")
            .field("config", &self.config)
            .field("keys", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_rejects_invalid_config() {
        let result = KeyedLimiter::<u32>::new(BucketConfig::new(1.0, 0.0));
        assert_eq!(result.unwrap_err(), ConfigError::InvalidCapacity(0.0));
    }

    #[test]
    fn test_keys_are_isolated() {
        let limiter = KeyedLimiter::new(BucketConfig::new(1.0, 3.0)).unwrap();

        for _ in 0..3 {
            assert!(limiter.try_acquire(&"tenant-a"));
        }
        assert!(!limiter.try_acquire(&"tenant-a"));
        assert!(limiter.try_acquire(&"tenant-b"));

        let a = limiter.stats(&"tenant-a").unwrap();
        assert_eq!(a.allowed, 3);
        assert_eq!(a.rejected, 1);

        let b = limiter.stats(&"tenant-b").unwrap();
        assert_eq!(b.allowed, 1);
        assert_eq!(b.rejected, 0);
    }

    #[test]
    fn test_same_key_returns_same_bucket() {
        let limiter = KeyedLimiter::new(BucketConfig::default()).unwrap();
        let first = limiter.bucket(&7u64);
        let second = limiter.bucket(&7u64);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_unknown_key_has_no_stats() {
        let limiter: KeyedLimiter<String> = KeyedLimiter::new(BucketConfig::default()).unwrap();
        assert!(limiter.is_empty());
        assert!(limiter.stats(&"nobody".to_string()).is_none());
        // Looking up stats does not create a bucket
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_concurrent_first_use_creates_one_bucket() {
        let limiter = Arc::new(KeyedLimiter::new(BucketConfig::new(1.0, 16.0)).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || limiter.try_acquire(&"shared"))
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(allowed, 16);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.stats(&"shared").unwrap().total_requests, 16);
    }

    #[test]
    fn test_all_stats() {
        let limiter = KeyedLimiter::new(BucketConfig::per_second(5)).unwrap();
        for key in 0..4u32 {
            for _ in 0..=key {
                limiter.try_acquire(&key);
            }
        }

        let mut all = limiter.all_stats();
        all.sort_by_key(|(key, _)| *key);
        assert_eq!(all.len(), 4);
        for (key, stats) in all {
            assert_eq!(stats.total_requests, key as u64 + 1);
        }
    }

    #[tokio::test]
    async fn test_async_acquire_per_key() {
        let limiter = KeyedLimiter::new(BucketConfig::new(50.0, 1.0)).unwrap();
        assert!(limiter.acquire_async(&1u8, None).await);
        assert!(limiter.acquire_async(&1u8, Some(Duration::from_secs(1))).await);
        assert!(!limiter.acquire(&1u8, false, None));
        assert_eq!(limiter.stats(&1u8).unwrap().allowed, 2);
    }
}
