//! Cache configuration and construction.
//!
//! [`CacheBuilder`] is the option surface: bucket count, per-bucket
//! capacity bounds, sweep timing, and the per-round deletion budget.
//! [`build`](CacheBuilder::build) normalizes every input and cannot
//! fail; [`try_build`](CacheBuilder::try_build) instead rejects
//! contradictory inputs with a [`ConfigError`] for callers that want
//! loud configuration failures.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use ttlkit::builder::CacheBuilder;
//!
//! let cache = CacheBuilder::new()
//!     .bucket_count(8)
//!     .bucket_capacity(100, 1_000)
//!     .sweep_interval(Duration::from_secs(10))
//!     .build::<String>();
//!
//! assert_eq!(cache.bucket_count(), 8);
//! cache.stop();
//! ```

use std::time::Duration;

use crate::cache::MemoryCache;
use crate::error::ConfigError;

/// Default number of buckets the keyspace is sharded into.
pub const DEFAULT_BUCKET_COUNT: usize = 16;

/// Default base interval between sweep rounds.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Default reduced interval after a budget-exhausting round.
pub const DEFAULT_MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Default per-bucket deletion budget per sweep round.
pub const DEFAULT_MAX_KEYS_DELETED_PER_ROUND: usize = 100;

/// Normalized configuration handed to the cache constructor.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub bucket_count: usize,
    pub bucket_min_capacity: usize,
    pub bucket_max_capacity: usize,
    pub sweep_interval: Duration,
    pub min_sweep_interval: Duration,
    pub max_keys_deleted_per_round: usize,
}

/// Builder for [`MemoryCache`] instances.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    bucket_count: usize,
    bucket_min_capacity: usize,
    bucket_max_capacity: usize,
    sweep_interval: Duration,
    min_sweep_interval: Duration,
    max_keys_deleted_per_round: usize,
}

impl CacheBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
            bucket_min_capacity: 0,
            bucket_max_capacity: 0,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            min_sweep_interval: DEFAULT_MIN_SWEEP_INTERVAL,
            max_keys_deleted_per_round: DEFAULT_MAX_KEYS_DELETED_PER_ROUND,
        }
    }

    /// Sets the number of buckets.
    ///
    /// Zero falls back to the default; other values are rounded up to
    /// the next power of two at construction.
    pub fn bucket_count(mut self, count: usize) -> Self {
        self.bucket_count = count;
        self
    }

    /// Sets per-bucket capacity bounds.
    ///
    /// `max == 0` disables capacity enforcement. When a bucket reaches
    /// `max` entries it evicts down to `min` (or to `max - 1` when
    /// `min` is zero) before inserting.
    pub fn bucket_capacity(mut self, min: usize, max: usize) -> Self {
        self.bucket_min_capacity = min;
        self.bucket_max_capacity = max;
        self
    }

    /// Sets the base interval between sweep rounds.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the reduced interval used after a round that exhausted its
    /// deletion budget, so the sweeper catches up on a backlog without
    /// ever running more often than this.
    pub fn min_sweep_interval(mut self, interval: Duration) -> Self {
        self.min_sweep_interval = interval;
        self
    }

    /// Sets the per-bucket deletion budget per sweep round.
    ///
    /// The budget bounds how long a bucket's lock is held by the
    /// sweeper. Zero falls back to the default.
    pub fn max_keys_deleted_per_round(mut self, budget: usize) -> Self {
        self.max_keys_deleted_per_round = budget;
        self
    }

    /// Builds the cache, normalizing every input. Never fails.
    pub fn build<V>(self) -> MemoryCache<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        MemoryCache::with_config(self.normalize())
    }

    /// Builds the cache, rejecting contradictory inputs.
    ///
    /// A zero `bucket_count` is still normalized (not rejected); errors
    /// are reserved for inputs that contradict each other or disable
    /// the sweeper outright.
    pub fn try_build<V>(self) -> Result<MemoryCache<V>, ConfigError>
    where
        V: Clone + Send + Sync + 'static,
    {
        if self.bucket_max_capacity > 0 && self.bucket_min_capacity > self.bucket_max_capacity {
            return Err(ConfigError::CapacityBounds {
                min: self.bucket_min_capacity,
                max: self.bucket_max_capacity,
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::ZeroSweepInterval);
        }
        if self.min_sweep_interval.is_zero() {
            return Err(ConfigError::ZeroMinSweepInterval);
        }
        if self.min_sweep_interval > self.sweep_interval {
            return Err(ConfigError::IntervalOrder);
        }
        if self.max_keys_deleted_per_round == 0 {
            return Err(ConfigError::ZeroDeletionBudget);
        }
        Ok(MemoryCache::with_config(self.normalize()))
    }

    fn normalize(self) -> Config {
        let bucket_count = if self.bucket_count == 0 {
            DEFAULT_BUCKET_COUNT
        } else {
            self.bucket_count
        };
        let bucket_max_capacity = self.bucket_max_capacity;
        let bucket_min_capacity = if bucket_max_capacity > 0 {
            self.bucket_min_capacity.min(bucket_max_capacity)
        } else {
            self.bucket_min_capacity
        };
        let sweep_interval = if self.sweep_interval.is_zero() {
            DEFAULT_SWEEP_INTERVAL
        } else {
            self.sweep_interval
        };
        let min_sweep_interval = if self.min_sweep_interval.is_zero() {
            DEFAULT_MIN_SWEEP_INTERVAL
        } else {
            self.min_sweep_interval
        }
        .min(sweep_interval);
        let max_keys_deleted_per_round = if self.max_keys_deleted_per_round == 0 {
            DEFAULT_MAX_KEYS_DELETED_PER_ROUND
        } else {
            self.max_keys_deleted_per_round
        };

        Config {
            bucket_count,
            bucket_min_capacity,
            bucket_max_capacity,
            sweep_interval,
            min_sweep_interval,
            max_keys_deleted_per_round,
        }
    }
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}
