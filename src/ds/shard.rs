//! Key-to-bucket routing for the sharded cache.
//!
//! Provides deterministic key-to-bucket mapping used by the cache facade
//! to pick which independently locked bucket owns a key.
//!
//! ```text
//!   Input Key ──► FxHasher ──► 64-bit hash ──► hash & (buckets - 1)
//!
//!   ┌──────────┬──────────┬──────────┬──────────┐
//!   │ Bucket 0 │ Bucket 1 │ Bucket 2 │ Bucket 3 │
//!   └──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! Properties
//! ──────────
//! • Deterministic: the same key always routes to the same bucket
//! • Power of two: the bucket count is rounded up at construction, so
//!   routing is a mask of the hash's low bits
//! • Uniform: relies on `FxHasher` for even spread over the low bits
//!
//! ## Example Usage
//!
//! ```
//! use ttlkit::ds::ShardRouter;
//!
//! let router = ShardRouter::new(12); // rounded up to 16
//! assert_eq!(router.bucket_count(), 16);
//!
//! let b = router.route("user:123");
//! assert!(b < 16);
//! assert_eq!(router.route("user:123"), b);
//! ```

use std::hash::Hasher;

use rustc_hash::FxHasher;

/// Deterministic router mapping keys onto a power-of-two bucket range.
///
/// The bucket index is the low bits of a 64-bit key hash, so
/// `route(key)` is a pure function of the key and the bucket count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRouter {
    buckets: usize,
    mask: u64,
}

impl ShardRouter {
    /// Creates a router for `buckets` buckets.
    ///
    /// The count is clamped to at least 1 and rounded up to the next
    /// power of two.
    ///
    /// # Example
    ///
    /// ```
    /// use ttlkit::ds::ShardRouter;
    ///
    /// assert_eq!(ShardRouter::new(16).bucket_count(), 16);
    /// assert_eq!(ShardRouter::new(3).bucket_count(), 4);
    /// assert_eq!(ShardRouter::new(0).bucket_count(), 1);
    /// ```
    pub fn new(buckets: usize) -> Self {
        let buckets = buckets.max(1).next_power_of_two();
        Self {
            buckets,
            mask: buckets as u64 - 1,
        }
    }

    /// Returns the number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets
    }

    /// Maps a key to a bucket index in `[0, bucket_count)`.
    pub fn route(&self, key: &str) -> usize {
        let mut hasher = FxHasher::default();
        hasher.write(key.as_bytes());
        (hasher.finish() & self.mask) as usize
    }
}

impl Default for ShardRouter {
    /// Creates a single-bucket router.
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_is_deterministic() {
        let router = ShardRouter::new(8);
        let a = router.route("key");
        let b = router.route("key");
        assert_eq!(a, b);
        assert!(a < router.bucket_count());
    }

    #[test]
    fn router_rounds_up_to_power_of_two() {
        assert_eq!(ShardRouter::new(1).bucket_count(), 1);
        assert_eq!(ShardRouter::new(2).bucket_count(), 2);
        assert_eq!(ShardRouter::new(5).bucket_count(), 8);
        assert_eq!(ShardRouter::new(64).bucket_count(), 64);
        assert_eq!(ShardRouter::new(100).bucket_count(), 128);
    }
}
