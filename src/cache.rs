//! Cache facade: key routing, the public operation set, and sweeper
//! ownership.
//!
//! ## Architecture
//! - Keys route to one of `bucket_count` buckets (power of two) through
//!   [`ShardRouter`]; each bucket has its own `RwLock`.
//! - No operation holds more than one bucket lock; cross-bucket
//!   aggregates (`keys`, `len`, `clear`) visit buckets one at a time.
//! - Removal callbacks fire after the owning lock is released, so
//!   callbacks may re-enter the cache freely.
//! - A background sweeper reclaims expired entries in bounded batches;
//!   [`MemoryCache::stop`] cancels it and is idempotent.
//!
//! ## Example Usage
//! ```
//! use std::time::Duration;
//! use ttlkit::cache::MemoryCache;
//!
//! let cache: MemoryCache<String> = MemoryCache::new();
//! cache.set("session:1", "alice".to_string(), Some(Duration::from_secs(60)));
//! assert_eq!(cache.get("session:1"), Some("alice".to_string()));
//! assert_eq!(cache.get("session:2"), None);
//! cache.stop();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::bucket::{fire_removals, Bucket, Removals};
use crate::builder::{CacheBuilder, Config};
use crate::ds::ShardRouter;
use crate::element::{Callback, Reason, NEVER};
use crate::sweeper::Sweeper;

/// Milliseconds since the Unix epoch by the host clock.
pub(crate) fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Converts a TTL into an absolute expiry; `None` or zero means never.
fn expire_from(ttl: Option<Duration>) -> i64 {
    match ttl {
        Some(ttl) if !ttl.is_zero() => unix_ms().saturating_add(ttl.as_millis() as i64),
        _ => NEVER,
    }
}

// =============================================================================
// Metrics counters
// =============================================================================

/// Cache metrics counters using atomics for thread-safe updates.
#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    expirations: AtomicU64,
    overflows: AtomicU64,
}

impl CacheCounters {
    fn snapshot(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
        }
    }

    fn inc_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    fn add_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    fn add_overflows(&self, count: u64) {
        self.overflows.fetch_add(count, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of a cache's operation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Lookups that returned a live value.
    pub hits: u64,
    /// Lookups that found nothing live.
    pub misses: u64,
    /// Writes that created a new key.
    pub inserts: u64,
    /// Writes that replaced an existing key.
    pub updates: u64,
    /// Explicit deletes that removed something.
    pub removes: u64,
    /// Entries reclaimed by the sweeper.
    pub expirations: u64,
    /// Entries evicted by capacity pressure.
    pub overflows: u64,
}

// =============================================================================
// Cache facade
// =============================================================================

/// State shared between the public handle and the sweeper thread.
#[derive(Debug)]
struct Shared<V> {
    buckets: Vec<RwLock<Bucket<V>>>,
    router: ShardRouter,
    counters: CacheCounters,
}

/// Sharded in-process TTL cache.
///
/// Values are returned by clone; wrap large payloads in `Arc<T>` to
/// make that cheap. The cache is safe for concurrent use through a
/// shared reference (`Arc<MemoryCache<V>>` across threads).
///
/// Dropping the cache stops and joins the background sweeper.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ttlkit::builder::CacheBuilder;
///
/// let cache = CacheBuilder::new().bucket_count(4).build::<i32>();
///
/// cache.set("a", 1, Some(Duration::from_secs(60)));
/// cache.set("b", 2, None); // immortal
///
/// assert_eq!(cache.len(), 2);
/// assert!(cache.delete("a"));
/// assert!(!cache.delete("a"));
/// cache.stop();
/// ```
#[derive(Debug)]
pub struct MemoryCache<V> {
    shared: Arc<Shared<V>>,
    sweeper: Sweeper,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache with default configuration (16 buckets,
    /// unbounded capacity, 30 s sweep interval).
    pub fn new() -> Self {
        CacheBuilder::new().build()
    }

    pub(crate) fn with_config(config: Config) -> Self {
        let router = ShardRouter::new(config.bucket_count);
        let mut buckets = Vec::with_capacity(router.bucket_count());
        for _ in 0..router.bucket_count() {
            buckets.push(RwLock::new(Bucket::new(
                config.bucket_min_capacity,
                config.bucket_max_capacity,
            )));
        }

        let shared = Arc::new(Shared {
            buckets,
            router,
            counters: CacheCounters::default(),
        });

        let sweep_shared = Arc::clone(&shared);
        let budget = config.max_keys_deleted_per_round;
        let sweeper = Sweeper::spawn(config.sweep_interval, config.min_sweep_interval, move || {
            let mut backlog = false;
            for bucket in &sweep_shared.buckets {
                let now = unix_ms();
                let (removals, exhausted) = {
                    let mut bucket = bucket.write();
                    bucket.sweep(now, budget)
                };
                backlog |= exhausted;
                sweep_shared
                    .counters
                    .add_expirations(removals.len() as u64);
                fire_removals(removals);
            }
            backlog
        });

        Self { shared, sweeper }
    }

    fn shard(&self, key: &str) -> &RwLock<Bucket<V>> {
        &self.shared.buckets[self.shared.router.route(key)]
    }

    /// Stores `value` under `key`.
    ///
    /// `None` or a zero TTL makes the entry immortal. Replacing an
    /// existing key fires the old element's callback with
    /// [`Reason::Deleted`]; inserting a new key into a full bucket
    /// evicts with [`Reason::Overflow`] first.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        self.insert(key, value, ttl, None);
    }

    /// Like [`set`](Self::set), registering a removal callback.
    ///
    /// The callback fires exactly once, whenever the entry is removed:
    /// expired, deleted, replaced, or evicted.
    pub fn set_with_callback(&self, key: &str, value: V, ttl: Option<Duration>, callback: Callback<V>) {
        self.insert(key, value, ttl, Some(callback));
    }

    fn insert(&self, key: &str, value: V, ttl: Option<Duration>, callback: Option<Callback<V>>) {
        let expire_at = expire_from(ttl);
        let removals = {
            let mut bucket = self.shard(key).write();
            bucket.set(Arc::from(key), value, expire_at, callback)
        };
        self.record_write(&removals);
        fire_removals(removals);
    }

    /// Returns the live value for `key`.
    ///
    /// An expired entry reports a miss even before the sweeper has
    /// reclaimed it.
    ///
    /// # Example
    ///
    /// ```
    /// use ttlkit::cache::MemoryCache;
    ///
    /// let cache: MemoryCache<i32> = MemoryCache::new();
    /// cache.set("a", 1, None);
    /// assert_eq!(cache.get("a"), Some(1));
    /// assert_eq!(cache.get("b"), None);
    /// cache.stop();
    /// ```
    pub fn get(&self, key: &str) -> Option<V> {
        let now = unix_ms();
        let value = {
            let bucket = self.shard(key).read();
            bucket.get(key, now).cloned()
        };
        match value {
            Some(value) => {
                self.shared.counters.inc_hit();
                Some(value)
            },
            None => {
                self.shared.counters.inc_miss();
                None
            },
        }
    }

    /// Returns the live value for `key` and extends its TTL.
    ///
    /// The entry is rescheduled to `now + ttl`; `None` or a zero TTL
    /// makes it immortal from here on. Misses (absent or expired) leave
    /// nothing behind.
    pub fn get_with_ttl(&self, key: &str, ttl: Option<Duration>) -> Option<V> {
        let now = unix_ms();
        let expire_at = expire_from(ttl);
        let value = {
            let mut bucket = self.shard(key).write();
            bucket.refresh(key, expire_at, now).cloned()
        };
        match value {
            Some(value) => {
                self.shared.counters.inc_hit();
                Some(value)
            },
            None => {
                self.shared.counters.inc_miss();
                None
            },
        }
    }

    /// Returns the existing live value, or stores and returns `value`.
    ///
    /// The boolean is `true` when the key already existed.
    ///
    /// # Example
    ///
    /// ```
    /// use ttlkit::cache::MemoryCache;
    ///
    /// let cache: MemoryCache<i32> = MemoryCache::new();
    /// cache.set("ming", 1, None);
    ///
    /// assert_eq!(cache.get_or_create("ming", 2, None), (1, true));
    /// assert_eq!(cache.get_or_create("wang", 2, None), (2, false));
    /// cache.stop();
    /// ```
    pub fn get_or_create(&self, key: &str, value: V, ttl: Option<Duration>) -> (V, bool) {
        self.fetch_or_insert(key, value, ttl, None)
    }

    /// Like [`get_or_create`](Self::get_or_create), registering a
    /// removal callback when the entry is created.
    ///
    /// If the key already exists the callback is dropped unused.
    pub fn get_or_create_with_callback(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        callback: Callback<V>,
    ) -> (V, bool) {
        self.fetch_or_insert(key, value, ttl, Some(callback))
    }

    fn fetch_or_insert(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        callback: Option<Callback<V>>,
    ) -> (V, bool) {
        let now = unix_ms();
        let expire_at = expire_from(ttl);
        let (value, existed, removals) = {
            let mut bucket = self.shard(key).write();
            bucket.get_or_create(Arc::from(key), value, expire_at, callback, now)
        };
        if existed {
            self.shared.counters.inc_hit();
        } else {
            self.shared.counters.inc_miss();
            self.record_write(&removals);
        }
        fire_removals(removals);
        (value, existed)
    }

    /// Removes `key`, firing its callback with [`Reason::Deleted`].
    ///
    /// Returns whether anything was removed. An expired-but-unswept
    /// entry is still removed (and reported) as deleted.
    pub fn delete(&self, key: &str) -> bool {
        let removal = {
            let mut bucket = self.shard(key).write();
            bucket.delete(key)
        };
        match removal {
            Some((element, reason)) => {
                self.shared.counters.inc_remove();
                element.fire(reason);
                true
            },
            None => false,
        }
    }

    /// Returns all live keys starting with `prefix` (`""` for all).
    ///
    /// Buckets are visited one at a time; the listing is not a single
    /// atomic snapshot of the whole cache.
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        let now = unix_ms();
        let mut keys = Vec::new();
        for bucket in &self.shared.buckets {
            bucket.read().collect_keys(prefix, now, &mut keys);
        }
        keys
    }

    /// Counts live entries across all buckets.
    pub fn len(&self) -> usize {
        let now = unix_ms();
        self.shared
            .buckets
            .iter()
            .map(|bucket| bucket.read().len(now))
            .sum()
    }

    /// Returns `true` if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry without firing callbacks.
    pub fn clear(&self) {
        for bucket in &self.shared.buckets {
            bucket.write().clear();
        }
    }

    /// Cancels the background sweeper. Idempotent.
    ///
    /// In-flight operations complete normally and later operations keep
    /// working; expired entries simply stop being reclaimed in the
    /// background (lookups still report them as misses).
    pub fn stop(&self) {
        self.sweeper.stop();
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.sweeper.is_stopped()
    }

    /// Returns the number of buckets the keyspace is sharded into.
    pub fn bucket_count(&self) -> usize {
        self.shared.router.bucket_count()
    }

    /// Returns a snapshot of the cache's operation counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.shared.counters.snapshot()
    }

    fn record_write(&self, removals: &Removals<V>) {
        let counters = &self.shared.counters;
        if removals.iter().any(|(_, reason)| *reason == Reason::Deleted) {
            counters.inc_update();
        } else {
            counters.inc_insert();
        }
        let overflows = removals
            .iter()
            .filter(|(_, reason)| *reason == Reason::Overflow)
            .count();
        if overflows > 0 {
            counters.add_overflows(overflows as u64);
        }
    }
}

impl<V> Default for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_cache() -> MemoryCache<i32> {
        // Sweeping effectively disabled so tests control timing.
        CacheBuilder::new()
            .sweep_interval(Duration::from_secs(3600))
            .min_sweep_interval(Duration::from_secs(3600))
            .build()
    }

    #[test]
    fn set_get_roundtrip_across_buckets() {
        let cache = quiet_cache();
        for i in 0..200 {
            cache.set(&format!("key-{i}"), i, None);
        }
        for i in 0..200 {
            assert_eq!(cache.get(&format!("key-{i}")), Some(i));
        }
        assert_eq!(cache.len(), 200);
        assert_eq!(cache.bucket_count(), 16);
    }

    #[test]
    fn expired_entry_reports_miss_before_sweep() {
        let cache = quiet_cache();
        cache.set("a", 1, Some(Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn get_with_ttl_extends_lifetime() {
        let cache = quiet_cache();
        cache.set("a", 1, Some(Duration::from_millis(40)));
        assert_eq!(cache.get_with_ttl("a", Some(Duration::from_secs(60))), Some(1));
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get("a"), Some(1));

        assert_eq!(cache.get_with_ttl("missing", Some(Duration::from_secs(1))), None);
    }

    #[test]
    fn keys_and_len_aggregate_buckets() {
        let cache = quiet_cache();
        cache.set("user:1", 1, None);
        cache.set("user:2", 2, None);
        cache.set("job:1", 3, None);

        let mut users = cache.keys("user:");
        users.sort();
        assert_eq!(users, vec!["user:1", "user:2"]);
        assert_eq!(cache.keys("").len(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn clear_empties_everything_silently() {
        let cache = quiet_cache();
        for i in 0..50 {
            cache.set(&format!("k{i}"), i, None);
        }
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.keys(""), Vec::<String>::new());
    }

    #[test]
    fn metrics_count_operations() {
        let cache = quiet_cache();

        cache.set("a", 1, None); // insert
        cache.set("a", 2, None); // update
        cache.get("a"); // hit
        cache.get("b"); // miss
        cache.get_or_create("c", 3, None); // miss + insert
        cache.get_or_create("c", 4, None); // hit
        cache.delete("c"); // remove
        cache.delete("c"); // no-op

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 2);
        assert_eq!(metrics.misses, 2);
        assert_eq!(metrics.inserts, 2);
        assert_eq!(metrics.updates, 1);
        assert_eq!(metrics.removes, 1);
        assert_eq!(metrics.expirations, 0);
        assert_eq!(metrics.overflows, 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let cache = quiet_cache();
        assert!(!cache.is_stopped());
        cache.stop();
        cache.stop();
        assert!(cache.is_stopped());

        // The cache keeps serving without its sweeper.
        cache.set("a", 1, None);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn routing_is_stable_per_key() {
        let cache = quiet_cache();
        // Same key written twice must land in the same bucket: the
        // second write is observed as an update, not a second insert.
        cache.set("stable", 1, None);
        cache.set("stable", 2, None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.metrics().updates, 1);
    }
}
