// ==============================================
// OVERFLOW EVICTION TESTS (integration)
// ==============================================
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ttlkit::builder::CacheBuilder;
use ttlkit::cache::MemoryCache;
use ttlkit::element::Reason;

fn bounded_cache(min: usize, max: usize) -> MemoryCache<i32> {
    CacheBuilder::new()
        .bucket_count(1)
        .bucket_capacity(min, max)
        .sweep_interval(Duration::from_secs(3600))
        .min_sweep_interval(Duration::from_secs(3600))
        .build()
}

#[test]
fn test_overflow_evicts_earliest_expiring_entry() {
    let cache = bounded_cache(0, 2);
    cache.set("ming", 1, Some(Duration::from_secs(3 * 3600)));
    cache.set("hong", 1, Some(Duration::from_secs(3600)));
    cache.set("feng", 1, Some(Duration::from_secs(2 * 3600)));

    let mut keys = cache.keys("");
    keys.sort();
    assert_eq!(keys, vec!["feng", "ming"]);
}

#[test]
fn test_overflow_fires_callback_with_overflow_reason() {
    let fired = Arc::new(AtomicUsize::new(0));
    let cache = bounded_cache(0, 2);

    let counter = Arc::clone(&fired);
    cache.set_with_callback(
        "hong",
        1,
        Some(Duration::from_secs(3600)),
        Box::new(move |element, reason| {
            assert_eq!(reason, Reason::Overflow);
            assert_eq!(element.key(), "hong");
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    cache.set("ming", 1, Some(Duration::from_secs(3 * 3600)));
    cache.set("feng", 1, Some(Duration::from_secs(2 * 3600)));

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(cache.metrics().overflows, 1);
}

#[test]
fn test_overflow_cap_under_load() {
    // 1000 immortal inserts into a (10, 100) bucket: ten eviction
    // cycles of 90, leaving exactly 100 entries and 900 callbacks.
    let fired = Arc::new(AtomicUsize::new(0));
    let cache = bounded_cache(10, 100);

    for i in 0..1000 {
        let counter = Arc::clone(&fired);
        cache.set_with_callback(
            &format!("key-{i:04}"),
            i,
            None,
            Box::new(move |_, reason| {
                assert_eq!(reason, Reason::Overflow);
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
    }

    assert_eq!(cache.len(), 100);
    assert_eq!(fired.load(Ordering::SeqCst), 900);
    assert_eq!(cache.metrics().overflows, 900);
}

#[test]
fn test_overflow_prefers_mortal_entries() {
    let cache = bounded_cache(0, 3);
    cache.set("immortal-1", 1, None);
    cache.set("immortal-2", 2, None);
    cache.set("mortal", 3, Some(Duration::from_secs(3600)));
    cache.set("fresh", 4, None);

    // The lone mortal entry goes first even though the immortals are older.
    assert_eq!(cache.get("mortal"), None);
    assert_eq!(cache.get("immortal-1"), Some(1));
    assert_eq!(cache.get("immortal-2"), Some(2));
    assert_eq!(cache.get("fresh"), Some(4));
}

#[test]
fn test_replacing_a_key_does_not_trigger_eviction() {
    let cache = bounded_cache(0, 2);
    cache.set("a", 1, None);
    cache.set("b", 2, None);

    // "a" already exists, so the bucket is not over capacity.
    cache.set("a", 10, None);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("a"), Some(10));
    assert_eq!(cache.get("b"), Some(2));
    assert_eq!(cache.metrics().overflows, 0);
}

#[test]
fn test_get_or_create_respects_capacity() {
    let cache = bounded_cache(0, 1);
    cache.set("ming", 1, None);

    let (value, existed) = cache.get_or_create("wang", 2, Some(Duration::from_secs(1)));
    assert_eq!(value, 2);
    assert!(!existed);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("wang"), Some(2));
    assert_eq!(cache.get("ming"), None);
}

#[test]
fn test_unbounded_bucket_never_evicts() {
    let cache = bounded_cache(0, 0);
    for i in 0..5_000 {
        cache.set(&format!("key-{i}"), i, None);
    }
    assert_eq!(cache.len(), 5_000);
    assert_eq!(cache.metrics().overflows, 0);
}
