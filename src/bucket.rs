//! One shard of the keyspace: mapping plus expiry heap.
//!
//! A bucket couples an `FxHashMap` from key to [`Element`] with an
//! [`IndexMinHeap`] over the mortal subset, ordered by `expire_at`. The
//! two structures mutate together inside a single critical section; the
//! facade wraps each bucket in its own lock.
//!
//! Mutating operations never invoke callbacks themselves. They hand the
//! removed elements back to the caller as `(element, reason)` batches,
//! to be fired once the bucket's lock has been released. That is what
//! keeps re-entrant callbacks from deadlocking the cache.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ds::IndexMinHeap;
use crate::element::{Callback, Element, Reason, NEVER};
#[cfg(any(test, debug_assertions))]
use crate::error::InvariantError;

/// Elements removed by a bucket operation, paired with why.
pub(crate) type Removals<V> = Vec<(Element<V>, Reason)>;

/// Fires the callbacks of a removal batch, consuming it.
///
/// Callers must have released the owning bucket's lock first.
pub(crate) fn fire_removals<V>(removals: Removals<V>) {
    for (element, reason) in removals {
        element.fire(reason);
    }
}

/// An independently locked shard: key mapping, expiry heap, bounds.
#[derive(Debug)]
pub(crate) struct Bucket<V> {
    map: FxHashMap<Arc<str>, Element<V>>,
    heap: IndexMinHeap<Arc<str>>,
    min_capacity: usize,
    /// Upper bound on entries; 0 disables capacity enforcement.
    max_capacity: usize,
}

impl<V> Bucket<V> {
    pub(crate) fn new(min_capacity: usize, max_capacity: usize) -> Self {
        Self {
            map: FxHashMap::default(),
            heap: IndexMinHeap::new(),
            min_capacity,
            max_capacity,
        }
    }

    /// Installs `value` under `key`, replacing any previous element.
    ///
    /// A replaced element is returned with reason [`Reason::Deleted`].
    /// Inserting a genuinely new key at capacity first evicts down to
    /// the bucket's floor, returning those with [`Reason::Overflow`].
    pub(crate) fn set(
        &mut self,
        key: Arc<str>,
        value: V,
        expire_at: i64,
        callback: Option<Callback<V>>,
    ) -> Removals<V> {
        let mut removals = Removals::new();

        if let Some(old) = self.map.remove(&key) {
            if old.is_mortal() {
                self.heap.remove(old.key_arc());
            }
            removals.push((old, Reason::Deleted));
        } else if self.max_capacity > 0 && self.map.len() >= self.max_capacity {
            self.evict_overflow(&mut removals);
        }

        let element = Element::new(key.clone(), value, expire_at, callback);
        if element.is_mortal() {
            self.heap.push(key.clone(), expire_at);
        }
        self.map.insert(key, element);
        removals
    }

    /// Returns the live value for `key`, if any.
    ///
    /// An expired-but-unswept element reports a miss; reclaiming it is
    /// left to the sweeper so lookups stay read-only.
    pub(crate) fn get(&self, key: &str, now_ms: i64) -> Option<&V> {
        self.map
            .get(key)
            .filter(|element| element.is_valid(now_ms))
            .map(Element::value)
    }

    /// Extends a live element to `expire_at` and re-heapifies it.
    ///
    /// Handles both mortality transitions: an immortal element gaining a
    /// TTL is pushed onto the heap, a mortal one losing its TTL is
    /// removed from it.
    pub(crate) fn refresh(&mut self, key: &str, expire_at: i64, now_ms: i64) -> Option<&V> {
        let element = self.map.get_mut(key)?;
        if !element.is_valid(now_ms) {
            return None;
        }

        let was_mortal = element.is_mortal();
        let key_arc = element.key_arc().clone();
        element.set_expire_at(expire_at);

        match (was_mortal, expire_at != NEVER) {
            (true, true) => {
                self.heap.update(&key_arc, expire_at);
            },
            (true, false) => {
                self.heap.remove(&key_arc);
            },
            (false, true) => self.heap.push(key_arc, expire_at),
            (false, false) => {},
        }

        self.map.get(key).map(Element::value)
    }

    /// Returns the existing live value, or installs the provided one.
    ///
    /// The boolean is `true` when the key already existed; in that case
    /// the provided value and callback are dropped unused. An existing
    /// but expired element counts as absent and is replaced.
    pub(crate) fn get_or_create(
        &mut self,
        key: Arc<str>,
        value: V,
        expire_at: i64,
        callback: Option<Callback<V>>,
        now_ms: i64,
    ) -> (V, bool, Removals<V>)
    where
        V: Clone,
    {
        if let Some(existing) = self.get(&key, now_ms) {
            return (existing.clone(), true, Removals::new());
        }
        let created = value.clone();
        let removals = self.set(key, value, expire_at, callback);
        (created, false, removals)
    }

    /// Removes `key`, returning the element with reason [`Reason::Deleted`].
    ///
    /// An expired-but-unswept element is still removed as `Deleted`; it
    /// never reached the sweeper, so its callback has not fired.
    pub(crate) fn delete(&mut self, key: &str) -> Option<(Element<V>, Reason)> {
        let element = self.map.remove(key)?;
        if element.is_mortal() {
            self.heap.remove(element.key_arc());
        }
        Some((element, Reason::Deleted))
    }

    /// Appends all live keys matching `prefix` to `out`.
    pub(crate) fn collect_keys(&self, prefix: &str, now_ms: i64, out: &mut Vec<String>) {
        for element in self.map.values() {
            if element.is_valid(now_ms) && element.key().starts_with(prefix) {
                out.push(element.key().to_string());
            }
        }
    }

    /// Counts live entries at `now_ms`.
    pub(crate) fn len(&self, now_ms: i64) -> usize {
        self.map
            .values()
            .filter(|element| element.is_valid(now_ms))
            .count()
    }

    /// Drops every entry without firing callbacks.
    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.heap.clear();
    }

    /// Removes up to `budget` expired elements, earliest first.
    ///
    /// Returns the removals (reason [`Reason::Expired`]) and whether the
    /// budget was exhausted, which signals a possible backlog.
    pub(crate) fn sweep(&mut self, now_ms: i64, budget: usize) -> (Removals<V>, bool) {
        let mut removals = Removals::new();
        while removals.len() < budget {
            let root_expired = self
                .heap
                .front()
                .map(|front| front.expire_at <= now_ms)
                .unwrap_or(false);
            if !root_expired {
                break;
            }
            let entry = self.heap.pop().expect("front was present");
            if let Some(element) = self.map.remove(&entry.key) {
                removals.push((element, Reason::Expired));
            }
        }
        let exhausted = budget > 0 && removals.len() == budget;
        (removals, exhausted)
    }

    /// Evicts down to the bucket's floor to make room for one insert.
    ///
    /// Mortal entries go first, earliest expiry first. Only once the
    /// heap is empty are immortal entries evicted, in map order.
    fn evict_overflow(&mut self, removals: &mut Removals<V>) {
        let target = if self.min_capacity == 0 {
            self.max_capacity - 1
        } else {
            self.min_capacity.min(self.max_capacity - 1)
        };

        while self.map.len() > target {
            match self.heap.pop() {
                Some(entry) => {
                    if let Some(element) = self.map.remove(&entry.key) {
                        removals.push((element, Reason::Overflow));
                    }
                },
                None => break,
            }
        }

        while self.map.len() > target {
            let victim = match self.map.keys().next() {
                Some(key) => key.clone(),
                None => break,
            };
            if let Some(element) = self.map.remove(&victim) {
                removals.push((element, Reason::Overflow));
            }
        }
    }

    #[cfg(any(test, debug_assertions))]
    /// Verifies mapping/heap agreement on top of the heap's own checks.
    pub(crate) fn check_invariants(&self) -> Result<(), InvariantError> {
        self.heap.check_invariants()?;
        let mortal = self.map.values().filter(|e| e.is_mortal()).count();
        if mortal != self.heap.len() {
            return Err(InvariantError::MortalCount {
                mapped: mortal,
                tracked: self.heap.len(),
            });
        }
        for element in self.map.values() {
            if element.is_mortal() != self.heap.contains(element.key_arc()) {
                return Err(InvariantError::MortalityMismatch {
                    key: element.key().to_string(),
                });
            }
        }
        Ok(())
    }
}
