//! Indexed min-heap ordered by expiration timestamp.
//!
//! Array-backed binary heap plus an `index` map from key to heap slot,
//! kept exact by every swap. Unlike a lazy heap there are never stale
//! entries: removing or rescheduling a key touches its slot in place.
//!
//! ## Architecture
//!
//! ```text
//!   entries (heap order on expire_at)      index (authoritative slots)
//!   [ (a,100) (c,300) (b,500) (d,900) ]    { a:0, c:1, b:2, d:3 }
//!
//!   remove("c"): swap slot 1 with last, shrink, re-heapify at 1
//! ```
//!
//! ## Operations
//! - `push(k, ts)`: append and sift up
//! - `pop()`: remove and return the earliest entry
//! - `remove(k)`: delete by key through the index
//! - `update(k, ts)`: reschedule in place and re-heapify
//!
//! All mutating operations are O(log n); `front` and membership checks
//! are O(1). Ties on `expire_at` keep their prior relative position.
//!
//! `check_invariants()` is available in debug/test builds.

use std::hash::Hash;

use rustc_hash::FxHashMap;

#[cfg(any(test, debug_assertions))]
use crate::error::InvariantError;

/// One heap slot: a key and its absolute expiry in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapEntry<K> {
    pub key: K,
    pub expire_at: i64,
}

/// Min-heap on `expire_at` with O(log n) removal and update by key.
#[derive(Debug)]
pub struct IndexMinHeap<K> {
    entries: Vec<HeapEntry<K>>,
    index: FxHashMap<K, usize>,
}

impl<K> IndexMinHeap<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Creates an empty heap with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut index = FxHashMap::default();
        index.reserve(capacity);
        Self {
            entries: Vec::with_capacity(capacity),
            index,
        }
    }

    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `key` has a slot in the heap.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the earliest-expiring entry without removing it.
    pub fn front(&self) -> Option<&HeapEntry<K>> {
        self.entries.first()
    }

    /// Inserts `key` with the given expiry.
    ///
    /// The key must not already be tracked; use [`update`](Self::update)
    /// to reschedule an existing key.
    pub fn push(&mut self, key: K, expire_at: i64) {
        debug_assert!(!self.index.contains_key(&key), "key already in heap");
        let slot = self.entries.len();
        self.index.insert(key.clone(), slot);
        self.entries.push(HeapEntry { key, expire_at });
        self.sift_up(slot);
    }

    /// Removes and returns the earliest-expiring entry.
    pub fn pop(&mut self) -> Option<HeapEntry<K>> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap_slots(0, last);
        let entry = self.entries.pop().expect("checked non-empty");
        self.index.remove(&entry.key);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some(entry)
    }

    /// Removes `key` from the heap. Returns `false` if it was not tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.get(key).copied() {
            Some(slot) => {
                self.delete_at(slot);
                true
            },
            None => false,
        }
    }

    /// Reschedules `key` to a new expiry and re-heapifies its slot.
    ///
    /// Returns `false` if the key was not tracked.
    pub fn update(&mut self, key: &K, expire_at: i64) -> bool {
        match self.index.get(key).copied() {
            Some(slot) => {
                self.entries[slot].expire_at = expire_at;
                self.sift_down(slot);
                self.sift_up(slot);
                true
            },
            None => false,
        }
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Removes the entry at `slot` by swapping in the last entry and
    /// re-heapifying: sift down first, then up in case the replacement
    /// is smaller than its parent.
    fn delete_at(&mut self, slot: usize) {
        let last = self.entries.len() - 1;
        self.swap_slots(slot, last);
        let entry = self.entries.pop().expect("slot came from index");
        self.index.remove(&entry.key);
        if slot < self.entries.len() {
            self.sift_down(slot);
            self.sift_up(slot);
        }
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.entries[slot].expire_at < self.entries[parent].expire_at {
                self.swap_slots(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.entries.len();
        loop {
            let left = slot * 2 + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = slot;
            if self.entries[left].expire_at < self.entries[smallest].expire_at {
                smallest = left;
            }
            if right < len && self.entries[right].expire_at < self.entries[smallest].expire_at {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap_slots(slot, smallest);
            slot = smallest;
        }
    }

    /// Swaps two slots and keeps the index table exact.
    fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        self.index.insert(self.entries[a].key.clone(), a);
        self.index.insert(self.entries[b].key.clone(), b);
    }

    #[cfg(any(test, debug_assertions))]
    /// Verifies the heap property and index consistency.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.entries.len() != self.index.len() {
            return Err(InvariantError::LengthMismatch {
                entries: self.entries.len(),
                indexed: self.index.len(),
            });
        }
        for (slot, entry) in self.entries.iter().enumerate() {
            match self.index.get(&entry.key) {
                Some(&indexed) if indexed == slot => {},
                Some(&indexed) => return Err(InvariantError::SlotMismatch { slot, indexed }),
                None => return Err(InvariantError::MissingIndex { slot }),
            }
            let left = slot * 2 + 1;
            let right = left + 1;
            if left < self.entries.len() && self.entries[left].expire_at < entry.expire_at {
                return Err(InvariantError::HeapOrder { parent: slot, child: left });
            }
            if right < self.entries.len() && self.entries[right].expire_at < entry.expire_at {
                return Err(InvariantError::HeapOrder { parent: slot, child: right });
            }
        }
        Ok(())
    }
}

impl<K> Default for IndexMinHeap<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Push(u8, i64),
        Pop,
        Remove(u8),
        Update(u8, i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<u8>(), 0i64..10_000).prop_map(|(k, ts)| Op::Push(k, ts)),
            Just(Op::Pop),
            any::<u8>().prop_map(Op::Remove),
            (any::<u8>(), 0i64..10_000).prop_map(|(k, ts)| Op::Update(k, ts)),
        ]
    }

    proptest! {
        /// Property: heap + index invariants survive arbitrary op sequences.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_invariants_hold(ops in prop::collection::vec(op_strategy(), 0..200)) {
            let mut heap: IndexMinHeap<u8> = IndexMinHeap::new();
            for op in ops {
                match op {
                    Op::Push(key, ts) => {
                        if !heap.contains(&key) {
                            heap.push(key, ts);
                        }
                    },
                    Op::Pop => {
                        heap.pop();
                    },
                    Op::Remove(key) => {
                        heap.remove(&key);
                    },
                    Op::Update(key, ts) => {
                        heap.update(&key, ts);
                    },
                }
                heap.check_invariants().unwrap();
            }
        }

        /// Property: draining the heap yields non-decreasing expiries.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_pop_order_monotone(expiries in prop::collection::vec(0i64..100_000, 0..100)) {
            let mut heap = IndexMinHeap::new();
            for (i, ts) in expiries.iter().enumerate() {
                heap.push(i as u32, *ts);
            }

            let mut previous = i64::MIN;
            while let Some(entry) = heap.pop() {
                prop_assert!(entry.expire_at >= previous);
                previous = entry.expire_at;
            }
            prop_assert!(heap.is_empty());
        }

        /// Property: removed keys are gone, untouched keys survive.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_remove_is_exact(
            keys in prop::collection::hash_set(any::<u16>(), 1..50),
            victims in prop::collection::vec(any::<u16>(), 0..20)
        ) {
            let mut heap = IndexMinHeap::new();
            for &key in &keys {
                heap.push(key, key as i64);
            }
            for victim in &victims {
                heap.remove(victim);
            }
            for &key in &keys {
                let removed = victims.contains(&key);
                prop_assert_eq!(heap.contains(&key), !removed);
            }
            heap.check_invariants().unwrap();
        }
    }
}
