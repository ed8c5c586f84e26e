//! Cache entries and their removal lifecycle.
//!
//! An [`Element`] is one live entry: key, owned value, absolute expiry,
//! and an optional removal callback. Removal is the only lifecycle
//! event; the [`Reason`] says whether the entry aged out, was deleted
//! explicitly, or was pushed out by capacity pressure.

use std::fmt;
use std::sync::Arc;

/// Expiry sentinel for entries that never age out.
pub const NEVER: i64 = -1;

/// Why an element was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// The entry's TTL elapsed and the sweeper (or a write) reclaimed it.
    Expired,
    /// The entry was removed by an explicit delete or replaced by a new
    /// value for the same key.
    Deleted,
    /// The entry was evicted to bring its bucket back under capacity.
    Overflow,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Expired => f.write_str("expired"),
            Reason::Deleted => f.write_str("deleted"),
            Reason::Overflow => f.write_str("overflow"),
        }
    }
}

/// Removal notification, consumed when its element is removed.
///
/// The callback receives the removed element, whose key, value, and
/// expiry stay readable for the duration of the call. It runs at most
/// once per element lifetime, always after the owning bucket's lock has
/// been released, so it may safely re-enter the cache. Captures must be
/// `Send + Sync` because the element lives inside shared bucket state.
///
/// The cache does not observe panics: a panicking callback unwinds on
/// whichever thread invoked it, and on the sweeper thread that ends
/// background sweeping.
pub type Callback<V> = Box<dyn FnOnce(&Element<V>, Reason) + Send + Sync + 'static>;

/// A single cache entry.
pub struct Element<V> {
    key: Arc<str>,
    value: V,
    expire_at: i64,
    callback: Option<Callback<V>>,
}

impl<V> Element<V> {
    pub(crate) fn new(key: Arc<str>, value: V, expire_at: i64, callback: Option<Callback<V>>) -> Self {
        Self {
            key,
            value,
            expire_at,
            callback,
        }
    }

    /// The entry's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The entry's value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Absolute expiry in milliseconds since the Unix epoch, or
    /// [`NEVER`] for an immortal entry.
    pub fn expire_at(&self) -> i64 {
        self.expire_at
    }

    /// Returns `true` if the entry is live at `now_ms`.
    pub(crate) fn is_valid(&self, now_ms: i64) -> bool {
        self.expire_at == NEVER || self.expire_at > now_ms
    }

    /// Returns `true` if the entry is tracked by the expiry heap.
    pub(crate) fn is_mortal(&self) -> bool {
        self.expire_at != NEVER
    }

    pub(crate) fn key_arc(&self) -> &Arc<str> {
        &self.key
    }

    pub(crate) fn set_expire_at(&mut self, expire_at: i64) {
        self.expire_at = expire_at;
    }

    /// Consumes and fires the element's callback, if one is attached.
    ///
    /// Must only be called after the owning bucket's lock is released.
    pub(crate) fn fire(mut self, reason: Reason) {
        if let Some(callback) = self.callback.take() {
            callback(&self, reason);
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Element<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("expire_at", &self.expire_at)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
