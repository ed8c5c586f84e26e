//! ttlkit: sharded in-process TTL cache with expiry-ordered eviction
//! and lifecycle callbacks.
//!
//! Keys hash to independently locked buckets; each bucket pairs its
//! mapping with a min-heap on expiry that drives both the background
//! sweeper and capacity eviction. Removal callbacks
//! (`Expired` / `Deleted` / `Overflow`) always fire outside bucket
//! locks, so they may re-enter the cache.

pub mod builder;
pub mod cache;
pub mod ds;
pub mod element;
pub mod error;
pub mod prelude;

mod bucket;
mod sweeper;
