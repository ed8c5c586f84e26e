//! Error types for the ttlkit library.
//!
//! [`InvariantError`] enumerates the mapping/heap consistency rules
//! that the debug-only `check_invariants` methods verify.
//! [`ConfigError`] enumerates the builder inputs that
//! [`try_build`](crate::builder::CacheBuilder::try_build) refuses to
//! normalize silently.
//!
//! ```
//! use ttlkit::builder::CacheBuilder;
//! use ttlkit::error::ConfigError;
//!
//! let err = CacheBuilder::new()
//!     .bucket_capacity(200, 100)
//!     .try_build::<i32>()
//!     .unwrap_err();
//! assert_eq!(err, ConfigError::CapacityBounds { min: 200, max: 100 });
//! ```

use std::fmt;

/// A mapping/heap consistency rule that failed verification.
///
/// Produced by the debug-only `check_invariants` methods on the expiry
/// heap and bucket. Slot numbers refer to positions in the heap's
/// entry array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    /// The heap's entry array and its index table differ in size.
    LengthMismatch { entries: usize, indexed: usize },
    /// The index table records the wrong slot for a key.
    SlotMismatch { slot: usize, indexed: usize },
    /// A heap entry has no index record at all.
    MissingIndex { slot: usize },
    /// A child entry expires before its parent.
    HeapOrder { parent: usize, child: usize },
    /// The mapping's mortal population and the heap disagree in size.
    MortalCount { mapped: usize, tracked: usize },
    /// An element's mortality disagrees with its heap membership.
    MortalityMismatch { key: String },
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { entries, indexed } => {
                write!(f, "heap holds {entries} entries but indexes {indexed} keys")
            },
            Self::SlotMismatch { slot, indexed } => {
                write!(f, "entry at slot {slot} is indexed at slot {indexed}")
            },
            Self::MissingIndex { slot } => {
                write!(f, "entry at slot {slot} is not indexed")
            },
            Self::HeapOrder { parent, child } => {
                write!(f, "slot {child} expires before its parent at slot {parent}")
            },
            Self::MortalCount { mapped, tracked } => {
                write!(f, "mapping holds {mapped} mortal elements, heap tracks {tracked}")
            },
            Self::MortalityMismatch { key } => {
                write!(f, "element {key:?} disagrees with its heap membership")
            },
        }
    }
}

impl std::error::Error for InvariantError {}

/// A builder input rejected by
/// [`try_build`](crate::builder::CacheBuilder::try_build).
///
/// `build` normalizes these same inputs instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `bucket_min_capacity` exceeds `bucket_max_capacity`.
    CapacityBounds { min: usize, max: usize },
    /// `sweep_interval` is zero, which would disable sweeping.
    ZeroSweepInterval,
    /// `min_sweep_interval` is zero.
    ZeroMinSweepInterval,
    /// `min_sweep_interval` exceeds `sweep_interval`.
    IntervalOrder,
    /// `max_keys_deleted_per_round` is zero, which would sweep nothing.
    ZeroDeletionBudget,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityBounds { min, max } => {
                write!(f, "bucket_min_capacity {min} exceeds bucket_max_capacity {max}")
            },
            Self::ZeroSweepInterval => f.write_str("sweep_interval must be positive"),
            Self::ZeroMinSweepInterval => f.write_str("min_sweep_interval must be positive"),
            Self::IntervalOrder => {
                f.write_str("min_sweep_interval must not exceed sweep_interval")
            },
            Self::ZeroDeletionBudget => {
                f.write_str("max_keys_deleted_per_round must be positive")
            },
        }
    }
}

impl std::error::Error for ConfigError {}
