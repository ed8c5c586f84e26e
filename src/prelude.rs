pub use crate::builder::CacheBuilder;
pub use crate::cache::{CacheMetrics, MemoryCache};
pub use crate::ds::{IndexMinHeap, ShardRouter};
pub use crate::element::{Callback, Element, Reason};
