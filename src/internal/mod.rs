//! Internal implementation details.

pub(crate) mod resolution;

pub use resolution::ObjectGraphId;
pub(crate) use resolution::{DepthGuard, HierarchyLock, ResolutionState, DEFAULT_MAX_DEPTH};

#[cfg(feature = "ahash")]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V>;
