//! Namespaced TTL cache with LRU eviction.
//!
//! One `CacheStore` is shared by the signature manager, the REST client and
//! the reconciler. Entries live under a `(namespace, key)` pair and expire:
//! - lazily, when a read finds them past their TTL
//! - periodically, through the background sweeper
//! - by LRU, when a namespace exceeds its entry cap

pub mod error;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use store::{CacheConfig, CacheEntry, CacheEvent, CacheStats, CacheStore, NamespaceConfig};
