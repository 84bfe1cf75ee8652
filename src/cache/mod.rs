//! Caching layer for data persistence and offline support.
//!
//! This module provides an API-agnostic caching mechanism that:
//! - Stores serializable values with a TTL under a namespaced key prefix
//! - Bounds the number of entries, evicting the oldest first
//! - Wraps network fetches so failures fall back to stale cached data
//! - Optionally publishes change events for other consumers

mod events;
mod layer;
mod storage;
mod store;
mod traits;

pub use events::{CacheEvent, CacheNotifier};
pub use layer::CacheLayer;
pub use storage::{MemoryStorage, NoopStorage, SqliteStorage, Storage};
pub use store::{CacheStore, StoreOptions, DEFAULT_CAPACITY, DEFAULT_NAMESPACE, DEFAULT_TTL};
pub use traits::{CacheEntry, CacheMetadata, CacheStats, Cached, QueryKey};
