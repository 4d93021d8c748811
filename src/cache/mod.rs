//! Cache Module
//!
//! Content-addressed caching of upstream outputs: fingerprints, versioned keys,
//! per-operation TTLs, and a store adapter that degrades to a no-op.

mod adapter;
mod entry;
mod fingerprint;
mod memory;
mod policy;
mod redis_store;
mod stats;
mod store;


// Re-export public types
pub use adapter::CacheAdapter;
pub use entry::{CacheEntry, MAX_ENTRY_TTL};
pub use fingerprint::Fingerprint;
pub use memory::MemoryStore;
pub use policy::{
    normalize_language, CacheKey, CachePolicy, OperationKind, AUTO_LANGUAGE,
    CACHE_SCHEMA_VERSION, KEY_DELIMITER,
};
pub use redis_store::RedisStore;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::{CacheError, KeyValueStore};
