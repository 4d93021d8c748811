//! Cache Adapter Module
//!
//! Wraps a [`KeyValueStore`] so that no store failure ever reaches a caller:
//! failed reads are misses, failed writes are no-ops, both are logged.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{
    CacheError, CacheKey, CacheStats, KeyValueStore, MemoryStore, RedisStore, StatsSnapshot,
};
use crate::config::{CacheBackend, Config};

// == Cache Adapter ==
/// Process-wide handle to the response cache.
///
/// Created once by [`CacheAdapter::init`], cloned into every component that
/// needs it and released by [`CacheAdapter::close`] at shutdown. Clones share
/// the same connection and counters.
#[derive(Clone)]
pub struct CacheAdapter {
    store: Option<Arc<dyn KeyValueStore>>,
    memory: Option<Arc<MemoryStore>>,
    timeout: Duration,
    stats: Arc<CacheStats>,
}

impl CacheAdapter {
    // == Constructors ==
    /// Wraps an already connected store.
    pub fn new(store: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self {
            store: Some(store),
            memory: None,
            timeout,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// An adapter with no store: every read misses, every write is dropped.
    pub fn disabled() -> Self {
        Self {
            store: None,
            memory: None,
            timeout: Duration::ZERO,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Wraps an in-process store, keeping a handle for the sweep task.
    pub fn memory(store: Arc<MemoryStore>, timeout: Duration) -> Self {
        let mut adapter = Self::new(store.clone(), timeout);
        adapter.memory = Some(store);
        adapter
    }

    // == Init ==
    /// Connects the configured backend.
    ///
    /// Best effort: a backend that cannot be reached yields a disabled adapter
    /// and the service runs uncached.
    pub async fn init(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.cache_timeout);
        match config.cache_backend {
            CacheBackend::None => {
                info!("Response cache disabled");
                Self::disabled()
            }
            CacheBackend::Memory => {
                info!(
                    "Using in-process response cache (max_entries={})",
                    config.max_entries
                );
                Self::memory(Arc::new(MemoryStore::new(config.max_entries)), timeout)
            }
            CacheBackend::Redis => {
                let connect = RedisStore::connect(&config.redis_url);
                match tokio::time::timeout(timeout, connect).await {
                    Ok(Ok(store)) => Self::new(Arc::new(store), timeout),
                    Ok(Err(e)) => {
                        warn!("Redis init failed, continuing without cache: {}", e);
                        Self::disabled()
                    }
                    Err(_) => {
                        warn!(
                            "Redis init timed out after {:?}, continuing without cache",
                            timeout
                        );
                        Self::disabled()
                    }
                }
            }
        }
    }

    // == Get ==
    /// Looks up `key`. Store failures are logged and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let Some(store) = &self.store else {
            self.stats.record_miss();
            return None;
        };

        match self.bounded(store.get(key.as_str())).await {
            Ok(Some(value)) => {
                debug!("Cache hit for {}", key);
                self.stats.record_hit();
                Some(value)
            }
            Ok(None) => {
                debug!("Cache miss for {}", key);
                self.stats.record_miss();
                None
            }
            Err(e) => {
                warn!("Cache get error for {}: {}", key, e);
                self.stats.record_error();
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl`. Returns whether the write landed.
    pub async fn set(&self, key: &CacheKey, value: &str, ttl: Duration) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        match self.bounded(store.set(key.as_str(), value, ttl)).await {
            Ok(()) => {
                debug!("Cached {} for {:?}", key, ttl);
                self.stats.record_write();
                true
            }
            Err(e) => {
                warn!("Cache set error for {}: {}", key, e);
                self.stats.record_error();
                false
            }
        }
    }

    // == Close ==
    /// Releases the underlying connection.
    pub async fn close(&self) {
        if let Some(store) = &self.store {
            store.close().await;
        }
    }

    /// Applies the round-trip bound to a store call.
    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.timeout, op)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.timeout)))
    }

    // == Accessors ==
    /// Backend name, or `"disabled"`.
    pub fn backend(&self) -> &'static str {
        self.store.as_ref().map_or("disabled", |s| s.name())
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// The in-process store, when that backend is active.
    pub fn memory_store(&self) -> Option<Arc<MemoryStore>> {
        self.memory.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
