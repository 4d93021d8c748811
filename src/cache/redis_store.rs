//! Redis Store Module
//!
//! [`KeyValueStore`] over a Redis server using a multiplexed connection manager.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{info, warn};

use crate::cache::{CacheError, KeyValueStore, MAX_ENTRY_TTL};

// == Redis Store ==
/// Redis-backed store.
///
/// `ConnectionManager` multiplexes a single connection and reconnects on
/// failure; clones share it, so no lock is needed around commands.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    url: String,
}

impl RedisStore {
    /// Opens a connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Redis connected at {}", redact(url));
        Ok(Self {
            connection,
            url: url.to_string(),
        })
    }
}

/// Hides any password in a redis URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        // SET EX rejects zero and out-of-range expiries.
        let seconds = ttl.min(MAX_ENTRY_TTL).as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }

    async fn close(&self) {
        let mut conn = self.connection.clone();
        match redis::cmd("QUIT").query_async::<_, ()>(&mut conn).await {
            Ok(()) => info!("Redis connection to {} closed", redact(&self.url)),
            Err(e) => warn!("Redis close error: {}", e),
        }
    }
}
