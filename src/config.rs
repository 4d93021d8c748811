//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Which key-value store backs the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// External Redis server at `REDIS_URL`
    Redis,
    /// In-process expiring map (single instance deployments, tests)
    Memory,
    /// Caching disabled; every lookup is a miss
    None,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "none" | "off" | "disabled" => Ok(Self::None),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Cache backend selection
    pub cache_backend: CacheBackend,
    /// Redis connection URL
    pub redis_url: String,
    /// Upper bound on a single cache round trip, in seconds
    pub cache_timeout: u64,
    /// TTL in seconds for rewrite results
    pub rewrite_ttl: u64,
    /// TTL in seconds for transcription results
    pub transcription_ttl: u64,
    /// Capacity of the in-process store
    pub max_entries: usize,
    /// Sweep interval in seconds for the in-process store
    pub cleanup_interval: u64,
    /// Upstream credential, checked at call time
    pub openai_api_key: Option<String>,
    /// Upstream base URL
    pub openai_base_url: String,
    /// Chat completion model
    pub openai_model: String,
    /// Transcription model
    pub transcription_model: String,
    /// Upper bound on a single upstream call, in seconds
    pub upstream_timeout: u64,
    /// Maximum accepted audio upload, in bytes
    pub max_upload_bytes: usize,
}

/// Parses `name` from the environment, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Like [`env_or`] but treats zero as unset.
fn env_nonzero_or(name: &str, default: u64) -> u64 {
    match env_or(name, default) {
        0 => default,
        v => v,
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `CACHE_BACKEND` - `redis`, `memory` or `none` (default: redis)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379)
    /// - `CACHE_TIMEOUT_SECS` - Cache round trip bound (default: 60)
    /// - `REWRITE_CACHE_TTL` - Rewrite TTL in seconds (default: 7 days)
    /// - `TRANSCRIPTION_CACHE_TTL` - Transcription TTL in seconds (default: 24 hours)
    /// - `MAX_ENTRIES` - In-process store capacity (default: 10000)
    /// - `CLEANUP_INTERVAL` - In-process sweep frequency in seconds (default: 60)
    /// - `OPENAI_API_KEY` - Upstream credential (default: unset)
    /// - `OPENAI_BASE_URL` - Upstream base URL (default: https://api.openai.com/v1)
    /// - `OPENAI_MODEL` - Chat model (default: gpt-4o-mini)
    /// - `OPENAI_TRANSCRIPTION_MODEL` - Transcription model (default: whisper-1)
    /// - `UPSTREAM_TIMEOUT_SECS` - Upstream call bound (default: 60)
    /// - `MAX_UPLOAD_BYTES` - Audio upload limit (default: 25 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("PORT", defaults.server_port),
            cache_backend: env_or("CACHE_BACKEND", defaults.cache_backend),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            cache_timeout: env_nonzero_or("CACHE_TIMEOUT_SECS", defaults.cache_timeout),
            rewrite_ttl: env_nonzero_or("REWRITE_CACHE_TTL", defaults.rewrite_ttl),
            transcription_ttl: env_nonzero_or(
                "TRANSCRIPTION_CACHE_TTL",
                defaults.transcription_ttl,
            ),
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            cleanup_interval: env_nonzero_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            openai_api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            transcription_model: env::var("OPENAI_TRANSCRIPTION_MODEL")
                .unwrap_or(defaults.transcription_model),
            upstream_timeout: env_nonzero_or("UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            cache_timeout: 60,
            rewrite_ttl: 60 * 60 * 24 * 7,
            transcription_ttl: 60 * 60 * 24,
            max_entries: 10_000,
            cleanup_interval: 60,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
            upstream_timeout: 60,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}
