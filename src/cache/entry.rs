//! Cache Entry Module
//!
//! A stored output text and the instant it stops being served.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A single in-process cache entry.
///
/// Written once on a successful upstream completion and never mutated;
/// the sweep task or a read past `expires_at` removes it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached output text
    pub value: String,
    /// End of life, measured from write time
    pub expires_at: Instant,
}

/// Longest lifetime an entry can be given; larger TTLs are clamped to it.
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(u32::MAX as u64);

impl CacheEntry {
    /// Creates an entry that lives for `ttl` from now, at most [`MAX_ENTRY_TTL`].
    pub fn new(value: String, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl.min(MAX_ENTRY_TTL))
            .unwrap_or(now);
        Self { value, expires_at }
    }

    /// An entry is expired once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
