//! Cache Policy Module
//!
//! Builds versioned, namespaced cache keys and assigns a TTL per operation kind.

use std::fmt;
use std::time::Duration;

use crate::cache::Fingerprint;
use crate::config::Config;

// == Constants ==
/// Schema version token prefixed to every key.
///
/// Bump whenever the meaning of a key's parameters changes. Entries written
/// under the old token become unreachable and age out through their TTL.
/// v1 interpreted the language parameter incorrectly.
pub const CACHE_SCHEMA_VERSION: &str = "v2";

/// Delimiter between key fields. Escaped inside parameter values.
pub const KEY_DELIMITER: char = ':';

/// Sentinel stored for an unspecified language.
pub const AUTO_LANGUAGE: &str = "auto";

// == Operation Kind ==
/// The cached operations, each with its own namespace and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Rewrite,
    Transcription,
}

impl OperationKind {
    /// Namespace segment used in keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Rewrite => "rewrite",
            OperationKind::Transcription => "transcription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Key ==
/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Percent-escapes `%` and the key delimiter so field boundaries stay unambiguous.
fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            KEY_DELIMITER => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    out
}

// == Cache Policy ==
/// Key construction and TTL decisions.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    version: String,
    rewrite_ttl: Duration,
    transcription_ttl: Duration,
}

impl CachePolicy {
    /// Creates a policy with explicit TTLs under the current schema version.
    pub fn new(rewrite_ttl: Duration, transcription_ttl: Duration) -> Self {
        Self {
            version: CACHE_SCHEMA_VERSION.to_string(),
            rewrite_ttl,
            transcription_ttl,
        }
    }

    /// Creates a policy from the TTLs in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.rewrite_ttl),
            Duration::from_secs(config.transcription_ttl),
        )
    }

    /// Overrides the schema version token.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    // == Build Key ==
    /// Builds the key for `kind` over `parameters` (in declared order) and `content`.
    ///
    /// Layout: `version:kind:param1:...:paramN:fingerprint`.
    pub fn build_key(
        &self,
        kind: OperationKind,
        parameters: &[&str],
        content: impl AsRef<[u8]>,
    ) -> CacheKey {
        let fingerprint = Fingerprint::of(content);
        let mut fields = Vec::with_capacity(parameters.len() + 3);
        fields.push(escape_field(&self.version));
        fields.push(kind.as_str().to_string());
        fields.extend(parameters.iter().map(|p| escape_field(p)));
        fields.push(fingerprint.to_hex());
        CacheKey(fields.join(&KEY_DELIMITER.to_string()))
    }

    /// Key for a rewrite of `text` with `preset_id` into `language`.
    ///
    /// A missing or blank language is keyed as [`AUTO_LANGUAGE`].
    pub fn rewrite_key(&self, text: &str, preset_id: &str, language: Option<&str>) -> CacheKey {
        let language = normalize_language(language);
        self.build_key(OperationKind::Rewrite, &[preset_id, language], text)
    }

    /// Key for a transcription of `audio`.
    pub fn transcription_key(&self, audio: &[u8]) -> CacheKey {
        self.build_key(OperationKind::Transcription, &[], audio)
    }

    // == TTL ==
    /// Returns the TTL applied to results of `kind`.
    pub fn ttl(&self, kind: OperationKind) -> Duration {
        match kind {
            OperationKind::Rewrite => self.rewrite_ttl,
            OperationKind::Transcription => self.transcription_ttl,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Maps a missing or blank language to [`AUTO_LANGUAGE`].
pub fn normalize_language(language: Option<&str>) -> &str {
    match language.map(str::trim) {
        Some(l) if !l.is_empty() => l,
        _ => AUTO_LANGUAGE,
    }
}
