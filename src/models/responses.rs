//! Response DTOs for the proxy API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::StatsSnapshot;
use crate::extract::Outcome;
use crate::presets::Preset;
use crate::relay::Completion;

/// Response body for buffered rewrites and transcriptions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionResponse {
    /// Output text
    pub text: String,
    /// Whether the text was served from cache
    pub cached: bool,
    /// Time from request entry to response
    pub duration_ms: u64,
}

impl From<Completion> for CompletionResponse {
    fn from(completion: Completion) -> Self {
        Self {
            text: completion.text,
            cached: completion.cached,
            duration_ms: completion.duration_ms,
        }
    }
}

/// One entry of `GET /api/presets`
#[derive(Debug, Clone, Serialize)]
pub struct PresetSummary {
    pub id: String,
    pub label: String,
}

impl From<&Preset> for PresetSummary {
    fn from(preset: &Preset) -> Self {
        Self {
            id: preset.id.clone(),
            label: preset.label.clone(),
        }
    }
}

/// Response body for `GET /api/presets`
#[derive(Debug, Clone, Serialize)]
pub struct PresetsResponse {
    pub presets: Vec<PresetSummary>,
}

/// Response body for `POST /api/extract/outcomes`
#[derive(Debug, Clone, Serialize)]
pub struct OutcomesResponse {
    pub outcomes: Vec<Outcome>,
    pub duration_ms: u64,
}

/// Response body for `POST /api/extract/unstuck`
#[derive(Debug, Clone, Serialize)]
pub struct UnstuckResponse {
    pub insight: String,
    pub action: String,
    pub duration_ms: u64,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Active cache backend
    pub backend: String,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of successful cache writes
    pub writes: u64,
    /// Number of swallowed cache failures
    pub errors: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(backend: impl Into<String>, stats: StatsSnapshot) -> Self {
        Self {
            backend: backend.into(),
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            errors: stats.errors,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Cache backend name, or "disabled"
    pub cache: String,
    /// Whether an upstream credential is configured
    pub upstream_configured: bool,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(cache: impl Into<String>, upstream_configured: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            cache: cache.into(),
            upstream_configured,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error kind
    pub error: String,
    /// Cause, readable by a human
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
