//! API Handlers
//!
//! HTTP request handlers for each proxy endpoint.

use std::convert::Infallible;
use std::time::Instant;

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::extract::{extract_outcomes, extract_unstuck};
use crate::models::{
    CompletionResponse, ExtractRequest, HealthResponse, OutcomesResponse, PresetSummary,
    PresetsResponse, RewriteRequest, StatsResponse, UnstuckResponse,
};
use crate::relay::Relay;

/// Multipart field carrying the audio upload.
pub const AUDIO_FIELD: &str = "audio";

/// Filename used when the upload does not name one.
pub const DEFAULT_AUDIO_FILENAME: &str = "audio.wav";

const AUDIO_MIME_TYPES: &[&str] = &[
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
    "audio/mpeg",
    "audio/mp3",
    "audio/mp4",
    "audio/m4a",
    "audio/x-m4a",
    "audio/webm",
    "audio/ogg",
    "audio/flac",
];

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "webm", "ogg", "flac"];

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    /// Whether an upstream credential is set; reported by `/health` only
    pub upstream_configured: bool,
    /// Largest accepted audio upload
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(relay: Relay, upstream_configured: bool, max_upload_bytes: usize) -> Self {
        Self {
            relay,
            upstream_configured,
            max_upload_bytes,
        }
    }
}

/// Unwraps a JSON body, reporting a malformed one as a validation error.
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Handler for POST /api/rewrite
///
/// Streams the rewrite as Server-Sent Events. Validation failures are
/// answered with a plain JSON error before the stream starts.
pub async fn rewrite_stream_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RewriteRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let req = json_body(payload)?;
    let events = state.relay.rewrite_stream(&req)?;

    let stream = ReceiverStream::new(events).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().data(data))
    });
    Ok(Sse::new(stream))
}

/// Handler for POST /api/rewrite/batch
pub async fn rewrite_batch_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RewriteRequest>, JsonRejection>,
) -> Result<Json<CompletionResponse>> {
    let req = json_body(payload)?;
    let completion = state.relay.rewrite(&req).await?;
    Ok(Json(completion.into()))
}

/// Handler for POST /api/transcribe
///
/// Expects a multipart form with the audio under the `audio` field.
pub async fn transcribe_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CompletionResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_AUDIO_FILENAME)
            .to_string();
        if !is_audio_upload(field.content_type(), &filename) {
            return Err(AppError::Validation(
                "Invalid file type. Please upload a valid audio file.".to_string(),
            ));
        }

        let audio = field.bytes().await.map_err(upload_error)?;
        if audio.len() > state.max_upload_bytes {
            return Err(AppError::Validation("Audio file is too large.".to_string()));
        }
        debug!("Received {} ({} bytes)", filename, audio.len());
        let completion = state.relay.transcribe(audio, &filename).await?;
        return Ok(Json(completion.into()));
    }

    Err(AppError::Validation(
        "No audio file provided. Upload under field name \"audio\".".to_string(),
    ))
}

fn upload_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation("Audio file is too large.".to_string())
    } else {
        AppError::Validation(err.body_text())
    }
}

/// Accepts an upload whose MIME type or filename extension is audio.
pub fn is_audio_upload(content_type: Option<&str>, filename: &str) -> bool {
    let mime_ok = content_type.is_some_and(|ct| {
        let essence = ct.split(';').next().unwrap_or_default().trim();
        AUDIO_MIME_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    });
    let ext_ok = filename.rsplit_once('.').is_some_and(|(_, ext)| {
        AUDIO_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    });
    mime_ok || ext_ok
}

/// Handler for POST /api/extract/outcomes
pub async fn extract_outcomes_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<OutcomesResponse>> {
    let started = Instant::now();
    let req = json_body(payload)?;
    if let Some(message) = req.validate() {
        return Err(AppError::Validation(message));
    }

    let text = req.text.as_deref().unwrap_or_default();
    let outcomes = extract_outcomes(state.relay.completions(), text, req.language()).await?;

    let duration_ms = started.elapsed().as_millis() as u64;
    info!("Extracted {} outcomes in {}ms", outcomes.len(), duration_ms);
    Ok(Json(OutcomesResponse {
        outcomes,
        duration_ms,
    }))
}

/// Handler for POST /api/extract/unstuck
pub async fn extract_unstuck_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<UnstuckResponse>> {
    let started = Instant::now();
    let req = json_body(payload)?;
    if let Some(message) = req.validate() {
        return Err(AppError::Validation(message));
    }

    let text = req.text.as_deref().unwrap_or_default();
    let unstuck = extract_unstuck(state.relay.completions(), text, req.language()).await?;

    Ok(Json(UnstuckResponse {
        insight: unstuck.insight,
        action: unstuck.action,
        duration_ms: started.elapsed().as_millis() as u64,
    }))
}

/// Handler for GET /api/presets
pub async fn presets_handler(State(state): State<AppState>) -> Json<PresetsResponse> {
    let presets = state
        .relay
        .presets()
        .iter()
        .map(PresetSummary::from)
        .collect();
    Json(PresetsResponse { presets })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.relay.cache();
    Json(StatsResponse::new(cache.backend(), cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        state.relay.cache().backend(),
        state.upstream_configured,
    ))
}
