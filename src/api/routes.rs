//! API Routes
//!
//! Configures the Axum router with all proxy endpoints.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    extract_outcomes_handler, extract_unstuck_handler, health_handler, presets_handler,
    rewrite_batch_handler, rewrite_stream_handler, stats_handler, transcribe_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /api/rewrite` - Streamed rewrite (Server-Sent Events)
/// - `POST /api/rewrite/batch` - Buffered rewrite
/// - `POST /api/transcribe` - Audio transcription (multipart, field `audio`)
/// - `POST /api/extract/outcomes` - Actionable outcomes from text
/// - `POST /api/extract/unstuck` - One insight and one action from text
/// - `GET /api/presets` - Preset ids and labels
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
/// - Body limit on the upload route: `max_upload_bytes` plus multipart overhead
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes.saturating_add(64 * 1024));

    Router::new()
        .route("/api/rewrite", post(rewrite_stream_handler))
        .route("/api/rewrite/batch", post(rewrite_batch_handler))
        .route(
            "/api/transcribe",
            post(transcribe_handler).layer(upload_limit),
        )
        .route("/api/extract/outcomes", post(extract_outcomes_handler))
        .route("/api/extract/unstuck", post(extract_unstuck_handler))
        .route("/api/presets", get(presets_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheAdapter, CachePolicy};
    use crate::presets::PresetCatalog;
    use crate::relay::Relay;
    use crate::upstream::OpenAiClient;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    /// Router with no cache and an upstream client lacking a credential.
    fn create_test_app() -> Router {
        let client = Arc::new(
            OpenAiClient::new(
                "http://127.0.0.1:1",
                None,
                "gpt-4o-mini",
                "whisper-1",
                Duration::from_secs(1),
            )
            .unwrap(),
        );
        let relay = Relay::new(
            CacheAdapter::disabled(),
            CachePolicy::default(),
            Arc::new(PresetCatalog::builtin().unwrap()),
            client.clone(),
            client,
        );
        create_router(AppState::new(relay, false, 1024))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_credential_is_service_unavailable() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/rewrite/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"hello","presetId":"magic"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/rewrite")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
