//! API Module
//!
//! HTTP handlers and routing for the proxy REST API.
//!
//! # Endpoints
//! - `POST /api/rewrite` - Streamed rewrite (SSE)
//! - `POST /api/rewrite/batch` - Buffered rewrite
//! - `POST /api/transcribe` - Audio transcription
//! - `POST /api/extract/outcomes`, `POST /api/extract/unstuck` - Structured extraction
//! - `GET /api/presets` - Preset catalog
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
