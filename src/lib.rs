//! Rewrite Proxy - A caching proxy in front of a language-model API
//!
//! Forwards rewrite and transcription requests upstream, caches results by
//! content fingerprint, and relays streamed completions as Server-Sent Events.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod presets;
pub mod relay;
pub mod tasks;
pub mod upstream;

pub use api::{create_router, AppState};
pub use cache::{CacheAdapter, CachePolicy};
pub use config::Config;
pub use presets::PresetCatalog;
pub use relay::Relay;
pub use tasks::spawn_cleanup_task;
pub use upstream::OpenAiClient;
