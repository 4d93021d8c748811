//! Upstream Module
//!
//! Client side of the language-model provider: buffered and streamed chat
//! completions, audio transcription, and the SSE decoder behind streaming.

mod client;
pub mod decode;
mod types;

pub use client::{complete_streaming, CompletionProvider, OpenAiClient, TranscriptionProvider};
pub use types::{ChatMessage, IncrementStream, Role, SamplingParams, UpstreamError};
