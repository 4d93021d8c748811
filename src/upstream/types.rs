//! Upstream request types and errors.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message in the order the provider should read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters forwarded with each completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

/// Failure of an upstream call.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// No API key configured. Reported per call, never at startup.
    #[error("Missing OPENAI_API_KEY")]
    MissingCredential,

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream request timed out")]
    Timeout,

    /// Provider answered with a non-success status
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    /// The event stream ended before the terminal sentinel
    #[error("upstream stream ended before completion")]
    IncompleteStream,
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::MalformedResponse(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// Increments of a streamed completion, in arrival order.
///
/// Ends after the terminal sentinel; a transport failure or early EOF is
/// yielded as the last item.
pub type IncrementStream = BoxStream<'static, Result<String, UpstreamError>>;
