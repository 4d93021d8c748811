//! Events produced by a streaming rewrite.

use serde::Serialize;

/// One event in a streamed rewrite.
///
/// A stream is zero or more [`RelayEvent::Chunk`] followed by exactly one
/// [`RelayEvent::Terminal`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelayEvent {
    Chunk(ChunkEvent),
    Terminal(TerminalEvent),
}

/// An increment of output. Serialized as `{"chunk": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkEvent {
    pub chunk: String,
    /// Set only when replaying a cached result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

/// Final event, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TerminalEvent {
    Done {
        text: String,
        cached: bool,
        duration_ms: u64,
    },
    Error {
        error: String,
        message: String,
        duration_ms: u64,
    },
}

impl RelayEvent {
    pub fn chunk(chunk: impl Into<String>) -> Self {
        RelayEvent::Chunk(ChunkEvent {
            chunk: chunk.into(),
            cached: None,
        })
    }

    pub fn cached_chunk(chunk: impl Into<String>) -> Self {
        RelayEvent::Chunk(ChunkEvent {
            chunk: chunk.into(),
            cached: Some(true),
        })
    }

    pub fn done(text: impl Into<String>, cached: bool, duration_ms: u64) -> Self {
        RelayEvent::Terminal(TerminalEvent::Done {
            text: text.into(),
            cached,
            duration_ms,
        })
    }

    pub fn error(error: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        RelayEvent::Terminal(TerminalEvent::Error {
            error: error.into(),
            message: message.into(),
            duration_ms,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayEvent::Terminal(_))
    }
}
