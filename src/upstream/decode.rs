//! Streaming decoder: upstream SSE bytes -> text increments.
//!
//! Lines are framed on `\n`. Only `data:` lines are considered; `data: [DONE]`
//! ends the stream. Payloads that fail to parse are skipped so a single bad
//! frame does not abort an otherwise healthy stream.

use bytes::Bytes;
use futures::{stream, Stream, StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::upstream::{IncrementStream, UpstreamError};

/// Payload marking the end of the upstream event stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// Outcome of decoding one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Not a data line, malformed, or carrying no content
    Skip,
    Increment(String),
    Done,
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

/// Decodes a single line of the upstream event stream.
pub fn parse_line(line: &str) -> Frame {
    let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
        return Frame::Skip;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }

    match serde_json::from_str::<ChunkPayload>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map_or(Frame::Skip, Frame::Increment),
        Err(_) => Frame::Skip,
    }
}

struct DecodeState {
    input: stream::BoxStream<'static, Result<Bytes, UpstreamError>>,
    buf: Vec<u8>,
    finished: bool,
}

/// Turns an upstream byte stream into an [`IncrementStream`].
///
/// The result ends cleanly after [`DONE_SENTINEL`]. A transport error, or
/// EOF before the sentinel, is yielded as a final `Err`.
pub fn decode_increments<S, E>(input: S) -> IncrementStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<UpstreamError> + 'static,
{
    let state = DecodeState {
        input: input.map_err(Into::into).fuse().boxed(),
        buf: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }

        loop {
            // Emit complete lines first.
            if let Some(pos) = st.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = st.buf.drain(..=pos).collect();
                match parse_line(&String::from_utf8_lossy(&line)) {
                    Frame::Skip => continue,
                    Frame::Increment(text) => return Some((Ok(text), st)),
                    Frame::Done => return None,
                }
            }

            match st.input.next().await {
                Some(Ok(bytes)) => st.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => {
                    // Last line may lack its newline.
                    if !st.buf.is_empty() {
                        let line = std::mem::take(&mut st.buf);
                        match parse_line(&String::from_utf8_lossy(&line)) {
                            Frame::Done => return None,
                            Frame::Increment(text) => return Some((Ok(text), st)),
                            Frame::Skip => {}
                        }
                    }
                    st.finished = true;
                    return Some((Err(UpstreamError::IncompleteStream), st));
                }
            }
        }
    })
    .boxed()
}
