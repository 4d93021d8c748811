//! Upstream providers: chat completion (buffered and streamed) and transcription.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::Config;
use crate::upstream::decode::decode_increments;
use crate::upstream::{ChatMessage, IncrementStream, SamplingParams, UpstreamError};

// == Provider Traits ==
/// A language-model completion endpoint.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the whole completion once generated.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<String, UpstreamError>;

    /// Returns the completion as increments in arrival order.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<IncrementStream, UpstreamError>;
}

/// A speech-to-text endpoint.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Transcribes `audio`; `filename` hints the container format.
    async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<String, UpstreamError>;
}

/// Streams a completion, awaiting `on_increment` once per increment in
/// arrival order, and resolves with their concatenation.
///
/// The next increment is not read until the previous callback completes.
pub async fn complete_streaming<F, Fut>(
    provider: &dyn CompletionProvider,
    messages: &[ChatMessage],
    params: SamplingParams,
    mut on_increment: F,
) -> Result<String, UpstreamError>
where
    F: FnMut(String) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    let mut increments = provider.stream(messages, params).await?;
    let mut full = String::new();
    while let Some(increment) = increments.next().await {
        let increment = increment?;
        full.push_str(&increment);
        on_increment(increment).await;
    }
    Ok(full)
}

// == Wire Types ==
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// == OpenAI Client ==
/// OpenAI-compatible HTTP client.
///
/// The credential is optional at construction; calls without one fail with
/// [`UpstreamError::MissingCredential`].
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    transcription_model: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        transcription_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            transcription_model: transcription_model.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        Self::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.transcription_model.clone(),
            Duration::from_secs(config.upstream_timeout),
        )
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, UpstreamError> {
        self.api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Posts a chat request and rejects non-success statuses.
    async fn post_chat(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
        stream: bool,
    ) -> Result<reqwest::Response, UpstreamError> {
        let api_key = self.api_key()?;
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream,
        };

        debug!(
            "Chat completion: model={} messages={} stream={}",
            self.model,
            messages.len(),
            stream
        );
        let response = self
            .http
            .post(self.endpoint("/chat/completions"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        check_status(response).await
    }
}

/// Passes through success responses; turns anything else into [`UpstreamError::Status`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    // Prefer the provider's own message when it sends one.
    let body = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);
    error!("Upstream returned {}: {}", status, body);
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<String, UpstreamError> {
        let response = self.post_chat(messages, params, false).await?;
        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                UpstreamError::MalformedResponse("completion has no message content".to_string())
            })?;
        Ok(content.trim().to_string())
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<IncrementStream, UpstreamError> {
        let response = self.post_chat(messages, params, true).await?;
        Ok(decode_increments(response.bytes_stream()))
    }
}

#[async_trait]
impl TranscriptionProvider for OpenAiClient {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<String, UpstreamError> {
        let api_key = self.api_key()?;
        let part = reqwest::multipart::Part::bytes(audio.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.transcription_model.clone());

        debug!(
            "Transcription: model={} file={} bytes={}",
            self.transcription_model,
            filename,
            audio.len()
        );
        let response = self
            .http
            .post(self.endpoint("/audio/transcriptions"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        let parsed: TranscriptionResponse = check_status(response).await?.json().await?;
        Ok(parsed.text)
    }
}
