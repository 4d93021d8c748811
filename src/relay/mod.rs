//! Relay Module
//!
//! Ties the cache and the upstream providers together for one request.
//!
//! A request builds its key, checks the cache and, on a miss, calls upstream
//! and stores the result. The streaming variant produces a sequence of
//! [`RelayEvent`]s on a channel; the transport layer subscribes to it.

mod events;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::{CacheAdapter, CacheKey, CachePolicy, OperationKind};
use crate::error::{AppError, Result};
use crate::models::RewriteRequest;
use crate::presets::{build_messages, PresetCatalog};
use crate::upstream::{
    complete_streaming, ChatMessage, CompletionProvider, SamplingParams, TranscriptionProvider,
};

pub use events::{ChunkEvent, RelayEvent, TerminalEvent};

/// Events buffered between the relay and a slow client.
const EVENT_BUFFER: usize = 32;

/// `error` field of a terminal error event.
pub const REWRITE_FAILED: &str = "Rewrite failed";

/// Result of a buffered rewrite or a transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub cached: bool,
    pub duration_ms: u64,
}

/// A validated rewrite, ready to be looked up or sent upstream.
#[derive(Debug, Clone)]
pub struct PreparedRewrite {
    pub key: CacheKey,
    pub messages: Vec<ChatMessage>,
    pub params: SamplingParams,
}

// == Downstream ==
/// Sending half of one streamed response.
///
/// Goes quiet after the first failed send: a closed receiver means the
/// client went away and nothing further is delivered. Clones share the flag.
#[derive(Clone)]
struct Downstream {
    tx: mpsc::Sender<RelayEvent>,
    open: Arc<AtomicBool>,
}

impl Downstream {
    fn new(tx: mpsc::Sender<RelayEvent>) -> Self {
        Self {
            tx,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    async fn send(&self, event: RelayEvent) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        if self.tx.send(event).await.is_err() {
            debug!("Downstream closed, dropping remaining events");
            self.open.store(false, Ordering::Release);
        }
    }
}

// == Relay ==
/// Request-level cache and upstream orchestration.
///
/// Cheap to clone; every clone shares the same cache connection and
/// providers. No other state is shared between requests.
#[derive(Clone)]
pub struct Relay {
    cache: CacheAdapter,
    policy: CachePolicy,
    presets: Arc<PresetCatalog>,
    completions: Arc<dyn CompletionProvider>,
    transcriber: Arc<dyn TranscriptionProvider>,
}

impl Relay {
    pub fn new(
        cache: CacheAdapter,
        policy: CachePolicy,
        presets: Arc<PresetCatalog>,
        completions: Arc<dyn CompletionProvider>,
        transcriber: Arc<dyn TranscriptionProvider>,
    ) -> Self {
        Self {
            cache,
            policy,
            presets,
            completions,
            transcriber,
        }
    }

    // == Prepare ==
    /// Validates `req` and resolves its key, prompt and sampling settings.
    ///
    /// Fails before any cache interaction.
    pub fn prepare_rewrite(&self, req: &RewriteRequest) -> Result<PreparedRewrite> {
        if let Some(message) = req.validate() {
            return Err(AppError::Validation(message));
        }
        let text = req.text.as_deref().unwrap_or_default();
        let preset_id = req.preset_id.as_deref().unwrap_or_default().trim();
        let preset = self
            .presets
            .get(preset_id)
            .ok_or_else(|| AppError::Validation(format!("Unknown presetId '{}'", preset_id)))?;

        let language = req.language();
        Ok(PreparedRewrite {
            key: self.policy.rewrite_key(text, &preset.id, Some(language)),
            messages: build_messages(&self.presets, preset, text, language),
            params: preset.sampling(),
        })
    }

    // == Buffered Rewrite ==
    /// Rewrites `req` and returns the whole result.
    pub async fn rewrite(&self, req: &RewriteRequest) -> Result<Completion> {
        let prepared = self.prepare_rewrite(req)?;
        let started = Instant::now();

        if let Some(text) = self.cache.get(&prepared.key).await {
            return Ok(Completion {
                text,
                cached: true,
                duration_ms: elapsed_ms(started),
            });
        }

        let text = self
            .completions
            .complete(&prepared.messages, prepared.params)
            .await?;
        self.store(&prepared.key, &text, OperationKind::Rewrite)
            .await;

        let duration_ms = elapsed_ms(started);
        info!("Rewrite completed in {}ms", duration_ms);
        Ok(Completion {
            text,
            cached: false,
            duration_ms,
        })
    }

    // == Streamed Rewrite ==
    /// Starts a streamed rewrite and returns its event channel.
    ///
    /// Validation errors are returned here, before any event is produced.
    /// The channel carries zero or more chunks and then exactly one terminal
    /// event, after which it closes.
    pub fn rewrite_stream(&self, req: &RewriteRequest) -> Result<mpsc::Receiver<RelayEvent>> {
        let prepared = self.prepare_rewrite(req)?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let relay = self.clone();
        tokio::spawn(async move {
            relay.run_stream(prepared, Downstream::new(tx)).await;
        });
        Ok(rx)
    }

    async fn run_stream(&self, prepared: PreparedRewrite, downstream: Downstream) {
        let started = Instant::now();

        if let Some(text) = self.cache.get(&prepared.key).await {
            downstream.send(RelayEvent::cached_chunk(text.as_str())).await;
            downstream
                .send(RelayEvent::done(text, true, elapsed_ms(started)))
                .await;
            return;
        }

        let streamed = complete_streaming(
            self.completions.as_ref(),
            &prepared.messages,
            prepared.params,
            |increment| {
                let downstream = downstream.clone();
                async move { downstream.send(RelayEvent::chunk(increment)).await }
            },
        )
        .await;

        match streamed {
            Ok(text) => {
                self.store(&prepared.key, &text, OperationKind::Rewrite)
                    .await;
                let duration_ms = elapsed_ms(started);
                info!("Streamed rewrite completed in {}ms", duration_ms);
                downstream
                    .send(RelayEvent::done(text, false, duration_ms))
                    .await;
            }
            Err(e) => {
                warn!("Streamed rewrite failed: {}", e);
                downstream
                    .send(RelayEvent::error(
                        REWRITE_FAILED,
                        e.to_string(),
                        elapsed_ms(started),
                    ))
                    .await;
            }
        }
    }

    // == Transcription ==
    /// Transcribes `audio`, keyed on its bytes alone.
    pub async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<Completion> {
        if audio.is_empty() {
            return Err(AppError::Validation("No audio file provided".to_string()));
        }
        let started = Instant::now();
        let key = self.policy.transcription_key(&audio);

        if let Some(text) = self.cache.get(&key).await {
            return Ok(Completion {
                text,
                cached: true,
                duration_ms: elapsed_ms(started),
            });
        }

        debug!("Transcribing {} ({} bytes)", filename, audio.len());
        let text = self.transcriber.transcribe(audio, filename).await?;
        self.store(&key, &text, OperationKind::Transcription).await;

        let duration_ms = elapsed_ms(started);
        info!("Transcription completed in {}ms", duration_ms);
        Ok(Completion {
            text,
            cached: false,
            duration_ms,
        })
    }

    /// Writes a finished result. Empty results are not cached.
    async fn store(&self, key: &CacheKey, text: &str, kind: OperationKind) {
        if text.is_empty() {
            debug!("Skipping cache write of empty result for {}", key);
            return;
        }
        self.cache.set(key, text, self.policy.ttl(kind)).await;
    }

    // == Accessors ==
    pub fn cache(&self) -> &CacheAdapter {
        &self.cache
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    pub fn completions(&self) -> &dyn CompletionProvider {
        self.completions.as_ref()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, KeyValueStore, MemoryStore};
    use crate::presets::Preset;
    use crate::upstream::{IncrementStream, OpenAiClient, UpstreamError};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays one scripted response per call.
    struct ScriptedProvider {
        increments: Vec<&'static str>,
        fail_after: Option<usize>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(increments: Vec<&'static str>) -> Self {
            Self {
                increments,
                fail_after: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_after(increments: Vec<&'static str>, n: usize) -> Self {
            Self {
                fail_after: Some(n),
                ..Self::new(increments)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _params: SamplingParams,
        ) -> std::result::Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some() {
                return Err(UpstreamError::Transport("connection reset".to_string()));
            }
            Ok(self.increments.concat())
        }

        async fn stream(
            &self,
            _messages: &[ChatMessage],
            _params: SamplingParams,
        ) -> std::result::Result<IncrementStream, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut items: Vec<std::result::Result<String, UpstreamError>> =
                self.increments.iter().map(|s| Ok(s.to_string())).collect();
            if let Some(n) = self.fail_after {
                items.truncate(n);
                items.push(Err(UpstreamError::Transport("connection reset".to_string())));
            }
            Ok(futures::stream::iter(items).boxed())
        }
    }

    #[async_trait]
    impl TranscriptionProvider for ScriptedProvider {
        async fn transcribe(
            &self,
            _audio: Bytes,
            _filename: &str,
        ) -> std::result::Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.increments.concat())
        }
    }

    /// Store that fails every call but records attempted writes.
    #[derive(Default)]
    struct BrokenStore {
        writes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> std::result::Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set(
            &self,
            key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> std::result::Result<(), CacheError> {
            self.writes.lock().unwrap().push(key.to_string());
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn catalog() -> Arc<PresetCatalog> {
        Arc::new(
            PresetCatalog::new(
                "GLOBAL".to_string(),
                vec![Preset {
                    id: "magic".to_string(),
                    label: "Magic".to_string(),
                    temperature: 0.5,
                    max_tokens: 100,
                    behaviour: "Improve it.".to_string(),
                    examples: vec![],
                }],
            )
            .unwrap(),
        )
    }

    fn relay_with(cache: CacheAdapter, provider: Arc<ScriptedProvider>) -> Relay {
        Relay::new(
            cache,
            CachePolicy::default(),
            catalog(),
            provider.clone(),
            provider,
        )
    }

    fn memory_cache() -> CacheAdapter {
        CacheAdapter::memory(Arc::new(MemoryStore::new(100)), Duration::from_secs(1))
    }

    async fn collect(mut rx: mpsc::Receiver<RelayEvent>) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn terminal(events: &[RelayEvent]) -> &TerminalEvent {
        match events.last() {
            Some(RelayEvent::Terminal(t)) => t,
            other => panic!("expected terminal event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_forwards_increments_in_order() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Hel", "lo"]));
        let relay = relay_with(memory_cache(), provider);

        let rx = relay
            .rewrite_stream(&RewriteRequest::new("hello", "magic"))
            .unwrap();
        let events = collect(rx).await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], RelayEvent::chunk("Hel"));
        assert_eq!(events[1], RelayEvent::chunk("lo"));
        match terminal(&events) {
            TerminalEvent::Done { text, cached, .. } => {
                assert_eq!(text, "Hello");
                assert!(!cached);
            }
            other => panic!("unexpected terminal {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_replays_cache_hit() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Hel", "lo"]));
        let relay = relay_with(memory_cache(), provider.clone());
        let req = RewriteRequest::new("hello", "magic");

        collect(relay.rewrite_stream(&req).unwrap()).await;
        let events = collect(relay.rewrite_stream(&req).unwrap()).await;

        assert_eq!(provider.calls(), 1);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RelayEvent::cached_chunk("Hello"));
        match terminal(&events) {
            TerminalEvent::Done { text, cached, .. } => {
                assert_eq!(text, "Hello");
                assert!(cached);
            }
            other => panic!("unexpected terminal {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_error_is_terminal_and_not_cached() {
        let provider = Arc::new(ScriptedProvider::failing_after(vec!["Hel", "lo"], 1));
        let cache = memory_cache();
        let relay = relay_with(cache.clone(), provider.clone());
        let req = RewriteRequest::new("hello", "magic");

        let events = collect(relay.rewrite_stream(&req).unwrap()).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RelayEvent::chunk("Hel"));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        match terminal(&events) {
            TerminalEvent::Error { error, message, .. } => {
                assert_eq!(error, REWRITE_FAILED);
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected terminal {:?}", other),
        }

        assert_eq!(cache.stats().writes, 0);
        let key = relay.prepare_rewrite(&req).unwrap().key;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_failing_store_still_completes() {
        let store = Arc::new(BrokenStore::default());
        let cache = CacheAdapter::new(store.clone(), Duration::from_secs(1));
        let provider = Arc::new(ScriptedProvider::new(vec!["Hel", "lo"]));
        let relay = relay_with(cache, provider);
        let req = RewriteRequest::new("hello", "magic");

        let result = relay.rewrite(&req).await.unwrap();
        assert_eq!(result.text, "Hello");
        assert!(!result.cached);

        let events = collect(relay.rewrite_stream(&req).unwrap()).await;
        assert!(matches!(
            terminal(&events),
            TerminalEvent::Done { cached: false, .. }
        ));
        assert_eq!(store.writes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_buffered_rewrite_is_idempotent() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Hel", "lo"]));
        let relay = relay_with(memory_cache(), provider.clone());
        let req = RewriteRequest::new("hello", "magic").with_language("fr");

        let first = relay.rewrite(&req).await.unwrap();
        let second = relay.rewrite(&req).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.text, second.text);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_buffered_error_is_not_cached() {
        let provider = Arc::new(ScriptedProvider::failing_after(vec!["x"], 0));
        let cache = memory_cache();
        let relay = relay_with(cache.clone(), provider);

        let err = relay
            .rewrite(&RewriteRequest::new("hello", "magic"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(UpstreamError::Transport(_))));
        assert_eq!(cache.stats().writes, 0);
    }

    #[tokio::test]
    async fn test_unknown_preset_is_validation_error() {
        let provider = Arc::new(ScriptedProvider::new(vec!["x"]));
        let cache = memory_cache();
        let relay = relay_with(cache.clone(), provider.clone());

        let err = relay
            .rewrite_stream(&RewriteRequest::new("hello", "nope"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("nope")));
        assert_eq!(cache.stats().misses, 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_language_changes_key() {
        let relay = relay_with(
            memory_cache(),
            Arc::new(ScriptedProvider::new(vec!["x"])),
        );
        let auto = relay
            .prepare_rewrite(&RewriteRequest::new("hello", "magic"))
            .unwrap();
        let french = relay
            .prepare_rewrite(&RewriteRequest::new("hello", "magic").with_language("fr"))
            .unwrap();
        assert_ne!(auto.key, french.key);
        assert_eq!(auto.params.max_tokens, 100);
    }

    #[tokio::test]
    async fn test_disconnected_client_still_caches() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Hel", "lo"]));
        let cache = memory_cache();
        let relay = relay_with(cache.clone(), provider);
        let req = RewriteRequest::new("hello", "magic");

        drop(relay.rewrite_stream(&req).unwrap());

        let key = relay.prepare_rewrite(&req).unwrap().key;
        let mut cached = None;
        for _ in 0..50 {
            cached = cache.get(&key).await;
            if cached.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cached.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_oversized_ttl_still_terminates_stream() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Hel", "lo"]));
        let cache = memory_cache();
        let relay = Relay::new(
            cache.clone(),
            CachePolicy::new(Duration::from_secs(u64::MAX), Duration::from_secs(u64::MAX)),
            catalog(),
            provider.clone(),
            provider,
        );
        let req = RewriteRequest::new("hello", "magic");

        let events = collect(relay.rewrite_stream(&req).unwrap()).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(
            terminal(&events),
            TerminalEvent::Done { cached: false, .. }
        ));

        let buffered = relay.rewrite(&req).await.unwrap();
        assert!(buffered.cached);
        assert_eq!(buffered.text, "Hello");

        let transcript = relay
            .transcribe(Bytes::from_static(b"RIFF"), "a.wav")
            .await
            .unwrap();
        assert_eq!(transcript.text, "Hello");
    }

    #[tokio::test]
    async fn test_upstream_timeout_is_terminal_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let client = Arc::new(
            OpenAiClient::new(
                format!("http://{}", addr),
                Some("k".to_string()),
                "gpt-4o-mini",
                "whisper-1",
                Duration::from_millis(100),
            )
            .unwrap(),
        );
        let cache = memory_cache();
        let relay = Relay::new(
            cache.clone(),
            CachePolicy::default(),
            catalog(),
            client.clone(),
            client,
        );

        let events = collect(
            relay
                .rewrite_stream(&RewriteRequest::new("hello", "magic"))
                .unwrap(),
        )
        .await;
        assert_eq!(events.len(), 1);
        match terminal(&events) {
            TerminalEvent::Error { error, message, .. } => {
                assert_eq!(error, REWRITE_FAILED);
                assert_eq!(message, &UpstreamError::Timeout.to_string());
            }
            other => panic!("unexpected terminal {:?}", other),
        }
        assert_eq!(cache.stats().writes, 0);

        let err = relay
            .rewrite(&RewriteRequest::new("hello", "magic"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_transcription_cached_by_audio_bytes() {
        let provider = Arc::new(ScriptedProvider::new(vec!["hello world"]));
        let relay = relay_with(memory_cache(), provider.clone());
        let audio = Bytes::from_static(b"RIFF....WAVE");

        let first = relay.transcribe(audio.clone(), "a.wav").await.unwrap();
        let second = relay.transcribe(audio, "other-name.wav").await.unwrap();

        assert_eq!(first.text, "hello world");
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_audio_rejected() {
        let relay = relay_with(
            memory_cache(),
            Arc::new(ScriptedProvider::new(vec!["x"])),
        );
        let err = relay.transcribe(Bytes::new(), "a.wav").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
