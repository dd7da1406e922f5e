//! AI adapter: generative text source abstraction, Gemini SSE streaming and
//! a deterministic mock.
//!
//! Sources only produce chunks of text; assembling and parsing them is done
//! by the accumulator and the extractor.

use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ai::AiConfig;
use crate::error::GenerationError;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

pub type ChunkStream = BoxStream<'static, Result<String, GenerationError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One role-tagged prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub text: String,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Chunked text producer. Opening the stream may fail (auth, quota, transport);
/// so may any chunk after that.
#[async_trait]
pub trait GenerativeSource: Send + Sync {
    async fn stream(&self, messages: &[PromptMessage]) -> Result<ChunkStream, GenerationError>;
    fn name(&self) -> &'static str;
}

pub type DynSource = Arc<dyn GenerativeSource>;

/// Factory: build a source according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock source.
/// * Else if `config.enabled==false`, returns a disabled source.
/// * Else builds the Gemini streaming source.
pub fn build_source(config: &AiConfig, base_url: &str) -> DynSource {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockSource::chunks([
            "{\"content\":\"Mock analysis: ",
            "conditions are within seasonal norms.\",",
            "\"sources\":[],\"visualization\":null}",
        ]));
    }

    if !config.enabled {
        return Arc::new(DisabledSource);
    }

    match config.provider.as_str() {
        "gemini" => Arc::new(GeminiSource::new(
            base_url,
            &config.api_key,
            &config.model,
            Duration::from_secs(config.stream_timeout_secs),
        )),
        "mock" => Arc::new(MockSource::chunks([
            "{\"content\":\"Mock analysis\",\"sources\":[],\"visualization\":null}",
        ])),
        other => {
            tracing::warn!(provider = other, "unknown AI provider; analysis disabled");
            Arc::new(DisabledSource)
        }
    }
}

// ------------------------------------------------------------
// Gemini (streamGenerateContent, SSE)
// ------------------------------------------------------------

pub struct GeminiSource {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiSource {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(crate::ingest::providers::USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = ?e, "gemini client builder failed; using defaults");
                reqwest::Client::new()
            });
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn request_body(messages: &[PromptMessage]) -> Value {
        let contents: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role, "parts": [{"text": m.text}]}))
            .collect();
        json!({
            "contents": contents,
            "generationConfig": {"responseMimeType": "application/json"}
        })
    }

    async fn open(&self, messages: &[PromptMessage]) -> Result<ChunkStream, GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::Disabled);
        }
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(messages))
            .send()
            .await
            .map_err(|e| GenerationError::classify(e.status().map(|s| s.as_u16()), &e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::classify(Some(status.as_u16()), &body));
        }
        Ok(sse_text_stream(resp.bytes_stream()))
    }
}

#[async_trait]
impl GenerativeSource for GeminiSource {
    async fn stream(&self, messages: &[PromptMessage]) -> Result<ChunkStream, GenerationError> {
        self.open(messages).await
    }
    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Incremental `text/event-stream` decoder yielding the text of each event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<String, GenerationError>> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(item) = decode_line(&String::from_utf8_lossy(&line)) {
                out.push(item);
            }
        }
        out
    }

    /// Flush a final line that had no trailing newline.
    pub fn finish(&mut self) -> Vec<Result<String, GenerationError>> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }
}

fn decode_line(line: &str) -> Option<Result<String, GenerationError>> {
    let payload = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let v: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => return Some(Err(GenerationError::Malformed(e.to_string()))),
    };
    if let Some(err) = v.get("error") {
        let code = err.get("code").and_then(Value::as_u64).map(|c| c as u16);
        let msg = err
            .get("status")
            .or_else(|| err.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("upstream error");
        return Some(Err(GenerationError::classify(code, msg)));
    }
    let text: String = v
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    (!text.is_empty()).then_some(Ok(text))
}

/// Adapt a byte stream into a stream of event texts.
pub fn sse_text_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = (
        bytes.boxed(),
        SseDecoder::default(),
        VecDeque::<Result<String, GenerationError>>::new(),
        false,
    );
    stream::unfold(state, |(mut bytes, mut dec, mut queue, mut done)| async move {
        loop {
            if let Some(item) = queue.pop_front() {
                return Some((item, (bytes, dec, queue, done)));
            }
            if done {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => queue.extend(dec.feed(chunk.as_ref())),
                Some(Err(e)) => {
                    queue.push_back(Err(GenerationError::Transport(e.to_string())));
                    done = true;
                }
                None => {
                    queue.extend(dec.finish());
                    done = true;
                }
            }
        }
    })
    .boxed()
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Always fails with `Disabled`; used when AI is switched off.
pub struct DisabledSource;

#[async_trait]
impl GenerativeSource for DisabledSource {
    async fn stream(&self, _messages: &[PromptMessage]) -> Result<ChunkStream, GenerationError> {
        Err(GenerationError::Disabled)
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Simple mock source for tests/local runs: replays fixed chunks, or fails.
#[derive(Clone)]
pub struct MockSource {
    chunks: Vec<Result<String, GenerationError>>,
    open_error: Option<GenerationError>,
}

impl MockSource {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| Ok(c.into())).collect(),
            open_error: None,
        }
    }

    /// Fails before any chunk is produced.
    pub fn failing(err: GenerationError) -> Self {
        Self {
            chunks: Vec::new(),
            open_error: Some(err),
        }
    }

    /// Produces `chunks` and then fails with `err`.
    pub fn broken_after<I, S>(chunks: I, err: GenerationError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut m = Self::chunks(chunks);
        m.chunks.push(Err(err));
        m
    }
}

#[async_trait]
impl GenerativeSource for MockSource {
    async fn stream(&self, _messages: &[PromptMessage]) -> Result<ChunkStream, GenerationError> {
        match &self.open_error {
            Some(e) => Err(e.clone()),
            None => Ok(stream::iter(self.chunks.clone()).boxed()),
        }
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
