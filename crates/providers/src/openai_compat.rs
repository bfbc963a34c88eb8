//! OpenAI-compatible streaming reasoning provider.
//!
//! Works with: Groq (default), OpenAI, OpenRouter, Together AI, vLLM, and any
//! endpoint exposing an OpenAI-compatible `/chat/completions` SSE stream.
//!
//! Verification replies are always streamed; fragments are forwarded to the
//! caller as they arrive and the stream fails loudly on malformed payloads
//! rather than skipping them, so a truncated verdict is never mistaken for a
//! complete one.

use std::fmt::Display;
use std::ops::ControlFlow;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use veritas_core::error::ReasoningError;
use veritas_core::provider::*;

use crate::sse::{self, LineBuffer, LineError, SseLine};

/// Capacity of the fragment channel between the reader task and the consumer.
const FRAGMENT_BUFFER: usize = 64;

/// An OpenAI-compatible streaming LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ReasoningError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReasoningError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create a Groq provider (convenience constructor).
    pub fn groq(api_key: impl Into<String>) -> Result<Self, ReasoningError> {
        Self::new(
            "groq",
            "https://api.groq.com/openai/v1",
            api_key,
            Duration::from_secs(120),
        )
    }

    /// Build the JSON request body.
    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "stream": true,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<FragmentReceiver, ReasoningError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending streaming completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ReasoningError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return Err(ReasoningError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ReasoningError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Reasoning provider returned error");
            return Err(ReasoningError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let provider_name = self.name.clone();

        tokio::spawn(async move {
            pump_stream(response.bytes_stream(), tx, &provider_name).await;
        });

        Ok(rx)
    }
}

/// What a single `data:` payload contributed.
#[derive(Debug, PartialEq)]
enum DataEvent {
    /// `[DONE]` sentinel.
    Done,
    Delta {
        content: Option<String>,
        finished: bool,
        usage: Option<Usage>,
    },
}

/// Parse one `data:` payload.
fn parse_data(data: &str) -> Result<DataEvent, ReasoningError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(DataEvent::Done);
    }

    let parsed: StreamResponse = serde_json::from_str(data)
        .map_err(|e| ReasoningError::MalformedChunk(format!("{e}: {data}")))?;

    if let Some(error) = parsed.error {
        return Err(ReasoningError::ApiError {
            status_code: 200,
            message: error.message,
        });
    }

    let (content, finished) = match parsed.choices.into_iter().next() {
        Some(choice) => (
            choice.delta.content.filter(|c| !c.is_empty()),
            choice.finish_reason.is_some(),
        ),
        None => (None, false),
    };

    let usage = parsed
        .usage
        .or_else(|| parsed.x_groq.and_then(|x| x.usage))
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

    Ok(DataEvent::Delta {
        content,
        finished,
        usage,
    })
}

/// Progress of one stream, carried across lines.
#[derive(Debug, Default)]
struct PumpState {
    finished: bool,
    usage: Option<Usage>,
    fragments: usize,
}

/// Read an SSE byte stream to the end, forwarding fragments to `tx`.
///
/// Terminates with exactly one of: a `done` chunk, an `Err`, or silently when
/// the receiver has been dropped (cancellation).
async fn pump_stream<S, B, E>(
    mut byte_stream: S,
    tx: mpsc::Sender<Result<StreamChunk, ReasoningError>>,
    provider_name: &str,
) where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut lines = LineBuffer::new();
    let mut state = PumpState::default();

    while let Some(chunk_result) = byte_stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(Err(ReasoningError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
        };

        lines.push(bytes.as_ref());

        while let Some(line) = lines.next_line() {
            if forward_line(line, &mut state, &tx, provider_name).await.is_break() {
                return;
            }
        }
    }

    // The last line may arrive without a trailing newline.
    if let Some(line) = lines.finish()
        && forward_line(line, &mut state, &tx, provider_name).await.is_break()
    {
        return;
    }

    // Stream ended without [DONE]: accept it only if the model reported a finish reason.
    if state.finished {
        debug!(provider = %provider_name, fragments = state.fragments, "Stream closed after finish_reason");
        let _ = tx.send(Ok(StreamChunk::done(state.usage))).await;
    } else {
        let _ = tx
            .send(Err(ReasoningError::StreamInterrupted(
                "stream ended before completion".into(),
            )))
            .await;
    }
}

/// Handle one SSE line. `Break` means the stream is over: a terminal item was
/// sent or the receiver is gone.
async fn forward_line(
    line: Result<String, LineError>,
    state: &mut PumpState,
    tx: &mpsc::Sender<Result<StreamChunk, ReasoningError>>,
    provider_name: &str,
) -> ControlFlow<()> {
    let line = match line {
        Ok(line) => line,
        Err(e) => {
            warn!(provider = %provider_name, error = %e, "Aborting stream");
            let _ = tx.send(Err(ReasoningError::MalformedChunk(e.to_string()))).await;
            return ControlFlow::Break(());
        }
    };

    let SseLine::Data(data) = sse::classify(&line) else {
        return ControlFlow::Continue(());
    };

    match parse_data(data) {
        Ok(DataEvent::Done) => {
            debug!(provider = %provider_name, fragments = state.fragments, "Stream complete");
            let _ = tx.send(Ok(StreamChunk::done(state.usage.take()))).await;
            ControlFlow::Break(())
        }
        Ok(DataEvent::Delta {
            content,
            finished,
            usage,
        }) => {
            state.finished |= finished;
            if usage.is_some() {
                state.usage = usage;
            }
            if let Some(content) = content {
                state.fragments += 1;
                if tx.send(Ok(StreamChunk::text(content))).await.is_err() {
                    trace!(provider = %provider_name, "Receiver dropped, stopping stream");
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        }
        Err(e) => {
            warn!(provider = %provider_name, error = %e, "Aborting stream");
            let _ = tx.send(Err(e)).await;
            ControlFlow::Break(())
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    /// Groq reports usage here on the final chunk.
    #[serde(default)]
    x_groq: Option<GroqExtension>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqExtension {
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
