//! Reasoning provider trait — the abstraction over the hosted LLM.
//!
//! A `ReasoningProvider` takes an outbound message list and returns a lazy,
//! ordered sequence of text fragments. Consumers concatenate fragments in
//! arrival order to reconstruct the full reply.
//!
//! Implementations: any OpenAI-compatible streaming endpoint (Groq by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ReasoningError;
use crate::message::{Role, Turn};

/// One entry of the outbound message list sent to the reasoning engine.
///
/// Built fresh for every request and never persisted.
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
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "llama-3.3-70b-versatile")
    pub model: String,

    /// The outbound message list
    pub messages: Vec<ChatMessage>,

    /// Temperature (kept low for factual phrasing)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Whether to stream the response
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_stream() -> bool {
    true
}

impl CompletionRequest {
    /// A streaming request with the default (low) temperature.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            stream: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Token usage information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: false,
            usage: None,
        }
    }

    pub fn done(usage: Option<Usage>) -> Self {
        Self {
            content: None,
            done: true,
            usage,
        }
    }
}

/// The lazy fragment sequence returned by a reasoning provider.
///
/// Dropping the receiver cancels the stream: the producing task stops at its
/// next send.
pub type FragmentReceiver =
    tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ReasoningError>>;

/// The reasoning engine trait.
///
/// The orchestrator calls `complete()` without knowing which hosted model is
/// behind it. Single pass: implementations never retry.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "groq").
    fn name(&self) -> &str;

    /// Send a request and get a stream of response chunks.
    ///
    /// Errors before the first byte (transport, auth, non-success status) are
    /// returned directly; errors mid-stream arrive as `Err` items.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<FragmentReceiver, ReasoningError>;
}
