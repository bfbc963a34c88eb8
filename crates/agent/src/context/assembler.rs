//! Context assembly for a single verification request.
//!
//! # Determinism
//!
//! Assembly is a pure function of the transcript, the query, and the
//! evidence list. Stored turns are never mutated: evidence is injected into
//! a copy of the final entry only.

use serde::{Deserialize, Serialize};
use veritas_config::ContextConfig;
use veritas_core::evidence::EvidenceItem;
use veritas_core::message::Transcript;
use veritas_core::provider::ChatMessage;

use crate::prompt::SYSTEM_PROMPT;

/// Default number of trailing transcript turns sent with each request.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Default per-item evidence rendering.
pub const DEFAULT_EVIDENCE_TEMPLATE: &str = "- {snippet} (URL: {url})";

/// The assembled outbound message list, ready for a reasoning call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// System turn first, then the window with evidence injected into the last entry.
    pub messages: Vec<ChatMessage>,
    pub metadata: AssemblyMetadata,
}

/// What went into the outbound list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Transcript turns included (excludes the system turn).
    pub window_turns: usize,
    /// Transcript length at assembly time.
    pub transcript_turns: usize,
    pub evidence_items: usize,
    /// Bytes of serialized evidence.
    pub evidence_bytes: usize,
}

/// The context assembler. Stateless; create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    system_prompt: String,
    window_size: usize,
    evidence_template: String,
    evidence_separator: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            evidence_template: DEFAULT_EVIDENCE_TEMPLATE.to_string(),
            evidence_separator: "\n".to_string(),
        }
    }
}

impl ContextAssembler {
    /// Create an assembler with the built-in protocol and defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assembler from the `[context]` config section.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            system_prompt: config
                .system_prompt_override
                .clone()
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
            window_size: config.window_size.max(1),
            evidence_template: config.evidence_template.clone(),
            evidence_separator: config.evidence_separator.clone(),
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    pub fn with_evidence_template(mut self, template: impl Into<String>) -> Self {
        self.evidence_template = template.into();
        self
    }

    pub fn with_evidence_separator(mut self, separator: impl Into<String>) -> Self {
        self.evidence_separator = separator.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Render each item through the template and join with the separator.
    pub fn serialize_evidence(&self, evidence: &[EvidenceItem]) -> String {
        evidence
            .iter()
            .map(|item| item.render(&self.evidence_template))
            .collect::<Vec<_>>()
            .join(&self.evidence_separator)
    }

    /// The content that replaces the final outbound entry.
    pub fn composite(&self, query: &str, serialized_evidence: &str) -> String {
        format!("USER QUERY: {query}\n\nREAL-TIME SEARCH DATA: {serialized_evidence}")
    }

    /// Build the outbound message list.
    ///
    /// The caller appends the current user turn before assembling, so the
    /// final window entry is that turn. An empty transcript gets the
    /// composite as a fresh user entry.
    pub fn assemble(
        &self,
        transcript: &Transcript,
        query: &str,
        evidence: &[EvidenceItem],
    ) -> AssembledContext {
        let window = transcript.window(self.window_size);
        let serialized = self.serialize_evidence(evidence);
        let composite = self.composite(query, &serialized);

        let mut messages = Vec::with_capacity(window.len() + 2);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(window.iter().map(ChatMessage::from));

        match messages.last_mut() {
            Some(last) if !window.is_empty() => last.content = composite,
            _ => messages.push(ChatMessage::user(composite)),
        }

        AssembledContext {
            metadata: AssemblyMetadata {
                window_turns: messages.len() - 1,
                transcript_turns: transcript.len(),
                evidence_items: evidence.len(),
                evidence_bytes: serialized.len(),
            },
            messages,
        }
    }
}
