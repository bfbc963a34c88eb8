//! Scripted search and reasoning providers for orchestrator tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use veritas_core::error::{ReasoningError, SearchError};
use veritas_core::evidence::EvidenceItem;
use veritas_core::provider::{
    CompletionRequest, FragmentReceiver, ReasoningProvider, StreamChunk, Usage,
};
use veritas_core::search::SearchProvider;

/// Returns the same search outcome for every query and records the queries.
pub struct StaticSearch {
    outcome: Result<Vec<EvidenceItem>, SearchError>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn ok(evidence: Vec<EvidenceItem>) -> Self {
        Self {
            outcome: Ok(evidence),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: SearchError) -> Self {
        Self {
            outcome: Err(error),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static_search"
    }

    async fn search(&self, query: &str) -> Result<Vec<EvidenceItem>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.outcome.clone()
    }
}

/// One scripted reasoning call.
pub enum Script {
    /// Items delivered on the fragment channel, in order.
    Stream(Vec<Result<StreamChunk, ReasoningError>>),
    /// `complete()` itself fails.
    Reject(ReasoningError),
}

impl Script {
    /// Fragments followed by a `done` chunk.
    pub fn fragments(parts: &[&str]) -> Self {
        let mut items: Vec<_> = parts.iter().map(|p| Ok(StreamChunk::text(*p))).collect();
        items.push(Ok(StreamChunk::done(Some(Usage {
            prompt_tokens: 10,
            completion_tokens: parts.len() as u32,
            total_tokens: 10 + parts.len() as u32,
        }))));
        Self::Stream(items)
    }

    /// Fragments followed by a mid-stream error.
    pub fn broken_after(parts: &[&str], error: ReasoningError) -> Self {
        let mut items: Vec<_> = parts.iter().map(|p| Ok(StreamChunk::text(*p))).collect();
        items.push(Err(error));
        Self::Stream(items)
    }
}

/// A reasoning provider that plays back scripts in sequence.
///
/// Panics if more calls are made than scripts provided.
pub struct ScriptedReasoning {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedReasoning {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ReasoningProvider for ScriptedReasoning {
    fn name(&self) -> &str {
        "scripted_reasoning"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<FragmentReceiver, ReasoningError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedReasoning: no more scripts");

        match script {
            Script::Reject(e) => Err(e),
            Script::Stream(items) => {
                let (tx, rx) = tokio::sync::mpsc::channel(items.len().max(1));
                for item in items {
                    tx.try_send(item).unwrap();
                }
                Ok(rx)
            }
        }
    }
}
