//! The turn orchestrator.
//!
//! Runs one user turn through search, assembly, and streaming reasoning,
//! then commits the reply. Failures are contained here and returned as a
//! typed `TurnError`; the transcript is never left with a partial reply.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use veritas_config::AppConfig;
use veritas_core::error::TurnError;
use veritas_core::message::Turn;
use veritas_core::provider::{CompletionRequest, ReasoningProvider, Usage};
use veritas_core::search::SearchProvider;
use veritas_providers::ProviderSet;

use crate::context::ContextAssembler;
use crate::phase::TurnPhase;
use crate::session::Session;
use crate::stream_event::TurnEvent;

/// A successfully committed turn.
#[derive(Debug, Clone)]
pub struct CommittedTurn {
    /// The assistant turn as appended to the transcript.
    pub turn: Turn,
    pub usage: Option<Usage>,
    pub evidence_count: usize,
    pub fragments: usize,
}

/// Composes search, context assembly, and streaming reasoning into one turn.
pub struct TurnOrchestrator {
    search: Arc<dyn SearchProvider>,
    reasoning: Arc<dyn ReasoningProvider>,
    assembler: ContextAssembler,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl TurnOrchestrator {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        reasoning: Arc<dyn ReasoningProvider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            search,
            reasoning,
            assembler: ContextAssembler::new(),
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
        }
    }

    /// Build from configuration and an already-wired provider set.
    pub fn from_config(config: &AppConfig, providers: ProviderSet) -> Self {
        Self::new(providers.search, providers.reasoning, &config.reasoning.model)
            .with_assembler(ContextAssembler::from_config(&config.context))
            .with_temperature(config.reasoning.temperature)
            .with_max_tokens(config.reasoning.max_tokens)
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Process one user turn.
    ///
    /// The user turn is appended before the search starts and stays in the
    /// transcript whatever happens next. The assistant turn is appended only
    /// once the fragment stream is exhausted without error.
    pub async fn process_turn(
        &self,
        session: &mut Session,
        input: &str,
        events: Option<&mpsc::Sender<TurnEvent>>,
    ) -> Result<CommittedTurn, TurnError> {
        let mut tracker = PhaseTracker::new(events);

        info!(
            session_id = %session.id,
            turns = session.transcript.len(),
            "Processing turn"
        );

        let user_turn = Turn::user(input);
        session.transcript.append(user_turn.clone());
        tracker.emit(TurnEvent::UserTurn { turn: user_turn }).await;

        // Searching
        tracker.advance(TurnPhase::Searching).await;
        let evidence = match self.search.search(input).await {
            Ok(evidence) => evidence,
            Err(e) => return Err(tracker.fail(e.into()).await),
        };
        debug!(provider = self.search.name(), results = evidence.len(), "Evidence retrieved");
        tracker
            .emit(TurnEvent::Evidence {
                count: evidence.len(),
            })
            .await;

        // Assembling
        tracker.advance(TurnPhase::Assembling).await;
        let context = self.assembler.assemble(&session.transcript, input, &evidence);
        debug!(
            window_turns = context.metadata.window_turns,
            evidence_bytes = context.metadata.evidence_bytes,
            "Context assembled"
        );
        let request = CompletionRequest::new(&self.model, context.messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        // Streaming
        tracker.advance(TurnPhase::Streaming).await;
        let mut fragments_rx = match self.reasoning.complete(request).await {
            Ok(rx) => rx,
            Err(e) => return Err(tracker.fail(e.into()).await),
        };

        let mut reply = String::new();
        let mut fragments = 0usize;
        let mut usage = None;

        while let Some(item) = fragments_rx.recv().await {
            match item {
                Ok(chunk) => {
                    if let Some(content) = chunk.content {
                        reply.push_str(&content);
                        fragments += 1;
                        tracker.emit(TurnEvent::Chunk { content }).await;
                    }
                    if chunk.done {
                        usage = chunk.usage;
                        break;
                    }
                }
                Err(e) => {
                    debug!(discarded_bytes = reply.len(), "Discarding partial reply");
                    return Err(tracker.fail(e.into()).await);
                }
            }
        }

        if reply.is_empty() {
            warn!(session_id = %session.id, "Reasoning stream produced no text");
        }

        // Committed
        let assistant_turn = Turn::assistant(reply);
        session.transcript.append(assistant_turn.clone());
        tracker.advance(TurnPhase::Committed).await;
        tracker
            .emit(TurnEvent::Committed {
                turn: assistant_turn.clone(),
                usage: usage.clone(),
            })
            .await;

        info!(
            session_id = %session.id,
            fragments,
            evidence = evidence.len(),
            turns = session.transcript.len(),
            "Turn committed"
        );

        Ok(CommittedTurn {
            turn: assistant_turn,
            usage,
            evidence_count: evidence.len(),
            fragments,
        })
    }
}

/// Tracks the current phase and forwards events to an optional renderer.
///
/// A closed event channel is ignored: the turn still runs to completion so
/// the transcript stays consistent.
struct PhaseTracker<'a> {
    phase: TurnPhase,
    events: Option<&'a mpsc::Sender<TurnEvent>>,
}

impl<'a> PhaseTracker<'a> {
    fn new(events: Option<&'a mpsc::Sender<TurnEvent>>) -> Self {
        Self {
            phase: TurnPhase::Idle,
            events,
        }
    }

    async fn emit(&self, event: TurnEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event).await;
        }
    }

    async fn advance(&mut self, next: TurnPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal turn transition {} -> {}",
            self.phase,
            next
        );
        debug!(from = %self.phase, to = %next, "Turn phase");
        self.phase = next;
        self.emit(TurnEvent::Phase { phase: next }).await;
    }

    async fn fail(&mut self, error: TurnError) -> TurnError {
        warn!(phase = %self.phase, kind = error.kind(), error = %error, "Turn failed");
        self.advance(TurnPhase::Failed).await;
        self.emit(TurnEvent::Error {
            kind: error.kind().to_string(),
            message: error.to_string(),
        })
        .await;
        error
    }
}
