//! Turn-level streaming events.
//!
//! `TurnEvent` is what renderers see while a turn runs: the CLI prints them,
//! the gateway forwards them to clients over SSE.

use serde::{Deserialize, Serialize};
use veritas_core::message::Turn;
use veritas_core::provider::Usage;

use crate::phase::TurnPhase;

/// Events emitted by the orchestrator during one turn, in order:
///
/// - `user_turn`  — the user turn was appended (always first)
/// - `phase`      — the turn entered a new phase
/// - `evidence`   — search finished with this many usable results
/// - `chunk`      — a text fragment from the reasoning stream
/// - `committed`  — the assistant turn was appended (terminal)
/// - `error`      — the turn failed (terminal)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    UserTurn { turn: Turn },

    Phase { phase: TurnPhase },

    Evidence { count: usize },

    /// Partial text from the reasoning engine.
    Chunk { content: String },

    /// The complete reply as stored in the transcript.
    Committed {
        turn: Turn,
        usage: Option<Usage>,
    },

    /// `kind` is `search_unavailable` or `reasoning_unavailable`.
    Error { kind: String, message: String },
}

impl TurnEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UserTurn { .. } => "user_turn",
            Self::Phase { .. } => "phase",
            Self::Evidence { .. } => "evidence",
            Self::Chunk { .. } => "chunk",
            Self::Committed { .. } => "committed",
            Self::Error { .. } => "error",
        }
    }
}
