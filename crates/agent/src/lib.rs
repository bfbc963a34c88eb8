//! The turn pipeline — the heart of Veritas.
//!
//! Each user turn follows a fixed sequence:
//!
//! 1. **Append** the user turn to the session transcript
//! 2. **Search** the web for evidence about the claim
//! 3. **Assemble** the outbound context (system protocol + sliding window,
//!    evidence injected into the current turn only)
//! 4. **Stream** the verdict from the reasoning engine
//! 5. **Commit** the concatenated reply as an assistant turn
//!
//! Search or reasoning failures end the turn early with a typed
//! `TurnError`; nothing partial is ever committed.

pub mod context;
pub mod orchestrator;
pub mod phase;
pub mod prompt;
pub mod session;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use context::{AssembledContext, AssemblyMetadata, ContextAssembler};
pub use orchestrator::{CommittedTurn, TurnOrchestrator};
pub use phase::TurnPhase;
pub use prompt::SYSTEM_PROMPT;
pub use session::Session;
pub use stream_event::TurnEvent;
