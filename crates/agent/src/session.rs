//! Session-scoped state.
//!
//! A `Session` is created empty, passed by `&mut` into the orchestrator for
//! each turn, and dropped when the session ends. Sessions never share a
//! transcript.

use chrono::{DateTime, Utc};
use serde::Serialize;
use veritas_core::message::{SessionId, Transcript};

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A new session with an empty transcript.
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            transcript: Transcript::new(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
