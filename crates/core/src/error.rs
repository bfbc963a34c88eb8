//! Error types for the Veritas domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error enum; `TurnError` is the
//! typed per-turn failure returned by the orchestrator.

use thiserror::Error;

/// Errors raised while wiring Veritas together, before any turn runs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Why a single turn was abandoned.
///
/// Neither variant is ever propagated past the turn that produced it: the
/// orchestrator returns it to the caller, which renders an error notice.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error("Search unavailable: {0}")]
    SearchUnavailable(#[from] SearchError),

    #[error("Reasoning unavailable: {0}")]
    ReasoningUnavailable(#[from] ReasoningError),
}

impl TurnError {
    /// Stable machine-readable kind, used by the gateway's error events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SearchUnavailable(_) => "search_unavailable",
            Self::ReasoningUnavailable(_) => "reasoning_unavailable",
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed search response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ReasoningError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed stream payload: {0}")]
    MalformedChunk(String),
}
