//! # Veritas Core
//!
//! Domain types, traits, and error definitions for the Veritas claim
//! verification assistant. This crate has **zero framework dependencies** —
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Both external collaborators (the web search provider and the reasoning
//! model) are defined as traits here. Implementations live in
//! `veritas-providers`. This enables:
//! - Swapping providers via configuration
//! - Testing the turn pipeline with scripted mock providers
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod evidence;
pub mod message;
pub mod provider;
pub mod search;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ReasoningError, SearchError, TurnError};
pub use evidence::EvidenceItem;
pub use message::{Role, SessionId, Transcript, Turn};
pub use provider::{
    ChatMessage, CompletionRequest, FragmentReceiver, ReasoningProvider, StreamChunk, Usage,
};
pub use search::SearchProvider;
