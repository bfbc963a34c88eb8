//! Provider implementations for Veritas.
//!
//! - `tavily` implements `veritas_core::SearchProvider`
//! - `openai_compat` implements `veritas_core::ReasoningProvider`
//!
//! `builder::build_from_config` wires both from configuration.

pub mod builder;
pub mod openai_compat;
mod sse;
pub mod tavily;

pub use builder::{ProviderSet, build_from_config};
pub use openai_compat::OpenAiCompatProvider;
pub use tavily::TavilySearch;
