//! Search provider trait — the abstraction over the hosted web search API.

use async_trait::async_trait;
use crate::error::SearchError;
use crate::evidence::EvidenceItem;

/// A live web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "tavily").
    fn name(&self) -> &str;

    /// Search for `query` and return normalized evidence in provider order.
    async fn search(&self, query: &str) -> std::result::Result<Vec<EvidenceItem>, SearchError>;
}
