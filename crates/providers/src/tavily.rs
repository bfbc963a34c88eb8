//! Tavily web search adapter.
//!
//! Always requests `search_depth: "advanced"`. Only `content` and `url` are
//! read from each result; entries missing either are dropped and counted in a
//! warning.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use veritas_core::error::SearchError;
use veritas_core::evidence::EvidenceItem;
use veritas_core::search::SearchProvider;

/// Verification always asks for the deep search mode.
const SEARCH_DEPTH: &str = "advanced";

pub struct TavilySearch {
    base_url: String,
    api_key: String,
    max_results: Option<u32>,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_results: None,
            client,
        })
    }

    pub fn with_max_results(mut self, max_results: Option<u32>) -> Self {
        self.max_results = max_results;
        self
    }

    fn request_body(&self, query: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "query": query,
            "search_depth": SEARCH_DEPTH,
        });
        if let Some(max_results) = self.max_results {
            body["max_results"] = serde_json::json!(max_results);
        }
        body
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<EvidenceItem>, SearchError> {
        let url = format!("{}/search", self.base_url);

        debug!(depth = SEARCH_DEPTH, query_len = query.len(), "Sending search request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(SearchError::AuthenticationFailed(
                "Invalid search API key".into(),
            ));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Search provider returned error");
            return Err(SearchError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let evidence = normalize(&body)?;
        debug!(results = evidence.len(), "Search complete");
        Ok(evidence)
    }
}

/// Reduce a raw search response to evidence, preserving provider order.
fn normalize(body: &str) -> Result<Vec<EvidenceItem>, SearchError> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

    let results = parsed
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| SearchError::MalformedResponse("missing results array".into()))?;

    let non_blank = |entry: &serde_json::Value, key: &str| {
        entry
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    let evidence: Vec<EvidenceItem> = results
        .iter()
        .filter_map(|entry| {
            let snippet = non_blank(entry, "content")?;
            let url = non_blank(entry, "url")?;
            Some(EvidenceItem { snippet, url })
        })
        .collect();

    let dropped = results.len() - evidence.len();
    if dropped > 0 {
        warn!(dropped, kept = evidence.len(), "Dropped search results missing content or url");
    }

    Ok(evidence)
}
