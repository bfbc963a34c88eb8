//! Wires the search and reasoning providers from configuration.

use std::sync::Arc;
use std::time::Duration;

use veritas_config::{AppConfig, Secrets};
use veritas_core::error::Error;
use veritas_core::provider::ReasoningProvider;
use veritas_core::search::SearchProvider;

use crate::openai_compat::OpenAiCompatProvider;
use crate::tavily::TavilySearch;

/// The two external collaborators a turn needs.
#[derive(Clone)]
pub struct ProviderSet {
    pub search: Arc<dyn SearchProvider>,
    pub reasoning: Arc<dyn ReasoningProvider>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("search", &self.search.name())
            .field("reasoning", &self.reasoning.name())
            .finish()
    }
}

/// Build providers from configuration and already-checked secrets.
pub fn build_from_config(config: &AppConfig, secrets: &Secrets) -> Result<ProviderSet, Error> {
    let search = TavilySearch::new(
        &config.search.api_url,
        &secrets.search_api_key,
        Duration::from_secs(config.search.timeout_secs),
    )
    .map_err(|e| Error::Config {
        message: e.to_string(),
    })?
    .with_max_results(config.search.max_results);

    let reasoning = OpenAiCompatProvider::new(
        provider_name_for(&config.reasoning.api_url),
        &config.reasoning.api_url,
        &secrets.reasoning_api_key,
        Duration::from_secs(config.reasoning.timeout_secs),
    )
    .map_err(|e| Error::Config {
        message: e.to_string(),
    })?;

    Ok(ProviderSet {
        search: Arc::new(search),
        reasoning: Arc::new(reasoning),
    })
}

/// Display name for well-known OpenAI-compatible hosts.
fn provider_name_for(base_url: &str) -> &'static str {
    const KNOWN: [(&str, &str); 5] = [
        ("api.groq.com", "groq"),
        ("api.openai.com", "openai"),
        ("openrouter.ai", "openrouter"),
        ("api.together.xyz", "together"),
        ("localhost", "local"),
    ];

    KNOWN
        .iter()
        .find(|(host, _)| base_url.contains(host))
        .map(|(_, name)| *name)
        .unwrap_or("openai-compat")
}
