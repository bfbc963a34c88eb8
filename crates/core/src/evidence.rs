//! Evidence items — search results reduced to what the prompt needs.

use serde::{Deserialize, Serialize};

/// A single search result reduced to a snippet and its source URL.
///
/// Evidence is per-turn: it feeds the outbound prompt and is never stored in
/// the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub snippet: String,
    pub url: String,
}

impl EvidenceItem {
    pub fn new(snippet: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            snippet: snippet.into(),
            url: url.into(),
        }
    }

    /// Render this item through a template with `{snippet}` and `{url}` placeholders.
    ///
    /// Single pass: placeholder-like text inside the substituted values is
    /// copied verbatim. Unknown `{...}` sequences are kept as-is.
    pub fn render(&self, template: &str) -> String {
        let mut out =
            String::with_capacity(template.len() + self.snippet.len() + self.url.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{snippet}") {
                out.push_str(&self.snippet);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{url}") {
                out.push_str(&self.url);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }

        out.push_str(rest);
        out
    }
}
