use std::sync::Arc;

use tracing::{info, warn};

use kag_core::traits::LanguageModel;
use kag_llm::QueryExpander;

/// Cleans raw query text and, when an expansion model is configured,
/// appends related concepts and synonyms.
pub struct QueryNormalizer {
    expander: Option<QueryExpander<Arc<dyn LanguageModel>>>,
}

impl QueryNormalizer {
    pub fn new() -> Self {
        Self { expander: None }
    }

    pub fn with_expansion(model: Arc<dyn LanguageModel>) -> Self {
        Self { expander: Some(QueryExpander::new(model)) }
    }

    pub fn expands(&self) -> bool {
        self.expander.is_some()
    }

    /// Never fails. An expansion error falls back to the cleaned text.
    pub async fn normalize(&self, raw: &str) -> String {
        let cleaned = clean(raw);
        let Some(expander) = &self.expander else {
            return cleaned;
        };
        if cleaned.is_empty() {
            return cleaned;
        }
        match expander.expand(&cleaned).await {
            Ok(terms) if !terms.is_empty() => {
                let expanded = clean(&format!("{} {}", cleaned, terms.join(" ")));
                info!(terms = terms.len(), %expanded, "expanded query");
                expanded
            }
            Ok(_) => cleaned,
            Err(e) => {
                warn!(error = %e, "query expansion failed, using cleaned query");
                cleaned
            }
        }
    }
}

impl Default for QueryNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace everything except word characters, whitespace and `? . ! ,`
/// with spaces, then collapse whitespace.
pub fn clean(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() || matches!(c, '?' | '.' | '!' | ',') { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
