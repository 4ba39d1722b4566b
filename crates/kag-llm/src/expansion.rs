use anyhow::Result;
use tracing::debug;

use kag_core::traits::{ChatRequest, LanguageModel};

pub const EXPANSION_INSTRUCTION: &str = "Extract and expand key concepts from the query. \
    Format: concept1 | synonym1, synonym2 | concept2 | synonym1, synonym2";

/// Asks a language model for key concepts and synonyms of a query.
pub struct QueryExpander<L: LanguageModel> {
    model: L,
}

impl<L: LanguageModel> QueryExpander<L> {
    pub fn new(model: L) -> Self {
        Self { model }
    }

    pub async fn expand(&self, query: &str) -> Result<Vec<String>> {
        let request = ChatRequest {
            system: EXPANSION_INSTRUCTION.to_string(),
            user: query.to_string(),
            max_tokens: None,
            temperature: 0.0,
        };
        let reply = self.model.complete(&request).await?;
        let terms = parse_expansion(&reply);
        debug!(model = self.model.model(), terms = terms.len(), "query expansion");
        Ok(terms)
    }
}

/// Split a `concept | synonym, synonym | concept` reply into its terms.
pub fn parse_expansion(reply: &str) -> Vec<String> {
    reply
        .split('|')
        .flat_map(|group| group.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_groups_and_synonyms() {
        let terms = parse_expansion("neural network | ANN, deep net | training |  ");
        assert_eq!(terms, vec!["neural network", "ANN", "deep net", "training"]);
    }

    #[test]
    fn empty_reply_has_no_terms() {
        assert!(parse_expansion("  |  , ").is_empty());
    }
}
