use std::collections::HashSet;

use tracing::{debug, warn};

use kag_core::config::LinkingSettings;
use kag_core::traits::GraphStore;
use kag_core::types::Entity;

/// Links a block of retrieved text to graph entities by exact,
/// case-insensitive name equality with its tokens.
pub struct EntityLinker<G: GraphStore> {
    store: G,
    limit: usize,
    min_token_len: usize,
}

impl<G: GraphStore> EntityLinker<G> {
    pub fn new(store: G, settings: &LinkingSettings) -> Self {
        Self { store, limit: settings.entity_limit, min_token_len: settings.min_token_len }
    }

    pub fn store(&self) -> &G {
        &self.store
    }

    /// Returns at most `entity_limit` entities. Lookup failures, including
    /// malformed stored aliases, yield an empty list.
    pub fn link(&self, content: &str) -> Vec<Entity> {
        let tokens = content_tokens(content, self.min_token_len);
        if tokens.is_empty() {
            return vec![];
        }
        match self.store.find_entities_by_names(&tokens, self.limit) {
            Ok(mut entities) => {
                entities.truncate(self.limit);
                debug!(tokens = tokens.len(), linked = entities.len(), "entity linking");
                entities
            }
            Err(e) => {
                warn!(error = %e, "entity lookup failed, continuing without entities");
                vec![]
            }
        }
    }
}

/// Lower-cased, de-duplicated word tokens of at least `min_len` characters,
/// in order of first appearance. Punctuation separates tokens.
pub fn content_tokens(content: &str, min_len: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() >= min_len)
        .map(str::to_lowercase)
        .filter(|w| seen.insert(w.clone()))
        .collect()
}
