use tracing::{debug, warn};

use kag_core::config::LinkingSettings;
use kag_core::traits::GraphStore;
use kag_core::types::{EntityId, Relationship};

/// Fetches edges incident to a set of linked entities.
pub struct RelationshipResolver<G: GraphStore> {
    store: G,
    limit: usize,
}

impl<G: GraphStore> RelationshipResolver<G> {
    pub fn new(store: G, settings: &LinkingSettings) -> Self {
        Self { store, limit: settings.relationship_limit }
    }

    pub fn resolve(&self, entity_ids: &[EntityId]) -> Vec<Relationship> {
        if entity_ids.is_empty() {
            return vec![];
        }
        match self.store.relationships_for(entity_ids, self.limit) {
            Ok(mut relationships) => {
                relationships.truncate(self.limit);
                debug!(entities = entity_ids.len(), relationships = relationships.len(), "resolved relationships");
                relationships
            }
            Err(e) => {
                warn!(error = %e, "relationship lookup failed, continuing without relationships");
                vec![]
            }
        }
    }
}
