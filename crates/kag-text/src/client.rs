use tracing::{debug, info, warn};

use kag_core::config::SearchSettings;
use kag_core::traits::TextIndex;
use kag_core::types::{RawCandidate, SourceKind};

use crate::query::{QueryBuilder, TextQuery};
use crate::tantivy_utils::CONTENT_FIELD;

/// Full-text stream of the hybrid search. Never fails: a malformed query or
/// an unreachable index yields an empty result list.
pub struct TextIndexClient<T: TextIndex> {
    index: T,
    builder: QueryBuilder,
}

impl<T: TextIndex> TextIndexClient<T> {
    pub fn new(index: T, settings: &SearchSettings) -> Self {
        Self { index, builder: QueryBuilder::new(settings) }
    }

    pub fn backend(&self) -> &T {
        &self.index
    }

    pub fn build_query(&self, query: &str) -> TextQuery {
        self.builder.build(query)
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<RawCandidate> {
        let text_query = self.build_query(query);
        if text_query.is_empty() {
            info!("no valid search terms found, skipping text search");
            return vec![];
        }
        let expression = text_query.render(CONTENT_FIELD);
        debug!(%expression, "text search expression");
        match self.index.search_expr(&expression, limit) {
            Ok(mut hits) => {
                for h in &mut hits { h.source = SourceKind::Text; }
                hits
            }
            Err(e) => {
                warn!(error = %e, "text search failed, continuing with vector results only");
                vec![]
            }
        }
    }
}
