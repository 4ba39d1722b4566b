use serde::Serialize;

use kag_core::config::ContextSettings;
use kag_core::types::{Relationship, SearchResult};

const ELLIPSIS: &str = "...";

/// Serialized retrieval context handed to the answer generator. One block
/// per result, in rank order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Context {
    pub query: String,
    pub blocks: Vec<String>,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn render(&self) -> String {
        self.blocks.join("\n\n")
    }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chars_per_result: usize,
}

impl ContextAssembler {
    pub fn new(settings: &ContextSettings) -> Self {
        Self { max_chars_per_result: settings.max_chars_per_result }
    }

    pub fn assemble(&self, query: &str, results: &[SearchResult]) -> Context {
        let blocks = results.iter().enumerate().map(|(rank, r)| self.block(rank + 1, r)).collect();
        Context { query: query.to_string(), blocks }
    }

    /// Graph facts come before the document text so that the budget cuts
    /// the document tail first.
    fn block(&self, rank: usize, result: &SearchResult) -> String {
        let c = &result.candidate;
        let mut out = format!("[{rank}] doc {} (score {:.3})\n", c.doc_id, c.combined_score);
        if !result.entities.is_empty() {
            let entities: Vec<String> = result.entities.iter().map(|e| format!("{} ({})", e.name, e.category)).collect();
            out.push_str(&format!("Entities: {}\n", entities.join(", ")));
        }
        if !result.relationships.is_empty() {
            let edges: Vec<String> = result.relationships.iter().map(edge_label).collect();
            out.push_str(&format!("Relationships: {}\n", edges.join("; ")));
        }
        out.push_str(&format!("Document: \"{}\"", c.content.trim()));
        truncate_chars(&out, self.max_chars_per_result)
    }
}

fn edge_label(r: &Relationship) -> String {
    let source = r.source_name.clone().unwrap_or_else(|| format!("#{}", r.source_entity_id));
    let target = r.target_name.clone().unwrap_or_else(|| format!("#{}", r.target_entity_id));
    format!("{source} -[{}]-> {target}", r.relation_type)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    if max_chars >= ELLIPSIS.len() {
        out.push_str(ELLIPSIS);
    }
    out
}
