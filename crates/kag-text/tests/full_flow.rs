use kag_core::config::SearchSettings;
use kag_core::traits::TextIndex;
use kag_core::types::{DocumentChunk, RawCandidate, SourceKind};
use kag_text::{TantivyTextIndex, TextIndexClient};
use tempfile::TempDir;

fn chunk(doc_id: i64, content: &str) -> DocumentChunk {
    DocumentChunk { doc_id, source_path: format!("/corpus/{doc_id}.txt"), content: content.to_string(), chunk_index: 0, total_chunks: 1 }
}

fn corpus() -> Vec<DocumentChunk> {
    vec![
        chunk(1, "Neural networks learn representations through gradient based optimization."),
        chunk(2, "Networks of roads connect neural hubs of the city; optimization of traffic is hard."),
        chunk(3, "Campfire cooking needs dry tinder and patience."),
        chunk(4, "Stochastic optimization methods such as Adam train deep neural networks."),
    ]
}

struct BrokenIndex;

impl TextIndex for BrokenIndex {
    fn index(&self, _chunks: &[DocumentChunk]) -> anyhow::Result<()> { Ok(()) }
    fn search_expr(&self, _expression: &str, _limit: usize) -> anyhow::Result<Vec<RawCandidate>> {
        anyhow::bail!("index unreachable")
    }
}

#[test]
fn tantivy_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let index_dir = tmp.path().join("tantivy");
    let index = TantivyTextIndex::create(&index_dir).expect("create");
    index.index(&corpus()).expect("index");

    let reopened = TantivyTextIndex::open(&index_dir).expect("open");
    let client = TextIndexClient::new(reopened, &SearchSettings::default());
    let results = client.search("\"neural networks\" optimization", 10);
    eprintln!("hits: {:?}", results.iter().map(|r| (r.doc_id, r.raw_score)).collect::<Vec<_>>());

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.source == SourceKind::Text));
    assert!(results.iter().all(|r| r.doc_id != 3), "campfire document shares no terms");
    for pair in results.windows(2) { assert!(pair[0].raw_score >= pair[1].raw_score); }
    assert!(matches!(results[0].doc_id, 1 | 4), "exact phrase matches rank first");
}

#[test]
fn limit_bounds_result_count() {
    let index = TantivyTextIndex::create_in_ram().expect("ram index");
    index.index(&corpus()).expect("index");
    let client = TextIndexClient::new(index, &SearchSettings::default());
    assert_eq!(client.search("optimization", 2).len(), 2);
    assert!(client.search("optimization", 0).is_empty());
}

#[test]
fn degenerate_query_returns_empty_without_searching() {
    let client = TextIndexClient::new(BrokenIndex, &SearchSettings::default());
    assert!(client.search("?? !! a", 10).is_empty());
}

#[test]
fn backend_failure_degrades_to_empty() {
    let client = TextIndexClient::new(BrokenIndex, &SearchSettings::default());
    assert!(client.search("optimization", 10).is_empty());
}
