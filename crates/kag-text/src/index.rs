use anyhow::{anyhow, Result};
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, TantivyDocument};
use tracing::{debug, info};

use kag_core::traits::TextIndex;
use kag_core::types::{DocumentChunk, RawCandidate};

use crate::tantivy_utils::{build_schema, register_tokenizer, CONTENT_FIELD, DOC_ID_FIELD, SOURCE_PATH_FIELD};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

pub struct TantivyTextIndex {
	index: Index,
	doc_id_field: Field,
	content_field: Field,
	source_path_field: Field,
}

impl TantivyTextIndex {
	/// Create a fresh index in `index_dir`, wiping anything already there.
	pub fn create(index_dir: &Path) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		let index = Index::create_in_dir(index_dir, build_schema())?;
		Self::from_index(index)
	}

	pub fn open(index_dir: &Path) -> Result<Self> {
		let index = Index::open_in_dir(index_dir)?;
		Self::from_index(index)
	}

	pub fn create_in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let doc_id_field = schema.get_field(DOC_ID_FIELD)?;
		let content_field = schema.get_field(CONTENT_FIELD)?;
		let source_path_field = schema.get_field(SOURCE_PATH_FIELD)?;
		Ok(Self { index, doc_id_field, content_field, source_path_field })
	}
}

impl TextIndex for TantivyTextIndex {
	fn index(&self, chunks: &[DocumentChunk]) -> Result<()> {
		let mut index_writer = self.index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
		for c in chunks {
			index_writer.add_document(doc!(
				self.doc_id_field => c.doc_id,
				self.content_field => c.content.clone(),
				self.source_path_field => c.source_path.clone(),
			))?;
		}
		index_writer.commit()?;
		info!(chunks = chunks.len(), "tantivy index committed");
		Ok(())
	}

	fn search_expr(&self, expression: &str, limit: usize) -> Result<Vec<RawCandidate>> {
		if limit == 0 { return Ok(vec![]); }
		let reader = self.index.reader()?;
		let searcher = reader.searcher();
		let qp = QueryParser::for_index(&self.index, vec![self.content_field]);
		let q = qp.parse_query(expression)?;
		let top_docs = searcher.search(&q, &TopDocs::with_limit(limit))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let doc_id = doc.get_first(self.doc_id_field).and_then(|v| v.as_i64()).ok_or_else(|| anyhow!("stored document missing doc_id"))?;
			let content = doc.get_first(self.content_field).and_then(|v| v.as_str()).unwrap_or_default().to_string();
			hits.push(RawCandidate::text(doc_id, content, score));
		}
		debug!(hits = hits.len(), "tantivy search");
		Ok(hits)
	}
}
