use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int64Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;
use std::path::Path;
use tracing::{debug, info};

use kag_core::traits::VectorIndex;
use kag_core::types::{DocumentChunk, RawCandidate};

use crate::schema::{CONTENT_COLUMN, DISTANCE_COLUMN, DOC_ID_COLUMN};
use crate::writer::LanceDbIndexer;

/// A LanceDB table searched by cosine distance. Similarity is reported as
/// `1 - distance`.
pub struct LanceVectorIndex {
	indexer: LanceDbIndexer,
}

impl LanceVectorIndex {
	/// Start from an empty database directory, removing any previous one.
	pub async fn create(db_dir: &Path, table_name: &str, dim: usize) -> Result<Self> {
		if db_dir.exists() { std::fs::remove_dir_all(db_dir)?; }
		std::fs::create_dir_all(db_dir)?;
		Self::open(db_dir, table_name, dim).await
	}

	pub async fn open(db_dir: &Path, table_name: &str, dim: usize) -> Result<Self> {
		let indexer = LanceDbIndexer::new(db_dir, table_name, dim).await?;
		info!(dir = %db_dir.display(), table = table_name, dim, "opened LanceDB");
		Ok(Self { indexer })
	}
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
	fn dim(&self) -> usize { self.indexer.dim }

	async fn index(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<()> {
		self.indexer.index(chunks, embeddings).await
	}

	async fn search_vec(&self, query_vec: &[f32], limit: usize) -> Result<Vec<RawCandidate>> {
		if limit == 0 { return Ok(vec![]); }
		if !self.indexer.table_exists().await? {
			debug!(table = %self.indexer.table_name, "table not created yet, nothing to search");
			return Ok(vec![]);
		}
		let table = self.indexer.db.open_table(&self.indexer.table_name).execute().await?;
		let mut stream = table
			.vector_search(query_vec.to_vec())?
			.distance_type(DistanceType::Cosine)
			.limit(limit)
			.execute()
			.await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			read_hits(&batch, &mut hits)?;
		}
		hits.sort_by(|a, b| b.raw_score.partial_cmp(&a.raw_score).unwrap_or(std::cmp::Ordering::Equal));
		debug!(hits = hits.len(), "lancedb search");
		Ok(hits)
	}
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| anyhow!("result batch is missing column '{}'", name))
}

fn read_hits(batch: &RecordBatch, hits: &mut Vec<RawCandidate>) -> Result<()> {
	let doc_ids = column::<Int64Array>(batch, DOC_ID_COLUMN)?;
	let contents = column::<StringArray>(batch, CONTENT_COLUMN)?;
	let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;
	for i in 0..batch.num_rows() {
		hits.push(RawCandidate::vector(doc_ids.value(i), contents.value(i), 1.0 - distances.value(i)));
	}
	Ok(())
}
