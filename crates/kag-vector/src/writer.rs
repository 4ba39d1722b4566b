use anyhow::{ensure, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::{connect, Connection};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use kag_core::types::DocumentChunk;

use crate::schema::build_arrow_schema;

const BATCH_SIZE: usize = 1000;

pub struct LanceDbIndexer {
	pub(crate) db: Connection,
	pub(crate) table_name: String,
	pub(crate) dim: usize,
}

impl LanceDbIndexer {
	pub async fn new(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		let db = connect(db_path.to_string_lossy().as_ref()).execute().await?;
		Ok(Self { db, table_name: table_name.to_string(), dim })
	}

	pub async fn table_exists(&self) -> Result<bool> {
		Ok(self.db.table_names().execute().await?.contains(&self.table_name))
	}

	/// Append `chunks` with their precomputed `embeddings`, creating the
	/// table on first write.
	pub async fn index(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<()> {
		if chunks.is_empty() { info!("no chunks to index"); return Ok(()); }
		ensure!(chunks.len() == embeddings.len(), "{} chunks but {} embeddings", chunks.len(), embeddings.len());
		if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dim) {
			anyhow::bail!("embedding has {} dims, table expects {}", bad.len(), self.dim);
		}
		info!(chunks = chunks.len(), table = %self.table_name, "indexing into LanceDB");
		let pb = ProgressBar::new(chunks.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
		let pairs: Vec<(&DocumentChunk, &Vec<f32>)> = chunks.iter().zip(embeddings.iter()).collect();
		for batch in pairs.chunks(BATCH_SIZE) {
			self.insert_batch(batch).await?;
			pb.inc(batch.len() as u64);
			debug!(rows = batch.len(), "inserted batch");
		}
		pb.finish_with_message("LanceDB indexing completed");
		info!(chunks = chunks.len(), "LanceDB indexing completed");
		Ok(())
	}

	async fn insert_batch(&self, rows: &[(&DocumentChunk, &Vec<f32>)]) -> Result<()> {
		if rows.is_empty() { return Ok(()); }
		let record_batch = self.to_record_batch(rows)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if self.table_exists().await? {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}

	fn to_record_batch(&self, rows: &[(&DocumentChunk, &Vec<f32>)]) -> Result<RecordBatch> {
		let dim = i32::try_from(self.dim)?;
		let schema = build_arrow_schema(dim);
		let doc_ids: Vec<i64> = rows.iter().map(|(c, _)| c.doc_id).collect();
		let paths: Vec<String> = rows.iter().map(|(c, _)| c.source_path.clone()).collect();
		let contents: Vec<String> = rows.iter().map(|(c, _)| c.content.clone()).collect();
		let chunk_indices: Vec<i32> = rows.iter().map(|(c, _)| c.chunk_index as i32).collect();
		let total_chunks: Vec<i32> = rows.iter().map(|(c, _)| c.total_chunks as i32).collect();
		let vectors = rows.iter().map(|(_, v)| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(Int64Array::from(doc_ids)),
			Arc::new(StringArray::from(paths)),
			Arc::new(StringArray::from(contents)),
			Arc::new(Int32Array::from(chunk_indices)),
			Arc::new(Int32Array::from(total_chunks)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
		])?;
		Ok(record_batch)
	}
}
