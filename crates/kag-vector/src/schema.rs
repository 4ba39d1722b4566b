use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const DOC_ID_COLUMN: &str = "doc_id";
pub const CONTENT_COLUMN: &str = "content";
pub const VECTOR_COLUMN: &str = "vector";
/// Column LanceDB adds to vector search results.
pub const DISTANCE_COLUMN: &str = "_distance";

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(DOC_ID_COLUMN, DataType::Int64, false),
		Field::new("source_path", DataType::Utf8, false),
		Field::new(CONTENT_COLUMN, DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("total_chunks", DataType::Int32, false),
		Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
