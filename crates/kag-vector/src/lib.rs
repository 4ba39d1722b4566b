//! Vector stream of the hybrid search, backed by LanceDB.
//!
//! `writer` turns chunks plus embeddings into Arrow batches, `index` wraps a
//! table as a [`kag_core::traits::VectorIndex`], and `client` enforces the
//! query contract (fixed dimensionality, errors propagate).

mod client;
mod index;
mod schema;
mod writer;

pub use client::VectorIndexClient;
pub use index::LanceVectorIndex;
pub use schema::build_arrow_schema;
pub use writer::LanceDbIndexer;
