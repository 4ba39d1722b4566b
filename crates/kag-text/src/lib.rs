//! kag-text
//!
//! Tantivy-backed full-text stream: weighted phrase/proximity query
//! construction (`query`), the index backend (`index`) and the degrading
//! client used by the hybrid engine (`client`).

pub mod client;
pub mod index;
pub mod query;
pub mod tantivy_utils;

pub use client::TextIndexClient;
pub use index::TantivyTextIndex;
pub use query::{Clause, QueryBuilder, TextQuery};
