//! Hybrid retrieval pipeline: normalize the query, search both indexes,
//! merge their scores, link graph entities, assemble context and optionally
//! generate an answer.

pub mod context;
pub mod debug;
pub mod engine;
pub mod merge;
pub mod normalize;

pub use context::{Context, ContextAssembler};
pub use debug::DebugSink;
pub use engine::{EngineComponents, HybridSearchEngine};
pub use merge::ResultMerger;
pub use normalize::QueryNormalizer;
