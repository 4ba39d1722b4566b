//! Entity/relationship graph: SQLite storage plus the two read-side
//! components used during retrieval.

mod linker;
mod resolver;
mod snapshot;
mod store;

pub use linker::{content_tokens, EntityLinker};
pub use resolver::RelationshipResolver;
pub use snapshot::{GraphLink, GraphNode, GraphSnapshot, GraphStats};
pub use store::SqliteGraphStore;
