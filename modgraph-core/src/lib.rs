// modgraph-core/src/lib.rs

pub mod dedup;
pub mod enrich;
pub mod frontier;
pub mod latest;
pub mod store;

pub use dedup::DedupSet;
pub use frontier::{EngineOptions, FrontierEngine};
pub use store::{GraphStore, MemoryGraphStore, SqliteGraphStore};
