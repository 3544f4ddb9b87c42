// modgraph-core/src/store/mod.rs
//! Persistence of the dependency graph.
//!
//! Nodes are keyed by `(name, version)`; a `DEPENDS_ON` edge points from a
//! dependent to one of its direct requirements. Writes are idempotent, so a
//! rerun over the same seeds leaves the graph unchanged.
use async_trait::async_trait;
use modgraph_common::error::Result;
use modgraph_common::model::{LatestUpdate, ModuleNode};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryGraphStore;
pub use sqlite::SqliteGraphStore;

/// `(name, version)` of a stored node.
pub type NodeKey = (String, String);

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upserts `module`, every node in `dependencies`, and one edge from
    /// `module` to each dependency, all or nothing.
    async fn upsert_module(&self, module: ModuleNode, dependencies: Vec<ModuleNode>) -> Result<()>;

    /// Distinct node names, sorted.
    async fn module_names(&self) -> Result<Vec<String>>;

    /// Records the latest version for every node sharing each update's name.
    /// Returns the number of nodes touched.
    async fn mark_latest(&self, updates: &[LatestUpdate]) -> Result<usize>;

    /// Direct requirements of `(name, version)`.
    async fn dependencies(&self, name: &str, version: &str) -> Result<Vec<NodeKey>>;

    /// Nodes that directly require `(name, version)`.
    async fn dependents(&self, name: &str, version: &str) -> Result<Vec<NodeKey>>;

    /// `(nodes, edges)`
    async fn counts(&self) -> Result<(usize, usize)>;
}
