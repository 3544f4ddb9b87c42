// modgraph-common/src/model/mod.rs
// Declares the modules within the model directory.
pub mod module;
pub mod node;

// Re-export
pub use module::{DependencyManifest, ModuleIdentity, ModuleInfo, Origin, Requirement};
pub use node::{LatestUpdate, ModuleNode};
