// modgraph-common/src/lib.rs
pub mod config;
pub mod error;
pub mod frontier;
pub mod model;
pub mod org;
pub mod seed;
pub mod version;

// Re-export key types
pub use config::{Config, PathNormalization};
pub use error::{ModgraphError, Result};
pub use model::{DependencyManifest, ModuleIdentity, ModuleInfo, ModuleNode};
pub use version::SemanticVersion;
