// modgraph-net/src/registry.rs
use async_trait::async_trait;
use modgraph_common::error::Result;
use modgraph_common::model::{DependencyManifest, ModuleInfo};

/// The three lookups the crawler needs from an upstream module registry.
///
/// `cached_only` asks the upstream to answer from its own cache: fast, but it
/// may report `NotFound` for modules an authoritative lookup would find.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn latest_info(&self, path: &str, cached_only: bool) -> Result<ModuleInfo>;

    async fn info(&self, path: &str, version: &str, cached_only: bool) -> Result<ModuleInfo>;

    async fn manifest(
        &self,
        path: &str,
        version: &str,
        cached_only: bool,
    ) -> Result<DependencyManifest>;
}
