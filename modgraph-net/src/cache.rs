// modgraph-net/src/cache.rs
// Run-scoped memo of successful registry lookups.
use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use modgraph_common::error::Result;
use modgraph_common::model::{DependencyManifest, ModuleInfo};
use tracing::trace;

use crate::registry::RegistrySource;

type VersionKey = (String, String);

/// Wraps a [`RegistrySource`] with one bounded LRU per lookup kind.
///
/// Only successes are remembered; a hit from either tier answers both.
pub struct CachedRegistry<R> {
    inner: R,
    latest: Mutex<LruCache<String, ModuleInfo>>,
    info: Mutex<LruCache<VersionKey, ModuleInfo>>,
    manifests: Mutex<LruCache<VersionKey, DependencyManifest>>,
}

impl<R: RegistrySource> CachedRegistry<R> {
    pub fn new(inner: R, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            latest: Mutex::new(LruCache::new(capacity)),
            info: Mutex::new(LruCache::new(capacity)),
            manifests: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

fn lookup<K, V>(cache: &Mutex<LruCache<K, V>>, key: &K) -> Option<V>
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    cache
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(key)
        .cloned()
}

fn remember<K, V>(cache: &Mutex<LruCache<K, V>>, key: K, value: V)
where
    K: std::hash::Hash + Eq,
{
    cache
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .put(key, value);
}

#[async_trait]
impl<R: RegistrySource> RegistrySource for CachedRegistry<R> {
    async fn latest_info(&self, path: &str, cached_only: bool) -> Result<ModuleInfo> {
        let key = path.to_string();
        if let Some(hit) = lookup(&self.latest, &key) {
            trace!("latest info cache hit for {}", path);
            return Ok(hit);
        }
        let info = self.inner.latest_info(path, cached_only).await?;
        remember(&self.latest, key, info.clone());
        Ok(info)
    }

    async fn info(&self, path: &str, version: &str, cached_only: bool) -> Result<ModuleInfo> {
        let key = (path.to_string(), version.to_string());
        if let Some(hit) = lookup(&self.info, &key) {
            trace!("info cache hit for {}@{}", path, version);
            return Ok(hit);
        }
        let info = self.inner.info(path, version, cached_only).await?;
        remember(&self.info, key, info.clone());
        Ok(info)
    }

    async fn manifest(
        &self,
        path: &str,
        version: &str,
        cached_only: bool,
    ) -> Result<DependencyManifest> {
        let key = (path.to_string(), version.to_string());
        if let Some(hit) = lookup(&self.manifests, &key) {
            trace!("manifest cache hit for {}@{}", path, version);
            return Ok(hit);
        }
        let manifest = self.inner.manifest(path, version, cached_only).await?;
        remember(&self.manifests, key, manifest.clone());
        Ok(manifest)
    }
}
