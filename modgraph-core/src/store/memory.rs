// modgraph-core/src/store/memory.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::{LatestUpdate, ModuleNode};

use super::{GraphStore, NodeKey};

#[derive(Debug, Clone)]
struct StoredNode {
    node: ModuleNode,
    latest: Option<(String, bool)>,
}

#[derive(Debug, Default)]
struct Graph {
    nodes: BTreeMap<NodeKey, StoredNode>,
    edges: BTreeSet<(NodeKey, NodeKey)>,
}

/// In-process [`GraphStore`] used by `--dry-run` and tests.
///
/// `fail_writes(true)` makes every subsequent write return `Persistence`.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graph: Mutex<Graph>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

fn key(node: &ModuleNode) -> NodeKey {
    (node.name.clone(), node.version.clone())
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `upsert_module` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn node(&self, name: &str, version: &str) -> Option<ModuleNode> {
        self.lock()
            .nodes
            .get(&(name.to_string(), version.to_string()))
            .map(|stored| stored.node.clone())
    }

    pub fn nodes(&self) -> Vec<ModuleNode> {
        self.lock().nodes.values().map(|s| s.node.clone()).collect()
    }

    pub fn edges(&self) -> Vec<(NodeKey, NodeKey)> {
        self.lock().edges.iter().cloned().collect()
    }

    pub fn latest_of(&self, name: &str, version: &str) -> Option<(String, bool)> {
        self.lock()
            .nodes
            .get(&(name.to_string(), version.to_string()))
            .and_then(|stored| stored.latest.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ModgraphError::Persistence("write rejected by store".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn upsert_module(&self, module: ModuleNode, dependencies: Vec<ModuleNode>) -> Result<()> {
        self.check_writable()?;
        let mut graph = self.lock();
        let module_key = key(&module);

        let stored = graph
            .nodes
            .entry(module_key.clone())
            .or_insert_with(|| StoredNode {
                node: module.clone(),
                latest: None,
            });
        let published_at = module.published_at.or(stored.node.published_at);
        stored.node = module.with_published_at(published_at);

        for dep in dependencies {
            let dep_key = key(&dep);
            graph.edges.insert((module_key.clone(), dep_key.clone()));
            graph.nodes.entry(dep_key).or_insert(StoredNode {
                node: dep,
                latest: None,
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn module_names(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self.lock().nodes.keys().map(|(name, _)| name.clone()).collect();
        Ok(names.into_iter().collect())
    }

    async fn mark_latest(&self, updates: &[LatestUpdate]) -> Result<usize> {
        self.check_writable()?;
        let mut graph = self.lock();
        let mut touched = 0;
        for update in updates {
            for ((name, version), stored) in graph.nodes.iter_mut() {
                if *name == update.name {
                    stored.latest = Some((update.latest.clone(), *version == update.latest));
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }

    async fn dependencies(&self, name: &str, version: &str) -> Result<Vec<NodeKey>> {
        let from = (name.to_string(), version.to_string());
        Ok(self
            .lock()
            .edges
            .iter()
            .filter(|(src, _)| *src == from)
            .map(|(_, dst)| dst.clone())
            .collect())
    }

    async fn dependents(&self, name: &str, version: &str) -> Result<Vec<NodeKey>> {
        let to = (name.to_string(), version.to_string());
        Ok(self
            .lock()
            .edges
            .iter()
            .filter(|(_, dst)| *dst == to)
            .map(|(src, _)| src.clone())
            .collect())
    }

    async fn counts(&self) -> Result<(usize, usize)> {
        let graph = self.lock();
        Ok((graph.nodes.len(), graph.edges.len()))
    }
}
