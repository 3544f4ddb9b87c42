// modgraph-core/src/dedup.rs
use dashmap::DashSet;
use modgraph_common::model::ModuleIdentity;

/// Module identities admitted during one run. Membership only grows.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: DashSet<ModuleIdentity>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `identity` if absent. Exactly one concurrent caller per
    /// identity gets `true`.
    pub fn admit_if_new(&self, identity: &ModuleIdentity) -> bool {
        self.seen.insert(identity.clone())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
