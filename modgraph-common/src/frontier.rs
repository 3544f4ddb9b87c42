// modgraph-common/src/frontier.rs
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ModgraphError;
use crate::model::ModuleIdentity;

// --- Per-module state machine ---

/// Processing state of one module identity inside a run.
#[derive(Debug, Clone)]
pub enum ModuleState {
    Pending,
    /// Looking up the latest version (only for identities without a version).
    Resolving,
    FetchingManifest,
    Persisting,
    /// Admitting direct requirements to the frontier.
    Expanding,
    Done,
    Skipped(SkipReason),
    /// Unrecoverable; fails the whole run. Arc for cheap cloning.
    Failed(Arc<ModgraphError>),
}

impl ModuleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ModuleState::Done | ModuleState::Skipped(_) | ModuleState::Failed(_)
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleState::Pending => write!(f, "pending"),
            ModuleState::Resolving => write!(f, "resolving"),
            ModuleState::FetchingManifest => write!(f, "fetching manifest"),
            ModuleState::Persisting => write!(f, "persisting"),
            ModuleState::Expanding => write!(f, "expanding"),
            ModuleState::Done => write!(f, "done"),
            ModuleState::Skipped(reason) => write!(f, "skipped ({reason})"),
            ModuleState::Failed(err) => write!(f, "failed ({err})"),
        }
    }
}

/// Why a module was dropped without failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    LatestNotFound,
    ManifestNotFound,
    InvalidManifest(String),
    NoModuleDirective,
    Timeout(String),
    Lookup(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LatestNotFound => write!(f, "latest version not found"),
            SkipReason::ManifestNotFound => write!(f, "manifest not found"),
            SkipReason::InvalidManifest(e) => write!(f, "invalid manifest: {e}"),
            SkipReason::NoModuleDirective => write!(f, "manifest has no module directive"),
            SkipReason::Timeout(e) => write!(f, "timeout: {e}"),
            SkipReason::Lookup(e) => write!(f, "lookup failed: {e}"),
        }
    }
}

// --- Events ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FrontierEvent {
    RunStarted {
        parallelism: usize,
    },
    ModuleAdmitted {
        module: ModuleIdentity,
    },
    /// A seed that was already admitted earlier in the run.
    DuplicateSeed {
        module: ModuleIdentity,
    },
    ModuleStarted {
        module: ModuleIdentity,
    },
    ModuleDone {
        module: ModuleIdentity,
        dependencies: usize,
        newly_admitted: usize,
    },
    ModuleSkipped {
        module: ModuleIdentity,
        reason: SkipReason,
    },
    RunFinished {
        summary: RunSummary,
    },
    RunFailed {
        error: String, // Keep as String for simplicity in events
    },
}

impl FrontierEvent {
    pub fn run_failed(error: &ModgraphError) -> Self {
        FrontierEvent::RunFailed {
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub admitted: usize,
    pub processed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!ModuleState::Pending.is_terminal());
        assert!(!ModuleState::Persisting.is_terminal());
        assert!(ModuleState::Done.is_terminal());
        assert!(ModuleState::Skipped(SkipReason::ManifestNotFound).is_terminal());
        assert!(ModuleState::Failed(Arc::new(ModgraphError::Cancelled)).is_terminal());
    }

    #[test]
    fn skipped_state_displays_reason() {
        let state = ModuleState::Skipped(SkipReason::NoModuleDirective);
        assert_eq!(state.to_string(), "skipped (manifest has no module directive)");
    }
}
