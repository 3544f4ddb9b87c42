use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PathNormalization;

/// A module coordinate. An empty `version` means "resolve the latest version".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentity {
    pub path: String,
    pub version: String,
}

impl ModuleIdentity {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    pub fn unresolved(path: impl Into<String>) -> Self {
        Self::new(path, "")
    }

    pub fn is_resolved(&self) -> bool {
        !self.version.is_empty()
    }

    pub fn normalized(&self, policy: PathNormalization) -> Self {
        Self {
            path: policy.apply(&self.path),
            version: self.version.clone(),
        }
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self::new(self.path.clone(), version)
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}@{}", self.path, self.version)
        }
    }
}

/// Version control provenance reported by the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    #[serde(rename = "VCS", default)]
    pub vcs: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub r#ref: Option<String>,
}

/// Version metadata for a module, as served by `@latest` and `@v/<version>.info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleInfo {
    pub version: String,
    #[serde(rename = "Time", default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub origin: Option<Origin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub module: ModuleIdentity,
    pub indirect: bool,
}

/// The declared requirements of one module version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    /// Self-declared module identity; `None` when the manifest has no module directive.
    pub module: Option<ModuleIdentity>,
    pub requirements: Vec<Requirement>,
}

impl DependencyManifest {
    pub fn direct_requirements(&self) -> impl Iterator<Item = &ModuleIdentity> {
        self.requirements
            .iter()
            .filter(|r| !r.indirect)
            .map(|r| &r.module)
    }
}
