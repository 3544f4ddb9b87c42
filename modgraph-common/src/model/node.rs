use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::org;
use crate::version::SemanticVersion;

/// A module node as persisted in the graph store, keyed by `(name, version)`.
///
/// Every other field is derived from the key or from fetched metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    pub name: String,
    pub version: String,
    pub org: Option<String>,
    pub host: String,
    pub published_at: Option<DateTime<Utc>>,
    pub semver: Option<SemanticVersion>,
}

impl ModuleNode {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        Self {
            org: org::organization(&name).map(str::to_string),
            host: org::host(&name).to_string(),
            published_at: None,
            semver: SemanticVersion::parse(&version).ok(),
            name,
            version,
        }
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }
}

/// Latest-version facts applied to every node sharing `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestUpdate {
    pub name: String,
    pub latest: String,
    pub semver: SemanticVersion,
}

impl LatestUpdate {
    pub fn new(name: impl Into<String>, latest: impl Into<String>) -> Result<Self> {
        let latest = latest.into();
        let semver = SemanticVersion::parse(&latest)?;
        Ok(Self {
            name: name.into(),
            latest,
            semver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_derives_attributes_from_key() {
        let node = ModuleNode::new("github.com/spf13/cobra", "v1.8.1-rc.1");
        assert_eq!(node.org.as_deref(), Some("spf13"));
        assert_eq!(node.host, "github.com");
        let semver = node.semver.unwrap();
        assert_eq!(semver.major, "1");
        assert_eq!(semver.label, "rc.1");
    }

    #[test]
    fn unparsable_version_leaves_semver_empty() {
        let node = ModuleNode::new("example.com/a", "master");
        assert!(node.semver.is_none());
        assert!(node.org.is_none());
    }

    #[test]
    fn latest_update_requires_valid_version() {
        assert!(LatestUpdate::new("example.com/a", "v1.2.3").is_ok());
        assert!(LatestUpdate::new("example.com/a", "1.2").is_err());
    }
}
