//! Decomposition of module version strings into their semantic-version parts.
//!
//! Components stay strings: ordering and validity of versions belong to the
//! upstream proxy, this only splits them for storage.
use serde::{Deserialize, Serialize};

use crate::error::{ModgraphError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemanticVersion {
    pub major: String,
    pub minor: String,
    pub patch: String,
    pub label: String,
}

impl SemanticVersion {
    /// Parses `v1.2.3`, `v1.2.3-beta.1` or `v2.0.0+meta`.
    ///
    /// The label is whatever follows the first `-`, or the first `+` when there
    /// is no `-`. What remains must have exactly three dot-separated tokens.
    pub fn parse(version: &str) -> Result<Self> {
        let trimmed = version.strip_prefix('v').unwrap_or(version);

        let (core, label) = match trimmed.split_once('-') {
            Some((core, label)) => (core, label),
            None => trimmed.split_once('+').unwrap_or((trimmed, "")),
        };

        let tokens: Vec<&str> = core.split('.').collect();
        match tokens.as_slice() {
            [major, minor, patch] => Ok(Self {
                major: (*major).to_string(),
                minor: (*minor).to_string(),
                patch: (*patch).to_string(),
                label: label.to_string(),
            }),
            _ => Err(ModgraphError::InvalidVersionFormat(core.to_string())),
        }
    }
}
