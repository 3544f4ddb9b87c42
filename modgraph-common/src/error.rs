use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ModgraphError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("CSV Error: {0}")]
    Csv(#[from] Arc<csv::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Module Not Found: {0}")]
    NotFound(String),

    #[error("Invalid Manifest: {0}")]
    InvalidManifest(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Persistence Failure: {0}")]
    Persistence(String),

    #[error("Invalid version format: {0}")]
    InvalidVersionFormat(String),

    #[error("Seed Error at line {line}: {message}")]
    Seed { line: usize, message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl ModgraphError {
    /// Absence that no retry can fix: the module, version or manifest does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModgraphError::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            ModgraphError::Timeout(_) => true,
            ModgraphError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Errors a retry cannot change the outcome of.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ModgraphError::NotFound(_)
                | ModgraphError::InvalidManifest(_)
                | ModgraphError::Cancelled
                | ModgraphError::Config(_)
        )
    }
}

impl From<std::io::Error> for ModgraphError {
    fn from(err: std::io::Error) -> Self {
        ModgraphError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for ModgraphError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            let target = err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "request".to_string());
            return ModgraphError::Timeout(format!("{target}: {err}"));
        }
        ModgraphError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for ModgraphError {
    fn from(err: serde_json::Error) -> Self {
        ModgraphError::Json(Arc::new(err))
    }
}

impl From<csv::Error> for ModgraphError {
    fn from(err: csv::Error) -> Self {
        ModgraphError::Csv(Arc::new(err))
    }
}

impl From<rusqlite::Error> for ModgraphError {
    fn from(err: rusqlite::Error) -> Self {
        ModgraphError::Persistence(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ModgraphError {
    fn from(err: tokio::task::JoinError) -> Self {
        ModgraphError::Generic(format!("task failed to complete: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ModgraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_invalid_manifest_are_permanent() {
        assert!(ModgraphError::NotFound("example.com/a".into()).is_permanent());
        assert!(ModgraphError::InvalidManifest("bad require".into()).is_permanent());
        assert!(!ModgraphError::Timeout("slow".into()).is_permanent());
        assert!(!ModgraphError::HttpStatus {
            status: 502,
            url: "https://proxy.example/x/@latest".into()
        }
        .is_permanent());
    }

    #[test]
    fn sqlite_errors_become_persistence_failures() {
        let err: ModgraphError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, ModgraphError::Persistence(_)));
    }
}
