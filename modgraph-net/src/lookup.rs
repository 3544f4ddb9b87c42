//! Two-tier lookups against a [`RegistrySource`].
//!
//! Every lookup asks the cached-only tier first. A `NotFound` there falls
//! through once to the authoritative tier, whose `NotFound` is final. Each
//! tier's network call is retried with exponential backoff, at most
//! `max_tries` attempts, and never for errors that are permanent
//! (`NotFound`, `InvalidManifest`).
use std::future::Future;
use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoff;
use modgraph_common::error::Result;
use modgraph_common::model::{DependencyManifest, ModuleInfo};
use tracing::{debug, trace};

use crate::registry::RegistrySource;

/// Maximum attempts per tier (3 attempts = 2 retries)
pub const DEFAULT_MAX_TRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// No sleeping between attempts; used by tests.
    pub fn immediate(max_tries: u32) -> Self {
        Self {
            max_tries,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            randomization_factor: if self.initial_interval.is_zero() { 0.0 } else { 0.5 },
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `op` with exponential backoff, giving up after `max_tries` attempts
/// or on the first permanent error.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_tries = policy.max_tries.max(1);
    let mut attempt: u32 = 0;

    retry(policy.backoff(), || {
        attempt += 1;
        let current = attempt;
        let fut = op();
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(e) if e.is_permanent() || current >= max_tries => {
                    Err(backoff::Error::permanent(e))
                }
                Err(e) => {
                    debug!(
                        "{} failed (attempt {}/{}), retrying: {}",
                        what, current, max_tries, e
                    );
                    Err(backoff::Error::transient(e))
                }
            }
        }
    })
    .await
}

async fn two_tier<T, F, Fut>(policy: &RetryPolicy, what: &str, mut call: F) -> Result<T>
where
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    trace!("{}: querying cached-only tier", what);
    match with_backoff(policy, what, || call(true)).await {
        Err(e) if e.is_not_found() => {
            debug!("{}: not in upstream cache, querying authoritative tier", what);
            with_backoff(policy, what, || call(false)).await
        }
        other => other,
    }
}

pub async fn latest_info<R>(source: &R, policy: &RetryPolicy, path: &str) -> Result<ModuleInfo>
where
    R: RegistrySource + ?Sized,
{
    let what = format!("latest info for {path}");
    two_tier(policy, &what, |cached_only| source.latest_info(path, cached_only)).await
}

pub async fn info<R>(source: &R, policy: &RetryPolicy, path: &str, version: &str) -> Result<ModuleInfo>
where
    R: RegistrySource + ?Sized,
{
    let what = format!("info for {path}@{version}");
    two_tier(policy, &what, |cached_only| source.info(path, version, cached_only)).await
}

pub async fn manifest<R>(
    source: &R,
    policy: &RetryPolicy,
    path: &str,
    version: &str,
) -> Result<DependencyManifest>
where
    R: RegistrySource + ?Sized,
{
    let what = format!("manifest for {path}@{version}");
    two_tier(policy, &what, |cached_only| {
        source.manifest(path, version, cached_only)
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use modgraph_common::error::ModgraphError;

    use super::*;

    /// Replays scripted answers and records every call as `(kind, cached_only)`.
    #[derive(Default)]
    struct ScriptedSource {
        cached: Mutex<Vec<Result<ModuleInfo>>>,
        authoritative: Mutex<Vec<Result<ModuleInfo>>>,
        calls: Mutex<Vec<bool>>,
    }

    impl ScriptedSource {
        fn new(cached: Vec<Result<ModuleInfo>>, authoritative: Vec<Result<ModuleInfo>>) -> Self {
            Self {
                cached: Mutex::new(cached),
                authoritative: Mutex::new(authoritative),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<bool> {
            self.calls.lock().unwrap().clone()
        }

        fn next(&self, cached_only: bool) -> Result<ModuleInfo> {
            self.calls.lock().unwrap().push(cached_only);
            let queue = if cached_only { &self.cached } else { &self.authoritative };
            let mut queue = queue.lock().unwrap();
            if queue.is_empty() {
                return Err(ModgraphError::Generic("script exhausted".into()));
            }
            queue.remove(0)
        }
    }

    #[async_trait]
    impl RegistrySource for ScriptedSource {
        async fn latest_info(&self, _path: &str, cached_only: bool) -> Result<ModuleInfo> {
            self.next(cached_only)
        }

        async fn info(&self, _path: &str, _version: &str, cached_only: bool) -> Result<ModuleInfo> {
            self.next(cached_only)
        }

        async fn manifest(
            &self,
            _path: &str,
            _version: &str,
            _cached_only: bool,
        ) -> Result<DependencyManifest> {
            Err(ModgraphError::NotFound("no manifests here".into()))
        }
    }

    fn info_ok(version: &str) -> Result<ModuleInfo> {
        Ok(ModuleInfo {
            version: version.to_string(),
            published_at: None,
            origin: None,
        })
    }

    fn not_found() -> Result<ModuleInfo> {
        Err(ModgraphError::NotFound("example.com/a".into()))
    }

    fn timeout() -> Result<ModuleInfo> {
        Err(ModgraphError::Timeout("example.com/a".into()))
    }

    #[tokio::test]
    async fn cached_hit_skips_authoritative_tier() {
        let source = ScriptedSource::new(vec![info_ok("v1.0.0")], vec![]);
        let info = latest_info(&source, &RetryPolicy::immediate(3), "example.com/a")
            .await
            .unwrap();
        assert_eq!(info.version, "v1.0.0");
        assert_eq!(source.calls(), vec![true]);
    }

    #[tokio::test]
    async fn cached_miss_falls_back_once() {
        let source = ScriptedSource::new(vec![not_found()], vec![info_ok("v2.0.0")]);
        let info = latest_info(&source, &RetryPolicy::immediate(3), "example.com/a")
            .await
            .unwrap();
        assert_eq!(info.version, "v2.0.0");
        assert_eq!(source.calls(), vec![true, false]);
    }

    #[tokio::test]
    async fn authoritative_not_found_is_terminal() {
        let source = ScriptedSource::new(vec![not_found()], vec![not_found(), info_ok("v9.9.9")]);
        let err = latest_info(&source, &RetryPolicy::immediate(3), "example.com/a")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(source.calls(), vec![true, false]);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_up_to_max_tries() {
        let source = ScriptedSource::new(vec![timeout(), timeout(), info_ok("v1.1.0")], vec![]);
        let info = info(&source, &RetryPolicy::immediate(3), "example.com/a", "v1.1.0")
            .await
            .unwrap();
        assert_eq!(info.version, "v1.1.0");
        assert_eq!(source.calls(), vec![true, true, true]);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error_without_fallback() {
        let source = ScriptedSource::new(
            vec![timeout(), timeout(), timeout(), info_ok("v1.0.0")],
            vec![info_ok("v1.0.0")],
        );
        let err = latest_info(&source, &RetryPolicy::immediate(3), "example.com/a")
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(source.calls(), vec![true, true, true]);
    }

    #[tokio::test]
    async fn manifest_not_found_on_both_tiers() {
        let source = ScriptedSource::default();
        let err = manifest(&source, &RetryPolicy::immediate(3), "example.com/a", "v1.0.0")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
