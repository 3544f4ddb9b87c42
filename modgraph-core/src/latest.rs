// modgraph-core/src/latest.rs
//! `list-latest`: resolve the newest version of every stored module name.
use std::io::Write;
use std::sync::Arc;

use modgraph_common::error::Result;
use modgraph_net::lookup::{self, RetryPolicy};
use modgraph_net::registry::RegistrySource;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::store::GraphStore;

/// One `module,latest` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestVersion {
    pub module: String,
    pub latest: String,
}

/// Resolves the latest version of each stored name with at most `parallelism`
/// lookups in flight. Names the registry does not know are left out; other
/// lookup failures are logged and left out. Output is sorted by module name.
#[instrument(skip_all, fields(parallelism = parallelism))]
pub async fn list_latest(
    registry: Arc<dyn RegistrySource>,
    store: &dyn GraphStore,
    retry: &RetryPolicy,
    parallelism: usize,
) -> Result<Vec<LatestVersion>> {
    let names = store.module_names().await?;
    info!("Resolving latest versions for {} modules", names.len());

    let parallelism = parallelism.max(1);
    let mut pending = names.into_iter();
    let mut lookups: JoinSet<Option<LatestVersion>> = JoinSet::new();
    let mut resolved = Vec::new();

    loop {
        while lookups.len() < parallelism {
            let Some(name) = pending.next() else { break };
            let registry = Arc::clone(&registry);
            let retry = retry.clone();
            lookups.spawn(async move {
                match lookup::latest_info(&*registry, &retry, &name).await {
                    Ok(info) => Some(LatestVersion {
                        module: name,
                        latest: info.version,
                    }),
                    Err(e) if e.is_not_found() => {
                        debug!("No latest version for {}", name);
                        None
                    }
                    Err(e) => {
                        warn!("Could not resolve latest version of {}: {}", name, e);
                        None
                    }
                }
            });
        }
        match lookups.join_next().await {
            Some(joined) => resolved.extend(joined?),
            None => break,
        }
    }

    resolved.sort_by(|a, b| a.module.cmp(&b.module));
    Ok(resolved)
}

/// Writes `module,latest` CSV with a header row.
pub fn write_latest_csv<W: Write>(writer: W, rows: &[LatestVersion]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["module", "latest"])?;
    for row in rows {
        csv.write_record([row.module.as_str(), row.latest.as_str()])?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use modgraph_common::error::ModgraphError;
    use modgraph_common::model::{DependencyManifest, ModuleInfo, ModuleNode};

    use super::*;
    use crate::store::MemoryGraphStore;

    struct FixedLatest;

    #[async_trait]
    impl RegistrySource for FixedLatest {
        async fn latest_info(&self, path: &str, _cached_only: bool) -> Result<ModuleInfo> {
            match path {
                "example.com/gone" => Err(ModgraphError::NotFound(path.into())),
                "example.com/flaky" => Err(ModgraphError::HttpStatus {
                    status: 502,
                    url: path.into(),
                }),
                _ => Ok(ModuleInfo {
                    version: "v1.5.0".into(),
                    published_at: None,
                    origin: None,
                }),
            }
        }

        async fn info(&self, path: &str, _version: &str, cached_only: bool) -> Result<ModuleInfo> {
            self.latest_info(path, cached_only).await
        }

        async fn manifest(&self, path: &str, _v: &str, _c: bool) -> Result<DependencyManifest> {
            Err(ModgraphError::NotFound(path.into()))
        }
    }

    #[tokio::test]
    async fn unknown_and_failing_modules_are_omitted() {
        let store = MemoryGraphStore::new();
        store
            .upsert_module(
                ModuleNode::new("example.com/b", "v1.0.0"),
                vec![
                    ModuleNode::new("example.com/gone", "v0.1.0"),
                    ModuleNode::new("example.com/flaky", "v0.1.0"),
                    ModuleNode::new("example.com/a", "v1.0.0"),
                ],
            )
            .await
            .unwrap();

        let rows = list_latest(Arc::new(FixedLatest), &store, &RetryPolicy::immediate(1), 2)
            .await
            .unwrap();
        let modules: Vec<_> = rows.iter().map(|r| r.module.as_str()).collect();
        assert_eq!(modules, vec!["example.com/a", "example.com/b"]);
        assert!(rows.iter().all(|r| r.latest == "v1.5.0"));
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut out = Vec::new();
        write_latest_csv(
            &mut out,
            &[LatestVersion {
                module: "example.com/a".into(),
                latest: "v1.5.0".into(),
            }],
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "module,latest\nexample.com/a,v1.5.0\n");
    }
}
