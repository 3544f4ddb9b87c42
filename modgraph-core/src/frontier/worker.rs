// modgraph-core/src/frontier/worker.rs
use std::future::Future;
use std::sync::Arc;

use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::frontier::{FrontierEvent, ModuleState, SkipReason};
use modgraph_common::model::{ModuleIdentity, ModuleNode};
use modgraph_net::lookup;
use modgraph_net::registry::RegistrySource;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use super::engine::EngineOptions;
use crate::dedup::DedupSet;
use crate::store::GraphStore;

/// Shared handles every worker of one run reads from.
pub(super) struct WorkerContext {
    pub registry: Arc<dyn RegistrySource>,
    pub store: Arc<dyn GraphStore>,
    pub dedup: DedupSet,
    pub events: broadcast::Sender<FrontierEvent>,
    pub token: CancellationToken,
    pub options: EngineOptions,
}

/// What one worker hands back to the dispatcher.
pub(super) struct Processed {
    pub module: ModuleIdentity,
    pub state: ModuleState,
    /// Requirements this worker admitted; the dispatcher queues them.
    pub admitted: Vec<ModuleIdentity>,
}

impl Processed {
    fn finished(module: ModuleIdentity, state: ModuleState) -> Self {
        Self {
            module,
            state,
            admitted: Vec::new(),
        }
    }

    fn cancelled(module: ModuleIdentity) -> Self {
        Self::finished(module, ModuleState::Failed(Arc::new(ModgraphError::Cancelled)))
    }
}

/// `None` when the run was cancelled first.
async fn unless_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

fn lookup_skip_reason(err: &ModgraphError, not_found: SkipReason) -> SkipReason {
    match err {
        ModgraphError::NotFound(_) => not_found,
        ModgraphError::InvalidManifest(msg) => SkipReason::InvalidManifest(msg.clone()),
        e if e.is_timeout() => SkipReason::Timeout(e.to_string()),
        e => SkipReason::Lookup(e.to_string()),
    }
}

fn skip(ctx: &WorkerContext, module: ModuleIdentity, err: &ModgraphError, not_found: SkipReason) -> Processed {
    let reason = lookup_skip_reason(err, not_found);
    match reason {
        SkipReason::LatestNotFound | SkipReason::ManifestNotFound | SkipReason::InvalidManifest(_) => {
            warn!("Skipping {}: {}", module, reason)
        }
        _ => error!("Skipping {}: {}", module, reason),
    }
    let _ = ctx.events.send(FrontierEvent::ModuleSkipped {
        module: module.clone(),
        reason: reason.clone(),
    });
    Processed::finished(module, ModuleState::Skipped(reason))
}

fn persistence_failure(module: &ModuleIdentity, err: ModgraphError) -> ModgraphError {
    match err {
        ModgraphError::Persistence(_) => err,
        other => ModgraphError::Persistence(format!("storing {module}: {other}")),
    }
}

/// Resolves, fetches, persists and expands one admitted identity.
#[instrument(skip_all, fields(module = %identity))]
pub(super) async fn process_module(ctx: Arc<WorkerContext>, identity: ModuleIdentity) -> Processed {
    let _ = ctx.events.send(FrontierEvent::ModuleStarted {
        module: identity.clone(),
    });
    let policy = ctx.options.path_normalization;
    let retry = &ctx.options.retry;
    let mut published_at = None;

    // Resolving
    let resolved = if identity.is_resolved() {
        identity
    } else {
        trace!("{}", ModuleState::Resolving);
        let latest =
            unless_cancelled(&ctx.token, lookup::latest_info(&*ctx.registry, retry, &identity.path))
                .await;
        match latest {
            None => return Processed::cancelled(identity),
            Some(Ok(info)) => {
                debug!("Resolved {} to {}", identity.path, info.version);
                published_at = info.published_at;
                identity.with_version(info.version)
            }
            Some(Err(e)) => return skip(&ctx, identity, &e, SkipReason::LatestNotFound),
        }
    };

    // FetchingManifest
    trace!("{}", ModuleState::FetchingManifest);
    let manifest = match unless_cancelled(
        &ctx.token,
        lookup::manifest(&*ctx.registry, retry, &resolved.path, &resolved.version),
    )
    .await
    {
        None => return Processed::cancelled(resolved),
        Some(Ok(manifest)) => manifest,
        Some(Err(e)) => return skip(&ctx, resolved, &e, SkipReason::ManifestNotFound),
    };
    let Some(declared) = manifest.module.as_ref() else {
        warn!("Skipping {}: {}", resolved, SkipReason::NoModuleDirective);
        let _ = ctx.events.send(FrontierEvent::ModuleSkipped {
            module: resolved.clone(),
            reason: SkipReason::NoModuleDirective,
        });
        return Processed::finished(resolved, ModuleState::Skipped(SkipReason::NoModuleDirective));
    };

    if ctx.options.with_info && published_at.is_none() {
        match unless_cancelled(
            &ctx.token,
            lookup::info(&*ctx.registry, retry, &resolved.path, &resolved.version),
        )
        .await
        {
            None => return Processed::cancelled(resolved),
            Some(Ok(info)) => published_at = info.published_at,
            Some(Err(e)) => debug!("No publish time for {}: {}", resolved, e),
        }
    }

    // Persisting
    trace!("{}", ModuleState::Persisting);
    let declared_path = policy.apply(&declared.path);
    if declared_path != resolved.path {
        debug!(
            "{} declares module path {}; its node is stored under the declared path",
            resolved, declared_path
        );
    }
    let node = ModuleNode::new(declared_path, resolved.version.clone())
        .with_published_at(published_at);
    let requirements: Vec<ModuleIdentity> = manifest
        .direct_requirements()
        .map(|req| req.normalized(policy))
        .collect();
    let dependency_nodes = requirements
        .iter()
        .map(|req| ModuleNode::new(req.path.clone(), req.version.clone()))
        .collect();

    let write = tokio::time::timeout(
        ctx.options.store_timeout,
        ctx.store.upsert_module(node, dependency_nodes),
    );
    let stored: Result<()> = match unless_cancelled(&ctx.token, write).await {
        None => return Processed::cancelled(resolved),
        Some(Err(_elapsed)) => Err(ModgraphError::Persistence(format!(
            "storing {} timed out after {:?}",
            resolved, ctx.options.store_timeout
        ))),
        Some(Ok(result)) => result,
    };
    if let Err(e) = stored {
        let err = persistence_failure(&resolved, e);
        error!("Failed to persist {}: {}", resolved, err);
        return Processed::finished(resolved, ModuleState::Failed(Arc::new(err)));
    }

    // Expanding
    trace!("{}", ModuleState::Expanding);
    let mut admitted = Vec::new();
    for requirement in &requirements {
        if ctx.dedup.admit_if_new(requirement) {
            let _ = ctx.events.send(FrontierEvent::ModuleAdmitted {
                module: requirement.clone(),
            });
            admitted.push(requirement.clone());
        }
    }
    debug!(
        "Processed {} ({} direct requirements, {} new)",
        resolved,
        requirements.len(),
        admitted.len()
    );
    let _ = ctx.events.send(FrontierEvent::ModuleDone {
        module: resolved.clone(),
        dependencies: requirements.len(),
        newly_admitted: admitted.len(),
    });

    Processed {
        module: resolved,
        state: ModuleState::Done,
        admitted,
    }
}
