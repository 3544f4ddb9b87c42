// modgraph-core/src/frontier/engine.rs
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use modgraph_common::config::{Config, PathNormalization};
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::frontier::{FrontierEvent, ModuleState, RunSummary};
use modgraph_common::model::ModuleIdentity;
use modgraph_net::lookup::RetryPolicy;
use modgraph_net::registry::RegistrySource;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::worker::{self, Processed, WorkerContext};
use crate::dedup::DedupSet;
use crate::store::GraphStore;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub parallelism: usize,
    /// Bound of the seed channel feeding the dispatcher.
    pub queue_capacity: usize,
    pub store_timeout: Duration,
    pub path_normalization: PathNormalization,
    /// Fetch `.info` for publish times when resolution did not provide one.
    pub with_info: bool,
    pub retry: RetryPolicy,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            parallelism: config.parallelism,
            queue_capacity: config.queue_capacity,
            store_timeout: config.store_timeout,
            path_normalization: config.path_normalization,
            with_info: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Breadth-first crawl of the dependency graph from a set of seeds.
///
/// A single dispatcher owns the frontier and keeps at most `parallelism`
/// workers in flight. Each run gets its own [`DedupSet`]; workers admit
/// requirements through it and hand the newly admitted ones back, so every
/// identity is processed at most once per run. The first persistence failure
/// cancels the run; lookup failures only skip the module concerned.
pub struct FrontierEngine {
    registry: Arc<dyn RegistrySource>,
    store: Arc<dyn GraphStore>,
    options: EngineOptions,
    events: broadcast::Sender<FrontierEvent>,
    cancel: Mutex<CancellationToken>,
}

impl FrontierEngine {
    pub fn new(
        registry: Arc<dyn RegistrySource>,
        store: Arc<dyn GraphStore>,
        options: EngineOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            store,
            options,
            events,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FrontierEvent> {
        self.events.subscribe()
    }

    /// Cancelling this token stops the current run, or the next one if none
    /// is in progress; that run then returns `Cancelled`. A cancelled run
    /// leaves a fresh token behind for the runs after it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn reset_cancellation(&self) {
        let mut cancel = self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
    }

    #[instrument(skip_all, name = "frontier_run", fields(parallelism = self.options.parallelism))]
    pub async fn run<I>(&self, seeds: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = ModuleIdentity>,
        I::IntoIter: Send + 'static,
    {
        let started = Instant::now();
        let parallelism = self.options.parallelism.max(1);
        let cancel = self.cancellation_token();
        let run_token = cancel.child_token();
        let dedup = DedupSet::new();
        let _ = self.events.send(FrontierEvent::RunStarted { parallelism });
        info!("Starting crawl with {} workers", parallelism);

        let (seed_tx, mut seed_rx) = mpsc::channel(self.options.queue_capacity.max(1));
        let producer = tokio::spawn(feed_seeds(seeds.into_iter(), seed_tx, run_token.clone()));

        let ctx = Arc::new(WorkerContext {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            dedup,
            events: self.events.clone(),
            token: run_token.clone(),
            options: self.options.clone(),
        });

        let mut frontier: VecDeque<ModuleIdentity> = VecDeque::new();
        let mut workers: JoinSet<Processed> = JoinSet::new();
        let mut seeds_open = true;
        let mut summary = RunSummary::default();
        let mut failure: Option<ModgraphError> = None;

        loop {
            if run_token.is_cancelled() {
                debug!("Run cancelled, draining {} in-flight workers", workers.len());
                break;
            }
            while workers.len() < parallelism {
                let Some(next) = frontier.pop_front() else {
                    break;
                };
                workers.spawn(worker::process_module(Arc::clone(&ctx), next));
            }
            if frontier.is_empty() && workers.is_empty() && !seeds_open {
                break;
            }

            tokio::select! {
                biased;
                _ = run_token.cancelled() => {
                    debug!("Run cancelled, draining {} in-flight workers", workers.len());
                    break;
                }
                joined = workers.join_next(), if !workers.is_empty() => {
                    let Some(joined) = joined else { continue };
                    match joined {
                        Ok(processed) => {
                            if let Some(err) = self.account(processed, &mut frontier, &mut summary) {
                                failure = Some(err);
                                run_token.cancel();
                            }
                        }
                        Err(join_err) => {
                            error!("Worker task failed: {}", join_err);
                            failure = Some(join_err.into());
                            run_token.cancel();
                        }
                    }
                }
                seed = seed_rx.recv(), if seeds_open && workers.len() < parallelism => {
                    match seed {
                        Some(seed) => self.admit_seed(&ctx.dedup, seed, &mut frontier, &mut summary),
                        None => {
                            debug!("Seed stream exhausted");
                            seeds_open = false;
                        }
                    }
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Ok(processed) = joined {
                if let Some(err) = self.account(processed, &mut frontier, &mut summary) {
                    failure.get_or_insert(err);
                }
            }
        }
        producer.abort();
        let externally_cancelled = cancel.is_cancelled();
        self.reset_cancellation();
        summary.duration_secs = started.elapsed().as_secs_f64();

        let outcome = match failure {
            Some(err) => Err(err),
            None if externally_cancelled => Err(ModgraphError::Cancelled),
            None => Ok(summary),
        };
        match &outcome {
            Ok(summary) => {
                info!(
                    "Crawl finished: {} admitted, {} processed, {} skipped in {:.2}s",
                    summary.admitted, summary.processed, summary.skipped, summary.duration_secs
                );
                let _ = self.events.send(FrontierEvent::RunFinished { summary: *summary });
            }
            Err(err) => {
                warn!("Crawl stopped after {} processed modules: {}", summary.processed, err);
                let _ = self.events.send(FrontierEvent::run_failed(err));
            }
        }
        outcome
    }

    fn admit_seed(
        &self,
        dedup: &DedupSet,
        seed: ModuleIdentity,
        frontier: &mut VecDeque<ModuleIdentity>,
        summary: &mut RunSummary,
    ) {
        let seed = seed.normalized(self.options.path_normalization);
        if dedup.admit_if_new(&seed) {
            summary.admitted += 1;
            let _ = self.events.send(FrontierEvent::ModuleAdmitted {
                module: seed.clone(),
            });
            frontier.push_back(seed);
        } else {
            debug!("Dropping duplicate seed {}", seed);
            summary.duplicates += 1;
            let _ = self.events.send(FrontierEvent::DuplicateSeed { module: seed });
        }
    }

    /// Folds a worker's result into the run; returns the error that must stop it.
    fn account(
        &self,
        processed: Processed,
        frontier: &mut VecDeque<ModuleIdentity>,
        summary: &mut RunSummary,
    ) -> Option<ModgraphError> {
        match processed.state {
            ModuleState::Done => {
                summary.processed += 1;
                summary.admitted += processed.admitted.len();
                frontier.extend(processed.admitted);
                None
            }
            ModuleState::Skipped(_) => {
                summary.skipped += 1;
                None
            }
            ModuleState::Failed(err) if matches!(*err, ModgraphError::Cancelled) => {
                debug!("{} abandoned by cancellation", processed.module);
                None
            }
            ModuleState::Failed(err) => Some((*err).clone()),
            other => {
                warn!("Worker for {} returned in non-terminal state {}", processed.module, other);
                None
            }
        }
    }
}

async fn feed_seeds<I>(seeds: I, tx: mpsc::Sender<ModuleIdentity>, token: CancellationToken)
where
    I: Iterator<Item = ModuleIdentity>,
{
    for seed in seeds {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            sent = tx.send(seed) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}
