// modgraph/src/cli/crawl.rs
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use modgraph_common::config::{Config, PathNormalization};
use modgraph_common::error::Result;
use modgraph_common::seed::load_seed_file;
use modgraph_core::store::{GraphStore, MemoryGraphStore};
use modgraph_core::{EngineOptions, FrontierEngine};
use tracing::{info, warn};

use crate::cli::{build_registry, open_store, status};

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// File with one module per line: `path`, `path@version` or `path version`
    #[arg(long, short = 's')]
    pub seed_file: PathBuf,

    /// Concurrent workers (default: number of CPUs)
    #[arg(long, short = 'p')]
    pub parallel: Option<usize>,

    /// SQLite database to write the graph to
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Crawl into an in-memory graph that is discarded afterwards
    #[arg(long, conflicts_with = "db")]
    pub dry_run: bool,

    /// Fetch version metadata to record publish times
    #[arg(long)]
    pub with_info: bool,

    /// Keep module path case instead of lower-casing it
    #[arg(long)]
    pub preserve_case: bool,

    /// Disable the in-process lookup cache
    #[arg(long)]
    pub no_cache: bool,
}

impl CrawlArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let mut config = config.clone();
        if let Some(parallel) = self.parallel {
            config.parallelism = parallel;
        }
        if self.preserve_case {
            config.path_normalization = PathNormalization::Preserve;
        }
        config.validate()?;

        let seeds = load_seed_file(&self.seed_file)?;
        info!("Loaded {} seeds from {}", seeds.len(), self.seed_file.display());
        if seeds.is_empty() {
            warn!("Seed file {} has no modules", self.seed_file.display());
        }

        let registry = build_registry(&config, self.no_cache)?;
        let store: Arc<dyn GraphStore> = if self.dry_run {
            Arc::new(MemoryGraphStore::new())
        } else {
            open_store(&config, self.db.as_ref())?
        };

        let options = EngineOptions {
            with_info: self.with_info,
            ..EngineOptions::from_config(&config)
        };
        let engine = FrontierEngine::new(registry, Arc::clone(&store), options);
        let status_handle = tokio::spawn(status::handle_events(engine.subscribe()));

        let token = engine.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling crawl");
                token.cancel();
            }
        });

        let outcome = engine.run(seeds).await;
        interrupt.abort();
        drop(engine);
        let _ = status_handle.await;
        outcome?;

        let (nodes, edges) = store.counts().await?;
        let target = if self.dry_run { "Dry-run graph" } else { "Graph" };
        println!("{} holds {} nodes and {} edges", target.bold(), nodes, edges);
        Ok(())
    }
}
