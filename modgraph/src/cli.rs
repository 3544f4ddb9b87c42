// modgraph/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use modgraph_common::error::Result;
use modgraph_common::Config;
use modgraph_core::store::{GraphStore, SqliteGraphStore};
use modgraph_net::{CachedRegistry, ProxyClient, RegistrySource};
use tracing::debug;

pub mod crawl;
pub mod enrich_latest;
pub mod list_latest;
pub mod status;

use crate::cli::crawl::CrawlArgs;
use crate::cli::enrich_latest::EnrichLatestArgs;
use crate::cli::list_latest::ListLatestArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "modgraph", bin_name = "modgraph")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the dependency graph reachable from a seed file
    Crawl(CrawlArgs),
    /// Write the latest version of every stored module as CSV
    ListLatest(ListLatestArgs),
    /// Mark stored nodes with latest versions read from CSV
    EnrichLatest(EnrichLatestArgs),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Crawl(command) => command.run(config).await,
            Self::ListLatest(command) => command.run(config).await,
            Self::EnrichLatest(command) => command.run(config).await,
        }
    }
}

/// Opens the SQLite graph at `db`, or at the configured default location.
pub(crate) fn open_store(config: &Config, db: Option<&PathBuf>) -> Result<Arc<dyn GraphStore>> {
    let path = db.cloned().unwrap_or_else(|| config.db_path());
    Ok(Arc::new(SqliteGraphStore::open(&path)?))
}

/// Proxy client for the configured URL, behind a run-scoped LRU unless disabled.
pub(crate) fn build_registry(config: &Config, no_cache: bool) -> Result<Arc<dyn RegistrySource>> {
    let client = ProxyClient::from_config(config)?;
    match NonZeroUsize::new(config.cache_capacity).filter(|_| !no_cache) {
        Some(capacity) => {
            debug!("Caching registry lookups (capacity {})", capacity);
            Ok(Arc::new(CachedRegistry::new(client, capacity)))
        }
        None => Ok(Arc::new(client)),
    }
}
