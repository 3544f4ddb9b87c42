// modgraph/src/cli/enrich_latest.rs
use std::fs::File;
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use modgraph_common::config::Config;
use modgraph_common::error::{ModgraphError, Result};
use modgraph_core::enrich::{apply_latest, read_latest_csv, DEFAULT_BATCH_SIZE};

use crate::cli::open_store;

#[derive(Args, Debug)]
pub struct EnrichLatestArgs {
    /// CSV with a `module,latest` header, as written by `list-latest`
    pub input: PathBuf,

    /// SQLite database holding the crawled graph
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Names per store transaction
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

impl EnrichLatestArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let file = File::open(&self.input).map_err(|e| {
            ModgraphError::Config(format!("cannot open {}: {e}", self.input.display()))
        })?;
        let updates = read_latest_csv(file)?;
        let store = open_store(config, self.db.as_ref())?;
        let touched = apply_latest(&*store, &updates, self.batch_size).await?;
        println!(
            "{} {} nodes from {} latest-version records",
            "Updated".green().bold(),
            touched,
            updates.len()
        );
        Ok(())
    }
}
