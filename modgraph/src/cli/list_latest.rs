// modgraph/src/cli/list_latest.rs
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use modgraph_common::config::Config;
use modgraph_common::error::Result;
use modgraph_core::latest::{list_latest, write_latest_csv};
use modgraph_net::RetryPolicy;

use crate::cli::{build_registry, open_store, status};

#[derive(Args, Debug)]
pub struct ListLatestArgs {
    /// SQLite database holding the crawled graph
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// CSV file to write; stdout when omitted
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Concurrent lookups (default: number of CPUs)
    #[arg(long, short = 'p')]
    pub parallel: Option<usize>,

    /// Disable the in-process lookup cache
    #[arg(long)]
    pub no_cache: bool,
}

impl ListLatestArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let store = open_store(config, self.db.as_ref())?;
        let registry = build_registry(config, self.no_cache)?;
        let parallelism = self.parallel.unwrap_or(config.parallelism);

        let spinner = status::create_spinner("Resolving latest versions...");
        let rows = list_latest(registry, &*store, &RetryPolicy::default(), parallelism).await;
        spinner.finish_and_clear();
        let rows = rows?;

        match &self.output {
            Some(path) => {
                write_latest_csv(BufWriter::new(File::create(path)?), &rows)?;
                eprintln!(
                    "{} {} modules to {}",
                    "Wrote".green().bold(),
                    rows.len(),
                    path.display()
                );
            }
            None => write_latest_csv(io::stdout().lock(), &rows)?,
        }
        Ok(())
    }
}
