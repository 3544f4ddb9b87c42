// modgraph-core/src/enrich.rs
//! `enrich-latest`: apply a `module,latest` CSV to the stored graph.
use std::io::Read;

use modgraph_common::error::Result;
use modgraph_common::model::LatestUpdate;
use tracing::{debug, info, warn};

use crate::store::GraphStore;

pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Parses `module,latest` records. The first row is a header. Records with
/// other than two fields, or whose version does not decompose, are skipped
/// with a warning.
pub fn read_latest_csv<R: Read>(reader: R) -> Result<Vec<LatestUpdate>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut updates = Vec::new();
    for (index, record) in csv.records().enumerate() {
        let record = record?;
        // +2: one for the header, one for 1-based numbering.
        let line = index + 2;
        if record.len() != 2 {
            warn!("Skipping line {}: expected 2 fields, found {}", line, record.len());
            continue;
        }
        match LatestUpdate::new(&record[0], &record[1]) {
            Ok(update) => updates.push(update),
            Err(e) => warn!("Skipping {} at line {}: {}", &record[0], line, e),
        }
    }
    debug!("Read {} latest-version records", updates.len());
    Ok(updates)
}

/// Applies `updates` in transactions of at most `batch_size` names.
/// Returns the number of nodes touched.
pub async fn apply_latest(
    store: &dyn GraphStore,
    updates: &[LatestUpdate],
    batch_size: usize,
) -> Result<usize> {
    let mut touched = 0;
    for (n, batch) in updates.chunks(batch_size.max(1)).enumerate() {
        touched += store.mark_latest(batch).await?;
        debug!("Applied batch {} ({} names)", n + 1, batch.len());
    }
    info!("Marked latest versions on {} nodes", touched);
    Ok(touched)
}
