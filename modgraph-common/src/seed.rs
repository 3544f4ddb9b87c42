// modgraph-common/src/seed.rs
// Line-oriented seed lists: `path` or `path@version`, one per line.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{ModgraphError, Result};
use crate::model::ModuleIdentity;

/// Parses one seed line. Blank lines and `#` comments yield `None`.
pub fn parse_seed_line(line: &str, line_number: usize) -> Result<Option<ModuleIdentity>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let first = fields.next().unwrap_or_default();
    let second = fields.next();
    if fields.next().is_some() {
        return Err(ModgraphError::Seed {
            line: line_number,
            message: format!("expected 'path' or 'path@version', got '{line}'"),
        });
    }

    let (path, version) = match (first.split_once('@'), second) {
        (Some((path, version)), None) => (path, version),
        (None, Some(version)) => (first, version),
        (None, None) => (first, ""),
        (Some(_), Some(_)) => {
            return Err(ModgraphError::Seed {
                line: line_number,
                message: format!("version given twice in '{line}'"),
            })
        }
    };

    if path.is_empty() {
        return Err(ModgraphError::Seed {
            line: line_number,
            message: "empty module path".to_string(),
        });
    }
    if first.contains('@') && version.is_empty() {
        return Err(ModgraphError::Seed {
            line: line_number,
            message: format!("empty version after '@' in '{line}'"),
        });
    }

    Ok(Some(ModuleIdentity::new(path, version)))
}

pub fn read_seeds<R: BufRead>(reader: R) -> Result<Vec<ModuleIdentity>> {
    let mut seeds = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(identity) = parse_seed_line(&line, index + 1)? {
            seeds.push(identity);
        }
    }
    Ok(seeds)
}

pub fn load_seed_file(path: &Path) -> Result<Vec<ModuleIdentity>> {
    debug!("Opening seed file {}", path.display());
    let file = File::open(path).map_err(|e| {
        ModgraphError::Config(format!("failed to open seed file {}: {e}", path.display()))
    })?;
    let seeds = read_seeds(BufReader::new(file))?;
    debug!("Loaded {} seed modules from {}", seeds.len(), path.display());
    Ok(seeds)
}
