// modgraph-common/src/config.rs
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use tracing::debug;

use super::error::{ModgraphError, Result};

const DEFAULT_PROXY_URL: &str = "https://proxy.golang.org";
const DEFAULT_FALLBACK_DATA_DIR: &str = "./data";
const DEFAULT_QUEUE_CAPACITY: usize = 1_000;
const DEFAULT_CACHE_CAPACITY: usize = 1_000;
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);
const DB_FILENAME: &str = "modgraph.sqlite";

/// How module paths are normalized before they reach the dedup set and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathNormalization {
    #[default]
    Lowercase,
    Preserve,
}

impl PathNormalization {
    pub fn apply(&self, path: &str) -> String {
        match self {
            PathNormalization::Lowercase => path.to_lowercase(),
            PathNormalization::Preserve => path.to_string(),
        }
    }
}

impl FromStr for PathNormalization {
    type Err = ModgraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowercase" | "lower" => Ok(PathNormalization::Lowercase),
            "preserve" | "none" => Ok(PathNormalization::Preserve),
            other => Err(ModgraphError::Config(format!(
                "unknown path case policy '{other}' (expected 'lowercase' or 'preserve')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub proxy_url: String,
    pub parallelism: usize,
    pub queue_capacity: usize,
    pub cache_capacity: usize,
    pub http_timeout: Duration,
    pub store_timeout: Duration,
    pub path_normalization: PathNormalization,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading modgraph configuration");

        let data_dir = env::var("MODGRAPH_DATA_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                ProjectDirs::from("", "", "modgraph").map(|dirs| dirs.data_dir().to_path_buf())
            })
            .unwrap_or_else(|| {
                debug!(
                    "No platform data directory available, falling back to {}",
                    DEFAULT_FALLBACK_DATA_DIR
                );
                PathBuf::from(DEFAULT_FALLBACK_DATA_DIR)
            });
        debug!("Effective data directory: {}", data_dir.display());

        let proxy_url = env::var("MODGRAPH_PROXY_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PROXY_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let parallelism = parse_env("MODGRAPH_PARALLEL", num_cpus::get())?;
        let queue_capacity = parse_env("MODGRAPH_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?;
        let cache_capacity = parse_env("MODGRAPH_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?;
        let http_timeout = duration_env("MODGRAPH_HTTP_TIMEOUT", DEFAULT_HTTP_TIMEOUT)?;
        let store_timeout = duration_env("MODGRAPH_STORE_TIMEOUT", DEFAULT_STORE_TIMEOUT)?;
        let path_normalization = match env::var("MODGRAPH_PATH_CASE") {
            Ok(v) if !v.is_empty() => v.parse()?,
            _ => PathNormalization::default(),
        };

        let config = Self {
            data_dir,
            proxy_url,
            parallelism,
            queue_capacity,
            cache_capacity,
            http_timeout,
            store_timeout,
            path_normalization,
        };
        config.validate()?;

        debug!("Configuration loaded successfully.");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(ModgraphError::Config(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ModgraphError::Config(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILENAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_FALLBACK_DATA_DIR),
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            parallelism: num_cpus::get(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            path_normalization: PathNormalization::default(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ModgraphError::Config(format!("{key} has an invalid value: '{raw}'"))),
        _ => Ok(default),
    }
}

fn duration_env(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => humantime::parse_duration(raw.trim())
            .map_err(|e| ModgraphError::Config(format!("{key} is not a duration ('{raw}'): {e}"))),
        _ => Ok(default),
    }
}
