//! Run configuration loaded from `.gate/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = ".gate/config.toml";
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("max_workers must be greater than zero")]
    ZeroMaxWorkers,
}

/// Orchestrator configuration. Every field has a default so a repo
/// without a config file still runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Upper bound on simultaneously running workers in concurrent mode.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Hard per-worker deadline in seconds.
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,
    /// Organization identifier forwarded to workers, if any.
    #[serde(default)]
    pub org: Option<String>,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_worker_timeout_secs() -> u64 {
    DEFAULT_WORKER_TIMEOUT_SECS
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            worker_timeout_secs: DEFAULT_WORKER_TIMEOUT_SECS,
            org: None,
        }
    }
}

pub fn parse_gate_config(content: &str, path: &Path) -> Result<GateConfig, ConfigError> {
    let config: GateConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if config.max_workers == 0 {
        return Err(ConfigError::ZeroMaxWorkers);
    }
    Ok(config)
}

/// Load the config under `repo_root`, falling back to defaults when the
/// file does not exist. A present-but-broken file is an error.
pub fn load_gate_config(repo_root: &Path) -> Result<GateConfig, ConfigError> {
    let path = repo_root.join(DEFAULT_CONFIG_PATH);
    if !path.exists() {
        return Ok(GateConfig::default());
    }
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    parse_gate_config(&content, &path)
}
