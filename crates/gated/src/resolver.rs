//! Task resolution: local agent scripts plus the hub catalog.
//!
//! Local agents live under `.gate/checks/` and `.gate/reviews/`, one
//! executable script per task, resolved in file-name order. The hub
//! catalog `.gate/hub.toml` contributes additional named tasks; they run
//! after the local ones and are flagged for report metadata.

use std::fs;
use std::path::{Path, PathBuf};

use gate_core::{ResolvedTask, TaskKind, TaskSource};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const HUB_CATALOG_PATH: &str = ".gate/hub.toml";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to read agent directory {path}: {source}")]
    ScanDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read hub catalog {path}: {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid hub catalog {path}: {source}")]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown {kind} task: {name}")]
    UnknownTask { kind: TaskKind, name: String },
}

#[derive(Debug, Default, Deserialize)]
struct HubCatalog {
    #[serde(default)]
    check: Vec<HubEntry>,
    #[serde(default)]
    review: Vec<HubEntry>,
}

#[derive(Debug, Deserialize)]
struct HubEntry {
    name: String,
    source: String,
}

/// Resolve the ordered task list for one kind, optionally filtered to an
/// explicit selection. Unknown selected names are an error; an empty
/// resolution is not.
pub fn resolve_tasks(
    repo_root: &Path,
    kind: TaskKind,
    only: &[String],
) -> Result<Vec<ResolvedTask>, ResolveError> {
    let mut tasks = scan_local_agents(repo_root, kind)?;
    tasks.extend(load_hub_tasks(repo_root, kind)?);
    debug!(kind = %kind, count = tasks.len(), "resolved tasks");

    if only.is_empty() {
        return Ok(tasks);
    }
    for name in only {
        if !tasks.iter().any(|t| &t.name == name) {
            return Err(ResolveError::UnknownTask {
                kind,
                name: name.clone(),
            });
        }
    }
    tasks.retain(|t| only.iter().any(|name| name == &t.name));
    Ok(tasks)
}

fn scan_local_agents(repo_root: &Path, kind: TaskKind) -> Result<Vec<ResolvedTask>, ResolveError> {
    let dir = repo_root.join(".gate").join(kind.agent_dir());
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(&dir).map_err(|source| ResolveError::ScanDir {
        path: dir.clone(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ResolveError::ScanDir {
            path: dir.clone(),
            source,
        })?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_file() && !name.starts_with('.') {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            ResolvedTask::new(name, path.to_string_lossy(), TaskSource::Local)
        })
        .collect())
}

fn load_hub_tasks(repo_root: &Path, kind: TaskKind) -> Result<Vec<ResolvedTask>, ResolveError> {
    let path = repo_root.join(HUB_CATALOG_PATH);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(&path).map_err(|source| ResolveError::CatalogRead {
        path: path.clone(),
        source,
    })?;
    let catalog: HubCatalog =
        toml::from_str(&raw).map_err(|source| ResolveError::CatalogParse { path, source })?;

    let entries = match kind {
        TaskKind::Check => catalog.check,
        TaskKind::Review => catalog.review,
    };
    Ok(entries
        .into_iter()
        .map(|entry| ResolvedTask::new(entry.name, entry.source, TaskSource::Hub))
        .collect())
}
