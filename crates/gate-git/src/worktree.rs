//! Disposable per-task worktrees.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::command::GitCli;
use crate::error::GitError;
use crate::repo::RepoHandle;

pub const DEFAULT_WORKTREE_ROOT: &str = ".gate/wt";

/// Hands out one detached worktree per task index and tears them down
/// again. Release is idempotent and safe after a partially failed
/// acquire, so callers can release unconditionally on every exit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreePool {
    git: GitCli,
    repo_root: PathBuf,
    relative_root: PathBuf,
}

impl WorktreePool {
    pub fn new(git: GitCli, repo: &RepoHandle) -> Self {
        Self {
            git,
            repo_root: repo.root.clone(),
            relative_root: PathBuf::from(DEFAULT_WORKTREE_ROOT),
        }
    }

    pub fn with_root(git: GitCli, repo: &RepoHandle, relative_root: impl Into<PathBuf>) -> Self {
        Self {
            git,
            repo_root: repo.root.clone(),
            relative_root: relative_root.into(),
        }
    }

    pub fn task_path(&self, index: usize) -> PathBuf {
        self.repo_root
            .join(&self.relative_root)
            .join(format!("task-{index}"))
    }

    /// Create a detached worktree at HEAD for the given task index.
    pub fn acquire(&self, index: usize) -> Result<PathBuf, GitError> {
        let root = self.repo_root.join(&self.relative_root);
        fs::create_dir_all(&root).map_err(|source| GitError::WorktreeRoot {
            path: root.clone(),
            source,
        })?;

        let path = self.task_path(index);
        if path.exists() {
            // Leftover from a previous interrupted run.
            self.release(&path);
        }

        let args = vec![
            OsString::from("worktree"),
            OsString::from("add"),
            OsString::from("--detach"),
            path.as_os_str().to_os_string(),
            OsString::from("HEAD"),
        ];
        self.git.run(&self.repo_root, args)?;
        Ok(path)
    }

    /// Remove a worktree. Never fails: a missing or already-released
    /// worktree is a no-op, and stray directories are swept up so a
    /// failing release cannot leak disk state into the next run.
    pub fn release(&self, path: &Path) {
        let args = vec![
            OsString::from("worktree"),
            OsString::from("remove"),
            OsString::from("--force"),
            path.as_os_str().to_os_string(),
        ];
        if let Err(err) = self.git.run(&self.repo_root, args) {
            debug!(path = %path.display(), error = %err, "worktree remove failed");
        }
        if path.exists() {
            if let Err(err) = fs::remove_dir_all(path) {
                debug!(path = %path.display(), error = %err, "worktree cleanup failed");
            }
            let _ = self.git.run(&self.repo_root, ["worktree", "prune"]);
        }
    }
}
