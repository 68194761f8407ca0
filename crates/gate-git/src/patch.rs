//! Two-phase patch application against the real working tree.

use gate_core::{TaskResult, TaskStatus};
use tracing::debug;

use crate::command::GitCli;
use crate::error::GitError;
use crate::repo::RepoHandle;

/// Outcome of applying one run's accumulated patches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    pub conflicts: Vec<String>,
}

impl ApplyReport {
    pub fn total(&self) -> usize {
        self.applied.len() + self.conflicts.len()
    }

    pub fn summary(&self) -> String {
        if self.total() == 0 {
            return "No patches to apply.".to_string();
        }
        let mut summary = format!("Applied {}/{} patches.", self.applied.len(), self.total());
        if !self.conflicts.is_empty() {
            summary.push_str(&format!(" {} had conflicts.", self.conflicts.len()));
        }
        summary
    }
}

/// Applies task patches to the non-isolated working tree, one at a time,
/// each validated with a dry run first so a rejected patch never mutates
/// anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchApplier {
    git: GitCli,
    repo_root: std::path::PathBuf,
}

impl PatchApplier {
    pub fn new(git: GitCli, repo: &RepoHandle) -> Self {
        Self {
            git,
            repo_root: repo.root.clone(),
        }
    }

    /// Results eligible for application: failed tasks with a real patch.
    pub fn candidates(results: &[TaskResult]) -> Vec<&TaskResult> {
        results
            .iter()
            .filter(|result| result.status == TaskStatus::Fail && result.has_patch())
            .collect()
    }

    /// Dry-run validate; on success apply for real. A conflict in either
    /// phase is recorded and never blocks the next candidate.
    pub fn apply_results(&self, results: &[TaskResult]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for candidate in Self::candidates(results) {
            match self.apply_one(&candidate.patch) {
                Ok(()) => report.applied.push(candidate.name.clone()),
                Err(err) => {
                    debug!(task = %candidate.name, error = %err, "patch rejected");
                    report.conflicts.push(candidate.name.clone());
                }
            }
        }
        report
    }

    fn apply_one(&self, patch: &str) -> Result<(), GitError> {
        self.git
            .run_with_stdin(&self.repo_root, ["apply", "--check", "-"], patch)?;
        self.git
            .run_with_stdin(&self.repo_root, ["apply", "-"], patch)?;
        Ok(())
    }
}
