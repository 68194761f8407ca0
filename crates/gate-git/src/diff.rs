//! Diff provider: captures the pending change as a `DiffContext`.

use gate_core::DiffContext;
use tracing::debug;

use crate::command::GitCli;
use crate::error::GitError;
use crate::repo::{default_base_branch, RepoHandle};

/// Compute the change under verification: everything between the
/// merge-base with `base` and the current working tree, uncommitted
/// changes included.
pub fn compute_diff_context(
    repo: &RepoHandle,
    git: &GitCli,
    base: Option<&str>,
) -> Result<DiffContext, GitError> {
    let base_branch = match base {
        Some(name) => name.to_string(),
        None => default_base_branch(repo, git),
    };

    // Fall back to diffing against the base ref directly when it has no
    // merge-base with HEAD (detached checkouts, shallow clones).
    let against = match git.run(&repo.root, ["merge-base", base_branch.as_str(), "HEAD"]) {
        Ok(output) => output.stdout.trim().to_string(),
        Err(GitError::CommandFailed { .. }) => base_branch.clone(),
        Err(err) => return Err(err),
    };

    let diff = git.run(&repo.root, ["diff", against.as_str()])?.stdout;
    let changed_files = git
        .run(&repo.root, ["diff", "--name-only", against.as_str()])?
        .stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    debug!(
        base = %base_branch,
        files = changed_files.len(),
        "captured diff context"
    );

    Ok(DiffContext {
        base_branch,
        diff,
        changed_files,
    })
}
