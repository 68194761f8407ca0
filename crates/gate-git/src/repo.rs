use std::path::{Path, PathBuf};

use crate::command::GitCli;
use crate::error::GitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub root: PathBuf,
}

pub fn discover_repo(start_path: &Path, git: &GitCli) -> Result<RepoHandle, GitError> {
    let inside = match git.run(start_path, ["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => output.stdout.trim().eq("true"),
        Err(GitError::CommandFailed { .. }) => false,
        Err(err) => return Err(err),
    };

    if !inside {
        return Err(GitError::NotARepository {
            path: start_path.to_path_buf(),
        });
    }

    let root_raw = git.run(start_path, ["rev-parse", "--show-toplevel"])?;
    Ok(RepoHandle {
        root: PathBuf::from(root_raw.stdout.trim()),
    })
}

pub fn current_branch(repo: &RepoHandle, git: &GitCli) -> Result<String, GitError> {
    let output = git.run(&repo.root, ["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(output.stdout.trim().to_string())
}

/// Best-effort default base branch: the remote HEAD if one is configured,
/// otherwise `main`.
pub fn default_base_branch(repo: &RepoHandle, git: &GitCli) -> String {
    if let Ok(output) = git.run(
        &repo.root,
        ["symbolic-ref", "--short", "refs/remotes/origin/HEAD"],
    ) {
        let name = output.stdout.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    "main".to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{current_branch, default_base_branch, discover_repo};
    use crate::command::GitCli;
    use crate::error::GitError;
    use crate::testutil::{init_repo, unique_temp_dir};

    #[test]
    fn discover_repo_finds_root_from_nested_path() {
        let root = init_repo("discover");
        let nested = root.join("a").join("b");
        fs::create_dir_all(&nested).expect("create nested dir");

        let git = GitCli::default();
        let repo = discover_repo(&nested, &git).expect("discover repo");
        assert_eq!(repo.root, root);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn discover_repo_rejects_plain_directory() {
        let dir = unique_temp_dir("plain");
        fs::create_dir_all(&dir).expect("create plain dir");

        let git = GitCli::default();
        let err = discover_repo(&dir, &git).expect_err("expected not a repository");
        assert!(matches!(err, GitError::NotARepository { path } if path == dir));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn current_branch_resolves_in_initialized_repo() {
        let root = init_repo("branch");
        let git = GitCli::default();
        let repo = discover_repo(&root, &git).expect("discover repo");

        let branch = current_branch(&repo, &git).expect("current branch");
        assert_eq!(branch, "main");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn default_base_branch_falls_back_to_main_without_remote() {
        let root = init_repo("base");
        let git = GitCli::default();
        let repo = discover_repo(&root, &git).expect("discover repo");

        assert_eq!(default_base_branch(&repo, &git), "main");

        let _ = fs::remove_dir_all(root);
    }
}
