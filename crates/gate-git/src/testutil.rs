//! Shared helpers for tests that need a throwaway git repository.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("gate-git-test-{prefix}-{now}"))
}

pub(crate) fn run_git(cwd: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

pub(crate) fn commit_all(root: &Path, message: &str) {
    run_git(root, &["add", "-A"]);
    run_git(
        root,
        &[
            "-c",
            "user.name=Test User",
            "-c",
            "user.email=test@example.com",
            "commit",
            "-m",
            message,
        ],
    );
}

/// Initialize a repo on `main` with one committed README.
pub(crate) fn init_repo(prefix: &str) -> PathBuf {
    let root = unique_temp_dir(prefix);
    fs::create_dir_all(&root).expect("create temp repo");
    run_git(&root, &["init", "-b", "main"]);
    fs::write(root.join("README.md"), "init\n").expect("write file");
    commit_all(&root, "init");
    root
}
