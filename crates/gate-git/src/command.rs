use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::GitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Thin wrapper over the git binary. Patch application pipes the patch
/// text through stdin, so the wrapper supports both plain and stdin-fed
/// invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCli {
    pub binary: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn run<I, S>(&self, cwd: &Path, args: I) -> Result<GitOutput, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_inner(cwd, args, None)
    }

    /// Run with `stdin` fed to the child before waiting for output.
    pub fn run_with_stdin<I, S>(
        &self,
        cwd: &Path,
        args: I,
        stdin: &str,
    ) -> Result<GitOutput, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_inner(cwd, args, Some(stdin))
    }

    fn run_inner<I, S>(
        &self,
        cwd: &Path,
        args: I,
        stdin: Option<&str>,
    ) -> Result<GitOutput, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let owned_args: Vec<OsString> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        let rendered = render_command(&self.binary, &owned_args);

        let mut command = Command::new(&self.binary);
        command.current_dir(cwd).args(&owned_args);
        command
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| GitError::Io {
            command: rendered.clone(),
            source,
        })?;

        if let Some(text) = stdin {
            // Taking stdin drops the handle when the write finishes, which
            // closes the pipe and lets git see end-of-input.
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(text.as_bytes())
                    .map_err(|source| GitError::Io {
                        command: rendered.clone(),
                        source,
                    })?;
            }
        }

        let output = child.wait_with_output().map_err(|source| GitError::Io {
            command: rendered.clone(),
            source,
        })?;

        let stdout =
            String::from_utf8(output.stdout).map_err(|source| GitError::NonUtf8Output {
                command: rendered.clone(),
                stream: "stdout",
                source,
            })?;
        let stderr =
            String::from_utf8(output.stderr).map_err(|source| GitError::NonUtf8Output {
                command: rendered.clone(),
                stream: "stderr",
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: rendered,
                status: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(GitOutput { stdout, stderr })
    }
}

fn render_command(binary: &Path, args: &[OsString]) -> String {
    let mut rendered = binary.to_string_lossy().into_owned();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::GitCli;
    use crate::error::GitError;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("gate-git-{prefix}-{now}"));
        fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    #[test]
    fn run_returns_stdout_for_successful_command() {
        let git = GitCli::default();
        let cwd = unique_temp_dir("ok");

        let output = git
            .run(&cwd, ["--version"])
            .expect("git --version should succeed");
        assert!(output.stdout.to_ascii_lowercase().contains("git version"));

        let _ = fs::remove_dir_all(cwd);
    }

    #[test]
    fn run_classifies_non_zero_exit_as_command_failed() {
        let git = GitCli::default();
        let cwd = unique_temp_dir("fail");

        let err = git
            .run(&cwd, ["not-a-real-subcommand"])
            .expect_err("unknown subcommand should fail");
        match err {
            GitError::CommandFailed {
                command, status, ..
            } => {
                assert!(command.contains("not-a-real-subcommand"));
                assert!(status.is_some());
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }

        let _ = fs::remove_dir_all(cwd);
    }

    #[test]
    fn run_classifies_missing_binary_as_io_error() {
        let git = GitCli::new("/definitely/missing/git-binary");
        let cwd = unique_temp_dir("io");

        let err = git.run(&cwd, ["status"]).expect_err("missing binary");
        assert!(matches!(err, GitError::Io { .. }));

        let _ = fs::remove_dir_all(cwd);
    }

    #[test]
    fn run_with_stdin_feeds_the_child() {
        let git = GitCli::default();
        let cwd = unique_temp_dir("stdin");

        // `git stripspace` echoes cleaned stdin back, proving the pipe works.
        let output = git
            .run_with_stdin(&cwd, ["stripspace"], "hello\n\n\n")
            .expect("stripspace should succeed");
        assert_eq!(output.stdout, "hello\n");

        let _ = fs::remove_dir_all(cwd);
    }
}
