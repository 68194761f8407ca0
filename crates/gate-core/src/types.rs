//! Core types for the gate orchestrator.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The two task domains the orchestrator runs.
///
/// A check inspects the diff for rule violations; a review performs a
/// broader code-review pass. Both share one scheduler and worker protocol;
/// the kind only selects labels and the agent directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Check,
    Review,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Check => "check",
            TaskKind::Review => "review",
        }
    }

    /// Directory under `.gate/` holding this kind's local agents.
    pub fn agent_dir(self) -> &'static str {
        match self {
            TaskKind::Check => "checks",
            TaskKind::Review => "reviews",
        }
    }

    /// Message used when a worker of this kind exceeds its deadline.
    /// Rendered from the configured timeout so an overridden deadline
    /// reports its real value.
    pub fn timeout_message(self, timeout: Duration) -> String {
        let secs = timeout.as_secs().max(1);
        if secs % 60 == 0 {
            let minutes = secs / 60;
            format!(
                "{} timed out after {} minute{}",
                self.as_str(),
                minutes,
                if minutes == 1 { "" } else { "s" }
            )
        } else {
            format!(
                "{} timed out after {} second{}",
                self.as_str(),
                secs,
                if secs == 1 { "" } else { "s" }
            )
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "check" => Ok(TaskKind::Check),
            "review" => Ok(TaskKind::Review),
            other => Err(format!(
                "invalid task kind '{other}'. valid values: check, review"
            )),
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved agent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    Hub,
    Local,
}

impl TaskSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskSource::Hub => "hub",
            TaskSource::Local => "local",
        }
    }
}

impl std::fmt::Display for TaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved unit of work. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTask {
    pub name: String,
    /// Identifier or location of the agent (a command line for local
    /// agents, a catalog entry for hub agents).
    pub source: String,
    pub source_type: TaskSource,
}

impl ResolvedTask {
    pub fn new(name: impl Into<String>, source: impl Into<String>, source_type: TaskSource) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            source_type,
        }
    }
}

/// Terminal and live status of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Pass,
    Fail,
    Error,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Pass => "pass",
            TaskStatus::Fail => "fail",
            TaskStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Pass | TaskStatus::Fail | TaskStatus::Error)
    }

    /// Derive the terminal status from a worker outcome: an error wins,
    /// then a non-empty patch means the task found something to fix.
    pub fn from_outcome(outcome: &WorkerOutcome) -> Self {
        if outcome.error.is_some() {
            TaskStatus::Error
        } else if outcome.patch.trim().is_empty() {
            TaskStatus::Pass
        } else {
            TaskStatus::Fail
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only description of the pending change, shared by every task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffContext {
    pub base_branch: String,
    pub diff: String,
    pub changed_files: Vec<String>,
}

impl DiffContext {
    /// "Nothing to verify": no textual diff and no changed files.
    pub fn is_empty(&self) -> bool {
        self.diff.trim().is_empty() && self.changed_files.is_empty()
    }
}

/// Restricted option subset forwarded into a worker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerOptions {
    pub config_path: Option<PathBuf>,
    pub org: Option<String>,
    pub rule_filter: Option<String>,
    #[serde(default)]
    pub verbose: bool,
}

/// Everything a worker process needs to run one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInput {
    pub agent_source: String,
    pub worktree_path: PathBuf,
    pub diff: DiffContext,
    #[serde(default)]
    pub options: WorkerOptions,
}

/// Raw result of one worker invocation, normalized over every ending:
/// success, timeout, abnormal exit, or spawn/transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub patch: String,
    pub agent_output: String,
    pub duration_secs: f64,
    pub error: Option<String>,
}

impl WorkerOutcome {
    pub fn success(patch: impl Into<String>, agent_output: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            patch: patch.into(),
            agent_output: agent_output.into(),
            duration_secs,
            error: None,
        }
    }

    /// An outcome that never produced a result: empty patch, no output.
    pub fn failure(message: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            patch: String::new(),
            agent_output: String::new(),
            duration_secs,
            error: Some(message.into()),
        }
    }
}

/// Final, immutable outcome of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Agent identifier, equal to the resolved task's `source`.
    pub agent: String,
    pub name: String,
    pub status: TaskStatus,
    pub patch: String,
    pub output: String,
    pub duration_secs: f64,
    pub error: Option<String>,
}

impl TaskResult {
    /// Derive the terminal result for a task from its worker outcome.
    pub fn from_outcome(task: &ResolvedTask, outcome: WorkerOutcome) -> Self {
        let status = TaskStatus::from_outcome(&outcome);
        Self {
            agent: task.source.clone(),
            name: task.name.clone(),
            status,
            patch: outcome.patch,
            output: outcome.agent_output,
            duration_secs: outcome.duration_secs,
            error: outcome.error,
        }
    }

    /// A result for a task that failed outside its worker (worktree
    /// acquisition, channel invocation, or a scheduling bug).
    pub fn from_error(task: &ResolvedTask, message: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            agent: task.source.clone(),
            name: task.name.clone(),
            status: TaskStatus::Error,
            patch: String::new(),
            output: String::new(),
            duration_secs,
            error: Some(message.into()),
        }
    }

    pub fn has_patch(&self) -> bool {
        !self.patch.trim().is_empty()
    }
}
