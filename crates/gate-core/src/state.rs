//! Live per-task status records driving the progress display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ResolvedTask, TaskStatus};

/// Mutable status record for one task. Created `pending` up front,
/// advanced through `running` into exactly one terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub name: String,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
}

impl TaskState {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::Pending,
            started_at: None,
            duration_secs: None,
        }
    }

    pub fn mark_running(&mut self, at: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.started_at = Some(at);
    }

    pub fn mark_finished(&mut self, status: TaskStatus, duration_secs: f64) {
        self.status = status;
        self.duration_secs = Some(duration_secs);
    }
}

/// One pending state per resolved task, in task order.
pub fn initial_states(tasks: &[ResolvedTask]) -> Vec<TaskState> {
    tasks
        .iter()
        .map(|task| TaskState::pending(task.name.clone()))
        .collect()
}
