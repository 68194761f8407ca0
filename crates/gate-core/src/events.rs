//! State-update events flowing from the scheduler to the display.
//!
//! The scheduler never shares a mutable state array across threads; it
//! sends one event per transition and the display adapter owns its own
//! `Vec<TaskState>` copy, applying events as they arrive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::TaskState;
use crate::types::TaskStatus;

/// One task lifecycle transition, keyed by position in the task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum TaskEvent {
    Started {
        index: usize,
        at: DateTime<Utc>,
    },
    Finished {
        index: usize,
        status: TaskStatus,
        duration_secs: f64,
    },
}

impl TaskEvent {
    pub fn started(index: usize) -> Self {
        TaskEvent::Started {
            index,
            at: Utc::now(),
        }
    }

    pub fn finished(index: usize, status: TaskStatus, duration_secs: f64) -> Self {
        TaskEvent::Finished {
            index,
            status,
            duration_secs,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            TaskEvent::Started { index, .. } | TaskEvent::Finished { index, .. } => *index,
        }
    }

    /// Apply this event to an owned state list. Events for indices outside
    /// the list are ignored rather than panicking the display.
    pub fn apply(&self, states: &mut [TaskState]) {
        let Some(state) = states.get_mut(self.index()) else {
            return;
        };
        match self {
            TaskEvent::Started { at, .. } => state.mark_running(*at),
            TaskEvent::Finished {
                status,
                duration_secs,
                ..
            } => state.mark_finished(*status, *duration_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_states(names: &[&str]) -> Vec<TaskState> {
        names.iter().map(|n| TaskState::pending(*n)).collect()
    }

    #[test]
    fn started_event_marks_running_with_timestamp() {
        let mut states = mk_states(&["lint", "types"]);
        TaskEvent::started(1).apply(&mut states);

        assert_eq!(states[0].status, TaskStatus::Pending);
        assert_eq!(states[1].status, TaskStatus::Running);
        assert!(states[1].started_at.is_some());
    }

    #[test]
    fn finished_event_records_status_and_duration() {
        let mut states = mk_states(&["lint"]);
        TaskEvent::started(0).apply(&mut states);
        TaskEvent::finished(0, TaskStatus::Error, 1.5).apply(&mut states);

        assert_eq!(states[0].status, TaskStatus::Error);
        assert_eq!(states[0].duration_secs, Some(1.5));
    }

    #[test]
    fn out_of_range_event_is_ignored() {
        let mut states = mk_states(&["lint"]);
        TaskEvent::finished(5, TaskStatus::Pass, 0.1).apply(&mut states);
        assert_eq!(states[0].status, TaskStatus::Pending);
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_string(&TaskEvent::finished(2, TaskStatus::Pass, 0.5))
            .expect("serialize");
        assert!(json.contains("\"event\":\"finished\""));
        assert!(json.contains("\"status\":\"pass\""));
    }
}
