//! Live progress rendering for a task run.
//!
//! The display owns the only mutable view of task progress. It consumes
//! the scheduler's event stream on a dedicated thread and prints one
//! status line per transition to stderr, keeping stdout clean for
//! reports and patches.

use std::io::Write;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use gate_core::{initial_states, ResolvedTask, TaskEvent, TaskState, TaskStatus};

/// Spawn the display thread. It runs until every event sender is
/// dropped, then returns the final states.
pub fn spawn_display(
    tasks: &[ResolvedTask],
    events: Receiver<TaskEvent>,
    quiet: bool,
) -> JoinHandle<Vec<TaskState>> {
    let mut states = initial_states(tasks);
    thread::spawn(move || {
        let mut stderr = std::io::stderr();
        while let Ok(event) = events.recv() {
            event.apply(&mut states);
            if !quiet {
                if let Some(line) = render_transition(&event, &states) {
                    let _ = writeln!(stderr, "{line}");
                }
            }
        }
        states
    })
}

fn render_transition(event: &TaskEvent, states: &[TaskState]) -> Option<String> {
    let state = states.get(event.index())?;
    match event {
        TaskEvent::Started { .. } => Some(format!("  {} {}", status_glyph(state.status), state.name)),
        TaskEvent::Finished {
            status,
            duration_secs,
            ..
        } => Some(format!(
            "  {} {} ({})",
            status_glyph(*status),
            state.name,
            format_duration(*duration_secs)
        )),
    }
}

fn status_glyph(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "·",
        TaskStatus::Running => "…",
        TaskStatus::Pass => "✓",
        TaskStatus::Fail => "✗",
        TaskStatus::Error => "!",
    }
}

pub fn format_duration(secs: f64) -> String {
    if secs >= 60.0 {
        let minutes = (secs / 60.0).floor() as u64;
        let rest = secs - (minutes as f64) * 60.0;
        format!("{minutes}m{rest:.0}s")
    } else {
        format!("{secs:.1}s")
    }
}
