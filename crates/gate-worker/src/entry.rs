//! Worker-side entry point.
//!
//! A worker is the same `gate` binary re-invoked as a child process. It
//! announces `ready`, receives one `run` message on stdin, executes the
//! task's agent inside the isolated worktree, and answers with a single
//! `result` message carrying the normalized outcome. Protocol traffic
//! owns stdout; everything diagnostic goes to stderr, which the parent
//! channel captures.

use std::io::{self, BufRead, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

use gate_core::{TaskKind, WorkerInput, WorkerOutcome};

use crate::error::WorkerError;
use crate::protocol::{decode_control_message, encode_line, ControlMessage, WorkerMessage};

/// Drive one worker lifecycle over the process's own stdio.
pub fn run_worker(kind: TaskKind) -> Result<(), WorkerError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    run_worker_io(kind, &mut stdin.lock(), &mut stdout)
}

fn run_worker_io<R: BufRead, W: Write>(
    kind: TaskKind,
    input_stream: &mut R,
    output_stream: &mut W,
) -> Result<(), WorkerError> {
    let ready = encode_line(&WorkerMessage::Ready).map_err(|err| WorkerError::Protocol {
        message: format!("failed to encode ready message: {err}"),
    })?;
    output_stream.write_all(ready.as_bytes())?;
    output_stream.flush()?;

    let mut line = String::new();
    let bytes = input_stream.read_line(&mut line)?;
    if bytes == 0 {
        return Err(WorkerError::Protocol {
            message: "control channel closed before run message".to_string(),
        });
    }
    let ControlMessage::Run { input } =
        decode_control_message(&line).map_err(|err| WorkerError::Protocol {
            message: format!("expected run message: {err}"),
        })?;

    let outcome = execute_agent(kind, &input);
    let result =
        encode_line(&WorkerMessage::Result { outcome }).map_err(|err| WorkerError::Protocol {
            message: format!("failed to encode result message: {err}"),
        })?;
    output_stream.write_all(result.as_bytes())?;
    output_stream.flush()?;
    Ok(())
}

/// Run the agent command in the worktree and fold every failure into the
/// outcome. The agent receives the diff on stdin and the change metadata
/// in its environment; its own exit status is advisory only — what counts
/// is the patch it leaves in the worktree.
pub fn execute_agent(kind: TaskKind, input: &WorkerInput) -> WorkerOutcome {
    let started = Instant::now();

    let mut command = Command::new("bash");
    command
        .arg("-lc")
        .arg(&input.agent_source)
        .current_dir(&input.worktree_path)
        .env("GATE_TASK_KIND", kind.as_str())
        .env("GATE_BASE_BRANCH", &input.diff.base_branch)
        .env("GATE_CHANGED_FILES", input.diff.changed_files.join("\n"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(org) = &input.options.org {
        command.env("GATE_ORG", org);
    }
    if let Some(filter) = &input.options.rule_filter {
        command.env("GATE_RULE_FILTER", filter);
    }
    if input.options.verbose {
        command.env("GATE_VERBOSE", "1");
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return WorkerOutcome::failure(
                format!("failed to start agent: {err}"),
                started.elapsed().as_secs_f64(),
            )
        }
    };

    // The diff is fed from a detached thread: writing it inline would
    // deadlock against an agent that fills its stdout pipe before reading
    // stdin. A half-written diff still lets the agent start; EOF ends it.
    if let Some(mut pipe) = child.stdin.take() {
        let diff = input.diff.diff.clone();
        thread::spawn(move || {
            let _ = pipe.write_all(diff.as_bytes());
        });
    }

    let output = match child.wait_with_output() {
        Ok(output) => output,
        Err(err) => {
            return WorkerOutcome::failure(
                format!("failed to collect agent output: {err}"),
                started.elapsed().as_secs_f64(),
            )
        }
    };

    let mut agent_output = String::from_utf8_lossy(&output.stdout).into_owned();
    let agent_stderr = String::from_utf8_lossy(&output.stderr);
    if !agent_stderr.trim().is_empty() {
        if !agent_output.is_empty() && !agent_output.ends_with('\n') {
            agent_output.push('\n');
        }
        agent_output.push_str(agent_stderr.trim_end());
    }

    let patch = match worktree_diff(input) {
        Ok(patch) => patch,
        Err(message) => {
            return WorkerOutcome::failure(message, started.elapsed().as_secs_f64());
        }
    };

    WorkerOutcome::success(patch, agent_output, started.elapsed().as_secs_f64())
}

/// The agent's proposed fix is whatever it changed in the worktree.
fn worktree_diff(input: &WorkerInput) -> Result<String, String> {
    let output = Command::new("git")
        .args(["diff"])
        .current_dir(&input.worktree_path)
        .output()
        .map_err(|err| format!("failed to read worktree diff: {err}"))?;
    if !output.status.success() {
        return Err(format!(
            "git diff failed in worktree: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
