//! WorkerChannel: runs one task in a dedicated worker process.
//!
//! The channel owns the full worker lifecycle and always produces exactly
//! one [`WorkerOutcome`], no matter how the process behaves: a `result`
//! message, a protocol violation, a spawn or pipe failure, an abnormal
//! exit, or the hard timeout. Exactly-once resolution is structural: the
//! deadline loop returns the first ending it observes.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use gate_core::{TaskKind, WorkerInput, WorkerOutcome, DEFAULT_WORKER_TIMEOUT_SECS};
use tracing::debug;

use crate::error::WorkerError;
use crate::protocol::{encode_line, ControlMessage, WorkerMessage};

/// How to launch a worker process for one task kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub kind: TaskKind,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerSpec {
    /// Re-invoke the current executable as `worker --kind <kind>`.
    pub fn for_current_exe(kind: TaskKind) -> Result<Self, WorkerError> {
        let program =
            std::env::current_exe().map_err(|source| WorkerError::CurrentExe { source })?;
        Ok(Self {
            kind,
            program,
            args: vec!["worker".to_string(), "--kind".to_string(), kind.to_string()],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerChannel {
    spec: WorkerSpec,
    timeout: Duration,
    grace: Duration,
    poll_interval: Duration,
}

impl WorkerChannel {
    pub fn new(spec: WorkerSpec) -> Self {
        Self {
            spec,
            timeout: Duration::from_secs(DEFAULT_WORKER_TIMEOUT_SECS),
            grace: Duration::from_secs(2),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run one worker to completion and normalize its ending.
    pub fn run(&self, input: &WorkerInput) -> WorkerOutcome {
        let started = Instant::now();

        let mut child = match Command::new(&self.spec.program)
            .args(&self.spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => return WorkerOutcome::failure(err.to_string(), 0.0),
        };

        let mut stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Reader threads stay detached: a worker's orphaned grandchildren
        // can keep the pipes open past the kill, and the channel must not
        // wait on them. Both threads end at pipe EOF.
        let (line_tx, line_rx) = mpsc::channel::<String>();
        if let Some(out) = stdout {
            thread::spawn(move || {
                let mut buf = BufReader::new(out);
                loop {
                    let mut line = String::new();
                    match buf.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            let _ = line_tx.send(line);
                        }
                        Err(_) => break,
                    }
                }
            });
        }
        if let Some(err_pipe) = stderr {
            let kind = self.spec.kind;
            thread::spawn(move || {
                let mut captured = String::new();
                let mut reader = BufReader::new(err_pipe);
                let _ = reader.read_to_string(&mut captured);
                if !captured.trim().is_empty() {
                    debug!(%kind, stderr = %captured.trim_end(), "worker diagnostics");
                }
            });
        }

        let outcome = self.drive(&mut child, &mut stdin, &line_rx, input, started);

        // Reap the worker so no zombie leaks. A worker that sent its
        // result but lingers gets the grace-then-kill treatment instead
        // of an unbounded wait.
        self.terminate(&mut child, &mut stdin);
        let _ = child.wait();
        outcome
    }

    /// The deadline loop. Returns on the first of: `result` message,
    /// protocol violation, pipe failure, abnormal exit, or timeout.
    fn drive(
        &self,
        child: &mut Child,
        stdin: &mut Option<ChildStdin>,
        lines: &mpsc::Receiver<String>,
        input: &WorkerInput,
        started: Instant,
    ) -> WorkerOutcome {
        let deadline = started + self.timeout;

        loop {
            while let Ok(line) = lines.try_recv() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WorkerMessage>(line.trim()) {
                    Ok(WorkerMessage::Ready) => {
                        if let Err(message) = send_run(stdin, input) {
                            self.terminate(child, stdin);
                            return WorkerOutcome::failure(
                                message,
                                started.elapsed().as_secs_f64(),
                            );
                        }
                    }
                    Ok(WorkerMessage::Result { outcome }) => return outcome,
                    Err(err) => {
                        self.terminate(child, stdin);
                        return WorkerOutcome::failure(
                            format!("worker sent an invalid message: {err}"),
                            started.elapsed().as_secs_f64(),
                        );
                    }
                }
            }

            if Instant::now() >= deadline {
                self.terminate(child, stdin);
                return WorkerOutcome::failure(self.spec.kind.timeout_message(self.timeout), 0.0);
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    // A result may still be in flight between the pipe and
                    // the reader thread; drain until EOF before deciding.
                    if let Some(outcome) = self.drain_after_exit(lines) {
                        return outcome;
                    }
                    let message = match status.code() {
                        Some(0) => "Worker exited without sending a result".to_string(),
                        Some(code) => format!("Worker exited with code {code}"),
                        None => "Worker was terminated by a signal".to_string(),
                    };
                    return WorkerOutcome::failure(message, started.elapsed().as_secs_f64());
                }
                Ok(None) => {}
                Err(err) => {
                    self.terminate(child, stdin);
                    return WorkerOutcome::failure(
                        err.to_string(),
                        started.elapsed().as_secs_f64(),
                    );
                }
            }

            thread::sleep(self.poll_interval);
        }
    }

    /// After the process exited, wait (bounded by the grace period) for
    /// the stdout reader to reach EOF and surface a late `result`.
    fn drain_after_exit(&self, lines: &mpsc::Receiver<String>) -> Option<WorkerOutcome> {
        let drain_deadline = Instant::now() + self.grace;
        loop {
            match lines.recv_timeout(self.poll_interval) {
                Ok(line) => {
                    if let Ok(WorkerMessage::Result { outcome }) =
                        serde_json::from_str::<WorkerMessage>(line.trim())
                    {
                        return Some(outcome);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return None,
                Err(RecvTimeoutError::Timeout) => {
                    if Instant::now() >= drain_deadline {
                        return None;
                    }
                }
            }
        }
    }

    /// Graceful-then-forced termination: close stdin, give the worker a
    /// grace period to exit on its own, then kill.
    fn terminate(&self, child: &mut Child, stdin: &mut Option<ChildStdin>) {
        drop(stdin.take());
        let grace_deadline = Instant::now() + self.grace;
        while Instant::now() < grace_deadline {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(self.poll_interval),
                Err(_) => break,
            }
        }
        let _ = child.kill();
    }
}

fn send_run(stdin: &mut Option<ChildStdin>, input: &WorkerInput) -> Result<(), String> {
    let Some(pipe) = stdin.as_mut() else {
        return Err("worker stdin closed before run message".to_string());
    };
    let line = encode_line(&ControlMessage::Run {
        input: input.clone(),
    })
    .map_err(|err| format!("failed to encode run message: {err}"))?;
    pipe.write_all(line.as_bytes())
        .and_then(|_| pipe.flush())
        .map_err(|err| format!("failed to send run message: {err}"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use gate_core::{DiffContext, TaskKind, WorkerInput};

    use super::{WorkerChannel, WorkerSpec};

    fn mk_input() -> WorkerInput {
        WorkerInput {
            agent_source: "true".to_string(),
            worktree_path: PathBuf::from("/tmp"),
            diff: DiffContext {
                base_branch: "main".to_string(),
                diff: "diff --git a/x b/x\n".to_string(),
                changed_files: vec!["x".to_string()],
            },
            options: Default::default(),
        }
    }

    fn script_channel(kind: TaskKind, script: &str) -> WorkerChannel {
        WorkerChannel::new(WorkerSpec {
            kind,
            program: PathBuf::from("bash"),
            args: vec!["-c".to_string(), script.to_string()],
        })
    }

    #[test]
    fn successful_worker_resolves_with_its_result() {
        let channel = script_channel(
            TaskKind::Check,
            r#"echo '{"type":"ready"}'
read line
echo '{"type":"result","outcome":{"patch":"","agent_output":"clean","duration_secs":0.5,"error":null}}'"#,
        );

        let outcome = channel.run(&mk_input());
        assert!(outcome.error.is_none());
        assert_eq!(outcome.agent_output, "clean");
        assert_eq!(outcome.duration_secs, 0.5);
    }

    #[test]
    fn worker_result_can_carry_a_patch() {
        let channel = script_channel(
            TaskKind::Review,
            r#"echo '{"type":"ready"}'
read line
echo '{"type":"result","outcome":{"patch":"diff --git a/x b/x\n","agent_output":"","duration_secs":1.0,"error":null}}'"#,
        );

        let outcome = channel.run(&mk_input());
        assert!(outcome.error.is_none());
        assert!(outcome.patch.starts_with("diff --git"));
    }

    #[test]
    fn abnormal_exit_resolves_with_exit_code_error() {
        let channel = script_channel(
            TaskKind::Check,
            r#"echo '{"type":"ready"}'
read line
exit 3"#,
        );

        let outcome = channel.run(&mk_input());
        assert_eq!(outcome.error.as_deref(), Some("Worker exited with code 3"));
        assert!(outcome.patch.is_empty());
    }

    #[test]
    fn clean_exit_without_result_is_a_protocol_error() {
        let channel = script_channel(TaskKind::Check, r#"echo '{"type":"ready"}'"#);

        let outcome = channel.run(&mk_input());
        assert_eq!(
            outcome.error.as_deref(),
            Some("Worker exited without sending a result")
        );
    }

    #[test]
    fn garbage_on_the_protocol_stream_resolves_as_error() {
        let channel = script_channel(TaskKind::Check, "echo not-a-message; sleep 5")
            .with_grace(Duration::from_millis(100));

        let outcome = channel.run(&mk_input());
        let message = outcome.error.expect("protocol error expected");
        assert!(message.contains("invalid message"));
    }

    #[test]
    fn missing_worker_binary_resolves_as_spawn_error() {
        let channel = WorkerChannel::new(WorkerSpec {
            kind: TaskKind::Check,
            program: PathBuf::from("/definitely/missing/gate-worker"),
            args: Vec::new(),
        });

        let outcome = channel.run(&mk_input());
        assert!(outcome.error.is_some());
        assert_eq!(outcome.duration_secs, 0.0);
    }

    #[test]
    fn timeout_kills_the_worker_and_names_the_kind() {
        let channel = script_channel(
            TaskKind::Review,
            r#"echo '{"type":"ready"}'
read line
sleep 60"#,
        )
        .with_timeout(Duration::from_secs(1))
        .with_grace(Duration::from_millis(100));

        let start = std::time::Instant::now();
        let outcome = channel.run(&mk_input());
        assert!(
            start.elapsed() < Duration::from_secs(10),
            "worker was not killed promptly"
        );

        assert_eq!(
            outcome.error.as_deref(),
            Some("review timed out after 1 second")
        );
        assert_eq!(outcome.patch, "");
        assert_eq!(outcome.duration_secs, 0.0);
    }

    #[test]
    fn worker_lingering_after_its_result_is_reaped_promptly() {
        let channel = script_channel(
            TaskKind::Check,
            r#"echo '{"type":"ready"}'
read line
echo '{"type":"result","outcome":{"patch":"","agent_output":"done","duration_secs":0.2,"error":null}}'
sleep 60"#,
        )
        .with_grace(Duration::from_millis(100));

        let start = std::time::Instant::now();
        let outcome = channel.run(&mk_input());
        assert!(
            start.elapsed() < Duration::from_secs(10),
            "lingering worker was not reaped"
        );
        assert!(outcome.error.is_none());
        assert_eq!(outcome.agent_output, "done");
    }

    #[test]
    fn late_result_racing_the_exit_is_still_collected() {
        // Result and exit land together; the post-exit drain must pick the
        // result over the exit status.
        let channel = script_channel(
            TaskKind::Check,
            r#"echo '{"type":"ready"}'
read line
echo '{"type":"result","outcome":{"patch":"","agent_output":"late","duration_secs":0.1,"error":null}}'
exit 0"#,
        );

        let outcome = channel.run(&mk_input());
        assert!(outcome.error.is_none());
        assert_eq!(outcome.agent_output, "late");
    }
}
