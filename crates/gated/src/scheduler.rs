//! Scheduling policies driving tasks through worker channels.
//!
//! The scheduler owns the per-task sequence (worktree in, worker run,
//! worktree out, result derived) and the two policies over it: fail-fast
//! sequential and bounded concurrent. It reports progress as events over
//! a channel; it never shares mutable state with the display.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use gate_core::{
    DiffContext, ResolvedTask, TaskEvent, TaskResult, TaskStatus, WorkerInput, WorkerOptions,
    WorkerOutcome,
};
use gate_git::{GitError, WorktreePool};
use gate_worker::WorkerChannel;
use tracing::debug;

/// Seam for running one task's worker; lets tests schedule without
/// spawning processes.
pub trait TaskExecutor: Sync {
    fn execute(&self, task: &ResolvedTask, input: &WorkerInput) -> WorkerOutcome;
}

/// Production executor: one worker process per call.
pub struct ChannelExecutor {
    channel: WorkerChannel,
}

impl ChannelExecutor {
    pub fn new(channel: WorkerChannel) -> Self {
        Self { channel }
    }
}

impl TaskExecutor for ChannelExecutor {
    fn execute(&self, _task: &ResolvedTask, input: &WorkerInput) -> WorkerOutcome {
        self.channel.run(input)
    }
}

/// Seam for worktree lifecycle; release must be callable on every exit
/// path and idempotent.
pub trait WorktreeProvider: Sync {
    fn acquire(&self, index: usize) -> Result<PathBuf, GitError>;
    fn release(&self, path: &Path);
}

impl WorktreeProvider for WorktreePool {
    fn acquire(&self, index: usize) -> Result<PathBuf, GitError> {
        WorktreePool::acquire(self, index)
    }

    fn release(&self, path: &Path) {
        WorktreePool::release(self, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPolicy {
    /// Strict list order, one at a time, stop after the first fail/error.
    FailFast,
    /// All tasks, at most `max_workers` at once, settle every one.
    Concurrent { max_workers: usize },
}

/// The sharable per-task half of the scheduler. Holds only `Sync` state
/// so worker threads can borrow it; the event sender stays outside and
/// is cloned per thread.
struct TaskRunner<'a> {
    executor: &'a dyn TaskExecutor,
    worktrees: &'a dyn WorktreeProvider,
    options: WorkerOptions,
}

pub struct Scheduler<'a> {
    runner: TaskRunner<'a>,
    events: Sender<TaskEvent>,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        executor: &'a dyn TaskExecutor,
        worktrees: &'a dyn WorktreeProvider,
        options: WorkerOptions,
        events: Sender<TaskEvent>,
    ) -> Self {
        Self {
            runner: TaskRunner {
                executor,
                worktrees,
                options,
            },
            events,
        }
    }

    /// Run every task under the given policy. Results always come back in
    /// task order; fail-fast may truncate the list, the concurrent policy
    /// never does.
    pub fn run(
        &self,
        tasks: &[ResolvedTask],
        diff: &DiffContext,
        policy: RunPolicy,
    ) -> Vec<TaskResult> {
        match policy {
            RunPolicy::FailFast => self.run_fail_fast(tasks, diff),
            RunPolicy::Concurrent { max_workers } => {
                self.run_concurrent(tasks, diff, max_workers.max(1))
            }
        }
    }

    fn run_fail_fast(&self, tasks: &[ResolvedTask], diff: &DiffContext) -> Vec<TaskResult> {
        let mut results = Vec::new();
        for (index, task) in tasks.iter().enumerate() {
            let result = self
                .runner
                .run_one_caught(index, task, diff, &self.events)
                .unwrap_or_else(|| self.synthesize_missing(tasks, index));
            let stop = matches!(result.status, TaskStatus::Fail | TaskStatus::Error);
            results.push(result);
            if stop {
                debug!(task = %tasks[index].name, "fail-fast stop");
                break;
            }
        }
        results
    }

    fn run_concurrent(
        &self,
        tasks: &[ResolvedTask],
        diff: &DiffContext,
        max_workers: usize,
    ) -> Vec<TaskResult> {
        let queue: Mutex<VecDeque<usize>> = Mutex::new((0..tasks.len()).collect());
        let (result_tx, result_rx) = mpsc::channel::<(usize, TaskResult)>();
        let runner = &self.runner;

        thread::scope(|scope| {
            for _ in 0..max_workers.min(tasks.len()) {
                let result_tx = result_tx.clone();
                let events = self.events.clone();
                let queue = &queue;
                scope.spawn(move || loop {
                    let index = {
                        let mut pending = queue.lock().unwrap_or_else(|e| e.into_inner());
                        pending.pop_front()
                    };
                    let Some(index) = index else {
                        break;
                    };
                    // A panicking task must neither kill this pool thread
                    // nor take the scope down with it; the backfill below
                    // turns its missing slot into an error result.
                    if let Some(result) = runner.run_one_caught(index, &tasks[index], diff, &events)
                    {
                        let _ = result_tx.send((index, result));
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<TaskResult>> = tasks.iter().map(|_| None).collect();
        while let Ok((index, result)) = result_rx.recv() {
            slots[index] = Some(result);
        }

        // A missing slot means the task's run panicked outside the
        // executor; surface it as an error result instead of dropping it.
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or_else(|| self.synthesize_missing(tasks, index)))
            .collect()
    }

    fn synthesize_missing(&self, tasks: &[ResolvedTask], index: usize) -> TaskResult {
        let result = TaskResult::from_error(&tasks[index], "task produced no result", 0.0);
        let _ = self
            .events
            .send(TaskEvent::finished(index, TaskStatus::Error, 0.0));
        result
    }
}

impl TaskRunner<'_> {
    /// `run_one` with panics contained. `None` means the run panicked
    /// outside the executor and produced nothing; the caller synthesizes
    /// the result.
    fn run_one_caught(
        &self,
        index: usize,
        task: &ResolvedTask,
        diff: &DiffContext,
        events: &Sender<TaskEvent>,
    ) -> Option<TaskResult> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run_one(index, task, diff, events))).ok()
    }

    /// One task's full sequence. The worktree is released on every path
    /// out of the run, including supervisor-local failures and a
    /// panicking executor.
    fn run_one(
        &self,
        index: usize,
        task: &ResolvedTask,
        diff: &DiffContext,
        events: &Sender<TaskEvent>,
    ) -> TaskResult {
        let started = Instant::now();
        let _ = events.send(TaskEvent::started(index));

        let mut worktree: Option<PathBuf> = None;
        let outcome = match self.worktrees.acquire(index) {
            Ok(path) => {
                worktree = Some(path.clone());
                let input = WorkerInput {
                    agent_source: task.source.clone(),
                    worktree_path: path,
                    diff: diff.clone(),
                    options: self.options.clone(),
                };
                match panic::catch_unwind(AssertUnwindSafe(|| {
                    self.executor.execute(task, &input)
                })) {
                    Ok(outcome) => outcome,
                    Err(payload) => WorkerOutcome::failure(
                        format!("task execution panicked: {}", panic_message(&payload)),
                        started.elapsed().as_secs_f64(),
                    ),
                }
            }
            Err(err) => WorkerOutcome::failure(err.to_string(), started.elapsed().as_secs_f64()),
        };

        if let Some(path) = worktree {
            self.worktrees.release(&path);
        }

        let result = TaskResult::from_outcome(task, outcome);
        let _ = events.send(TaskEvent::finished(
            index,
            result.status,
            result.duration_secs,
        ));
        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
