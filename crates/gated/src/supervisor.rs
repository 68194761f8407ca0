//! Top-level run coordinator for `gate check` and `gate review`.
//!
//! One implementation serves both kinds: the kind selects the agent
//! directory, the labels, and the timeout message, nothing else. The
//! supervisor wires diff provider, resolver, worktree pool, scheduler,
//! display, and reporter together and turns the result set into an exit
//! code.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::Context;
use gate_core::{load_gate_config, TaskKind, TaskSource, WorkerOptions, DEFAULT_CONFIG_PATH};
use gate_git::{compute_diff_context, discover_repo, GitCli, PatchApplier, WorktreePool};
use gate_worker::{WorkerChannel, WorkerSpec};
use tracing::debug;

use crate::display::spawn_display;
use crate::report::{concat_patches, exit_code, render_report, ReportFormat, ReportMeta};
use crate::resolver::resolve_tasks;
use crate::scheduler::{ChannelExecutor, RunPolicy, Scheduler};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub kind: TaskKind,
    pub base: Option<String>,
    pub format: ReportFormat,
    pub fix: bool,
    pub patch_only: bool,
    pub fail_fast: bool,
    pub only: Vec<String>,
    pub jobs: Option<usize>,
    pub rule_filter: Option<String>,
    pub verbose: bool,
}

/// Drive one full run and return the process exit code.
///
/// Only two conditions end the run early, both clean exits: an empty
/// diff and an empty task list. Every task-level failure becomes a
/// result with `status = error` instead of aborting the run.
pub fn run(options: RunOptions) -> anyhow::Result<i32> {
    let git = GitCli::new("git");
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let repo = discover_repo(&cwd, &git)?;
    let config = load_gate_config(&repo.root)?;

    let diff = compute_diff_context(&repo, &git, options.base.as_deref())?;
    if diff.is_empty() {
        println!("No changes against {}. Nothing to {}.", diff.base_branch, options.kind);
        return Ok(0);
    }

    let tasks = resolve_tasks(&repo.root, options.kind, &options.only)?;
    if tasks.is_empty() {
        println!(
            "No {} tasks configured. Add scripts under .gate/{}/ to get started.",
            options.kind,
            options.kind.agent_dir()
        );
        return Ok(0);
    }
    debug!(kind = %options.kind, tasks = tasks.len(), base = %diff.base_branch, "starting run");

    let spec = WorkerSpec::for_current_exe(options.kind)?;
    let channel =
        WorkerChannel::new(spec).with_timeout(Duration::from_secs(config.worker_timeout_secs));
    let executor = ChannelExecutor::new(channel);
    let pool = WorktreePool::new(git.clone(), &repo);

    let config_path: PathBuf = repo.root.join(DEFAULT_CONFIG_PATH);
    let worker_options = WorkerOptions {
        config_path: config_path.is_file().then_some(config_path),
        org: config.org.clone(),
        rule_filter: options.rule_filter.clone(),
        verbose: options.verbose,
    };

    let policy = if options.fail_fast {
        RunPolicy::FailFast
    } else {
        RunPolicy::Concurrent {
            max_workers: options.jobs.unwrap_or(config.max_workers),
        }
    };

    let quiet = options.patch_only || options.format == ReportFormat::Json;
    let (event_tx, event_rx) = mpsc::channel();
    let display = spawn_display(&tasks, event_rx, quiet);

    let scheduler = Scheduler::new(&executor, &pool, worker_options, event_tx);
    let results = scheduler.run(&tasks, &diff, policy);
    drop(scheduler);
    let _ = display.join();

    if options.patch_only {
        print!("{}", concat_patches(&results));
        return Ok(exit_code(&results));
    }

    let meta = ReportMeta {
        kind: options.kind,
        base_branch: diff.base_branch.clone(),
        changed_file_count: diff.changed_files.len(),
        format: options.format,
        from_hub: tasks.iter().any(|t| t.source_type == TaskSource::Hub),
    };
    print!("{}", render_report(&tasks, &results, &meta));

    if options.fix {
        let applier = PatchApplier::new(git, &repo);
        let report = applier.apply_results(&results);
        for name in &report.applied {
            println!("applied: {name}");
        }
        for name in &report.conflicts {
            println!("conflict: {name}");
        }
        println!("{}", report.summary());
    }

    Ok(exit_code(&results))
}
