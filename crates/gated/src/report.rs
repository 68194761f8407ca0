//! Final report rendering and the exit-code rule.

use clap::ValueEnum;
use gate_core::{ResolvedTask, TaskKind, TaskResult, TaskStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Text,
    Json,
}

/// Run metadata carried into the rendered report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub kind: TaskKind,
    pub base_branch: String,
    pub changed_file_count: usize,
    pub format: ReportFormat,
    /// True when at least one task came from the hub catalog.
    pub from_hub: bool,
}

/// Exit code is 0 iff no result failed or errored.
pub fn exit_code(results: &[TaskResult]) -> i32 {
    let clean = results
        .iter()
        .all(|r| !matches!(r.status, TaskStatus::Fail | TaskStatus::Error));
    if clean {
        0
    } else {
        1
    }
}

/// Patch-only output: every non-empty patch, in result order, nothing else.
pub fn concat_patches(results: &[TaskResult]) -> String {
    let mut out = String::new();
    for result in results {
        if result.patch.trim().is_empty() {
            continue;
        }
        out.push_str(&result.patch);
        if !result.patch.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

pub fn render_report(tasks: &[ResolvedTask], results: &[TaskResult], meta: &ReportMeta) -> String {
    match meta.format {
        ReportFormat::Text => render_text(tasks, results, meta),
        ReportFormat::Json => render_json(tasks, results, meta),
    }
}

fn render_text(tasks: &[ResolvedTask], results: &[TaskResult], meta: &ReportMeta) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} results against {} ({} changed file{})\n",
        meta.kind,
        meta.base_branch,
        meta.changed_file_count,
        if meta.changed_file_count == 1 { "" } else { "s" }
    ));
    if meta.from_hub {
        out.push_str("(includes tasks from the hub catalog)\n");
    }
    out.push('\n');

    for result in results {
        out.push_str(&format!(
            "  [{}] {} ({:.1}s)\n",
            result.status, result.name, result.duration_secs
        ));
        if let Some(error) = &result.error {
            out.push_str(&format!("        error: {error}\n"));
        }
        if result.has_patch() {
            let lines = result.patch.lines().count();
            out.push_str(&format!("        patch: {lines} line(s)\n"));
        }
    }

    // Fail-fast can leave trailing tasks unvisited; they are reported,
    // not dropped.
    for task in &tasks[results.len().min(tasks.len())..] {
        out.push_str(&format!("  [not run] {}\n", task.name));
    }

    let passed = results.iter().filter(|r| r.status == TaskStatus::Pass).count();
    let failed = results.iter().filter(|r| r.status == TaskStatus::Fail).count();
    let errored = results.iter().filter(|r| r.status == TaskStatus::Error).count();
    out.push_str(&format!(
        "\n{passed} passed, {failed} failed, {errored} errored\n"
    ));
    out
}

fn render_json(tasks: &[ResolvedTask], results: &[TaskResult], meta: &ReportMeta) -> String {
    #[derive(Serialize)]
    struct JsonReport<'a> {
        kind: TaskKind,
        base_branch: &'a str,
        changed_file_count: usize,
        from_hub: bool,
        results: &'a [TaskResult],
        not_run: Vec<&'a str>,
    }

    let report = JsonReport {
        kind: meta.kind,
        base_branch: &meta.base_branch,
        changed_file_count: meta.changed_file_count,
        from_hub: meta.from_hub,
        results,
        not_run: tasks[results.len().min(tasks.len())..]
            .iter()
            .map(|t| t.name.as_str())
            .collect(),
    };
    let mut rendered = serde_json::to_string_pretty(&report)
        .unwrap_or_else(|e| format!("{{\"error\":\"report serialization failed: {e}\"}}"));
    rendered.push('\n');
    rendered
}
