use clap::{Args, Parser, Subcommand};
use gate_core::TaskKind;
use gate_worker::run_worker;
use gated::report::ReportFormat;
use gated::supervisor::{self, RunOptions};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gate", version, about = "Run isolated checks and reviews over your pending change")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the configured checks against the diff.
    Check(RunArgs),
    /// Run the configured reviews against the diff.
    Review(RunArgs),
    /// Internal worker entry point, spawned per task.
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        kind: TaskKind,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Base branch to diff against (defaults to the remote head, else main).
    #[arg(long)]
    base: Option<String>,
    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    format: ReportFormat,
    /// Apply the produced patches to the working tree.
    #[arg(long)]
    fix: bool,
    /// Emit only the concatenated patches on stdout.
    #[arg(long = "patch")]
    patch_only: bool,
    /// Run tasks one at a time and stop at the first failure.
    #[arg(long)]
    fail_fast: bool,
    /// Run only the named tasks.
    #[arg(long = "only", value_name = "NAME")]
    only: Vec<String>,
    /// Maximum concurrent workers (overrides the config file).
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,
    /// Restrict rule-based agents to one rule.
    #[arg(long)]
    rule_filter: Option<String>,
    /// Forward verbose mode to the agents.
    #[arg(long)]
    verbose: bool,
}

impl RunArgs {
    fn into_options(self, kind: TaskKind) -> RunOptions {
        RunOptions {
            kind,
            base: self.base,
            format: self.format,
            fix: self.fix,
            patch_only: self.patch_only,
            fail_fast: self.fail_fast,
            only: self.only,
            jobs: self.jobs,
            rule_filter: self.rule_filter,
            verbose: self.verbose,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Check(args) => run_or_report(args.into_options(TaskKind::Check)),
        Command::Review(args) => run_or_report(args.into_options(TaskKind::Review)),
        Command::Worker { kind } => match run_worker(kind) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("gate worker failed: {err}");
                1
            }
        },
    };
    std::process::exit(code);
}

fn run_or_report(options: RunOptions) -> i32 {
    match supervisor::run(options) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("gate failed: {err:#}");
            1
        }
    }
}
