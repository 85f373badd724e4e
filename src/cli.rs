//! CLI interface.
//!
//! One positional action selects the policy for the pass:
//!
//! - `plan` (default) — show every pending change; read-only.
//! - `apply` — patch, wait for rollout, record progress, for every workload.
//! - `continue` — same as apply; relies on the ledger to skip finished work.
//! - `interactive` — like apply, but asks before each patch.
//! - `verify` — report whether each workload still references the old path.
//! - `status` — summarize the ledger for the current context.
//!
//! Every setting can also come from the environment or the config file.

mod format;
mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::BoolishValueParser;
use clap::{Parser, ValueEnum};

use crate::cluster::{Cluster, Kubectl};
use crate::config::{Config, FileConfig, Overrides};
use crate::ledger::Ledger;
use crate::orchestrate::{Mode, Operator, Orchestrator, Settings};

use format::{format_report, format_status, format_summary};
use prompt::Prompt;

/// Move workload images from `bitnami/` to `bitnamilegacy/`, cluster-wide and resumably.
#[derive(Debug, Parser)]
#[command(name = "legacy-migrate", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// What to do.
    #[arg(value_enum, default_value_t = Action::Plan)]
    action: Action,

    /// Config file (default: ~/.legacy-migrate/config.toml, if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ledger file recording progress across runs.
    #[arg(long, env = "LEDGER_FILE")]
    ledger_file: Option<PathBuf>,

    /// How long to wait for each rollout (e.g. `5m`, `90s`).
    #[arg(long, env = "ROLLOUT_TIMEOUT")]
    rollout_timeout: Option<String>,

    /// Only these namespaces. Repeatable or comma-separated.
    #[arg(long = "namespace", short = 'n', env = "NAMESPACES", value_delimiter = ',')]
    namespaces: Vec<String>,

    /// Only these kinds: deployment, daemonset, statefulset, cronjob.
    #[arg(long = "kind", env = "KINDS", value_delimiter = ',')]
    kinds: Vec<String>,

    /// Re-check verified workloads against the live cluster and reprocess drift.
    ///
    /// `--force-recheck=false` turns off a `force-recheck = true` from the config file.
    #[arg(
        long,
        env = "FORCE_RECHECK",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    force_recheck: Option<bool>,

    /// Kubeconfig context to use instead of the current one.
    #[arg(long, env = "KUBE_CONTEXT")]
    context: Option<String>,

    /// Path to the kubectl binary.
    #[arg(long, env = "KUBECTL")]
    kubectl: Option<String>,
}

const WORKFLOW_HELP: &str = r"Workflow:
  1. legacy-migrate plan                  → review every pending change
  2. legacy-migrate apply                 → patch, wait for rollouts, record progress
     (interrupted or stopped on a failed rollout?)
  3. legacy-migrate continue              → pick up where the ledger left off
  4. legacy-migrate verify                → confirm nothing references bitnami/

Scope a run:
  legacy-migrate apply -n shop,data --kind deployment --rollout-timeout 10m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Show pending changes without mutating anything.
    Plan,
    /// Apply every pending change.
    Apply,
    /// Check every workload against the live cluster, ignoring the ledger.
    Verify,
    /// Resume: apply whatever the ledger doesn't show as verified.
    Continue,
    /// Ask before applying each change. Quitting exits 0 unless an earlier
    /// change in the pass failed.
    Interactive,
    /// Show the ledger's view of the current context.
    Status,
}

impl Action {
    fn mode(self) -> Option<Mode> {
        match self {
            Self::Plan => Some(Mode::Plan),
            Self::Apply => Some(Mode::Apply),
            Self::Verify => Some(Mode::Verify),
            Self::Continue => Some(Mode::Continue),
            Self::Interactive => Some(Mode::Interactive),
            Self::Status => None,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            ledger_file: self.ledger_file.clone(),
            rollout_timeout: self.rollout_timeout.clone(),
            namespaces: self.namespaces.clone(),
            kinds: self.kinds.clone(),
            force_recheck: self.force_recheck,
            context: self.context.clone(),
            kubectl: self.kubectl.clone(),
        }
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run() -> Result<ExitCode, String> {
    let cli = Cli::parse();

    let file = FileConfig::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    let config = Config::resolve(file, cli.overrides()).map_err(|e| e.to_string())?;
    tracing::debug!(?config, "configuration resolved");

    let kubectl = Kubectl::new(config.kubectl.clone(), config.context.clone());
    kubectl.ensure_available().map_err(|e| e.to_string())?;
    let context = kubectl
        .context_id()
        .map_err(|e| format!("failed to determine cluster context: {e}"))?;

    let mut ledger = Ledger::open(&config.ledger_file)
        .map_err(|e| format!("failed to open ledger: {e}"))?;

    match cli.action.mode() {
        None => {
            cmd_status(&ledger, &context);
            Ok(ExitCode::SUCCESS)
        }
        Some(mode) => cmd_pass(&config, &kubectl, &mut ledger, context, mode),
    }
}

fn cmd_pass(
    config: &Config,
    kubectl: &Kubectl,
    ledger: &mut Ledger,
    context: String,
    mode: Mode,
) -> Result<ExitCode, String> {
    let docs = kubectl
        .fetch(&config.kinds, config.namespaces.as_deref())
        .map_err(|e| format!("failed to fetch workloads: {e}"))?;

    eprintln!(
        "Context {context}: {} workload(s), ledger {}",
        docs.len(),
        ledger.path().display()
    );

    let settings = Settings {
        context,
        force_recheck: config.force_recheck,
        rollout_timeout: config.rollout_timeout,
    };

    let mut prompt = Prompt::stdio();
    let operator: Option<&mut dyn Operator> = if mode == Mode::Interactive {
        Some(&mut prompt)
    } else {
        None
    };

    let summary = Orchestrator::new(kubectl, ledger, settings)
        .run(mode, docs, operator, |report| {
            println!("{}", format_report(mode, report));
        })
        .map_err(|e| e.to_string())?;

    println!("{}", format_summary(mode, &summary));

    if summary.has_failures() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_status(ledger: &Ledger, context: &str) {
    let rows: Vec<_> = ledger.index().in_context(context).collect();
    if rows.is_empty() {
        println!("No ledger entries for context {context}");
        return;
    }
    println!("{}", format_status(&rows));
}
