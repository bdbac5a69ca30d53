mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::DeployArgs;
use output::OutputFormat;

/// stackflow - dependency-ordered provisioning of stacks
#[derive(Parser)]
#[command(name = "stackflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging (overridden by RUST_LOG)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a deployment file and print its stack order
  Validate {
    /// Path to the deployment JSON file
    file: PathBuf,
  },

  /// Show what a deployment would change without applying it
  Plan {
    /// Path to the deployment JSON file
    file: PathBuf,

    /// Local state file standing in for the provider
    #[arg(long, default_value = "stackflow.state.json")]
    state: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Deploy every stack in dependency order
  Deploy {
    /// Path to the deployment JSON file
    file: PathBuf,

    /// Local state file standing in for the provider
    #[arg(long, default_value = "stackflow.state.json")]
    state: PathBuf,

    /// Write the recorded stack outputs to this file
    #[arg(long)]
    outputs: Option<PathBuf>,

    /// Write the deployment report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Resources reconciled concurrently within a stack
    #[arg(short = 'j', long)]
    parallelism: Option<usize>,

    /// Attempts per provider operation (1 disables retries)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Stop starting new work after this long (e.g., "10m", "90s")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Keep deploying stacks that do not depend on a failed one
    #[arg(long)]
    skip_dependents: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Undo the failed stacks of a saved deployment report
  Rollback {
    /// Deployment report written by `deploy --report`
    #[arg(long)]
    report: PathBuf,

    /// Local state file standing in for the provider
    #[arg(long, default_value = "stackflow.state.json")]
    state: PathBuf,

    /// Only roll back this stack
    #[arg(long)]
    stack: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Delete resources a saved report marks as no longer declared
  Prune {
    /// Deployment report written by `deploy --report`
    #[arg(long)]
    report: PathBuf,

    /// Local state file standing in for the provider
    #[arg(long, default_value = "stackflow.state.json")]
    state: PathBuf,

    /// List what would be deleted without deleting it
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Print a saved output snapshot
  Outputs {
    /// Snapshot written by `deploy --outputs`
    path: PathBuf,

    /// Only print this stack's outputs
    #[arg(long)]
    stack: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Validate { file } => cmd::cmd_validate(&file),
    Commands::Plan { file, state, output } => cmd::cmd_plan(&file, &state, output),
    Commands::Deploy {
      file,
      state,
      outputs,
      report,
      parallelism,
      max_attempts,
      timeout,
      skip_dependents,
      output,
    } => cmd::cmd_deploy(DeployArgs {
      file,
      state,
      outputs,
      report,
      parallelism,
      max_attempts,
      timeout,
      skip_dependents,
      output,
    }),
    Commands::Rollback {
      report,
      state,
      stack,
      output,
    } => cmd::cmd_rollback(&report, &state, stack.as_deref(), output),
    Commands::Prune {
      report,
      state,
      dry_run,
      output,
    } => cmd::cmd_prune(&report, &state, dry_run, output),
    Commands::Outputs { path, stack, output } => cmd::cmd_outputs(&path, stack.as_deref(), output),
  }
}
