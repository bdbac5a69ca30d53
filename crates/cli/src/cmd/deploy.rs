//! Implementation of the `stackflow deploy` command.
//!
//! Deploys every stack against the local state file, prints the report and
//! optionally persists the report and the recorded outputs. Exits non-zero
//! when any stack did not succeed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use owo_colors::{OwoColorize, Stream};
use tracing::info;

use stackflow_lib::orchestrator::{DeploymentReport, FailurePolicy, Orchestrator, OrchestratorConfig};
use stackflow_lib::outputs::OutputSnapshot;
use stackflow_lib::stack::StackStatus;

use crate::output::{
  OutputFormat, format_duration, print_change, print_error, print_json, print_stat, print_success, print_warning,
  symbols,
};

pub struct DeployArgs {
  pub file: PathBuf,
  pub state: PathBuf,
  pub outputs: Option<PathBuf>,
  pub report: Option<PathBuf>,
  pub parallelism: Option<usize>,
  pub max_attempts: Option<u32>,
  pub timeout: Option<Duration>,
  pub skip_dependents: bool,
  pub output: OutputFormat,
}

impl DeployArgs {
  fn config(&self) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    if let Some(parallelism) = self.parallelism {
      config.parallelism = parallelism.max(1);
    }
    if let Some(max_attempts) = self.max_attempts {
      config.retry.max_attempts = max_attempts.max(1);
    }
    config.deployment_timeout = self.timeout;
    if self.skip_dependents {
      config.failure_policy = FailurePolicy::SkipDependents;
    }
    config
  }
}

pub fn cmd_deploy(args: DeployArgs) -> Result<()> {
  let deployment = super::load_deployment(&args.file)?;
  let provider = super::open_state(&args.state)?;
  let orchestrator = Orchestrator::new(provider).with_config(args.config());

  let rt = super::runtime()?;
  let report = rt
    .block_on(orchestrator.deploy(&deployment))
    .with_context(|| format!("Invalid deployment: {}", args.file.display()))?;

  if let Some(path) = &args.report {
    report
      .save(path)
      .with_context(|| format!("Failed to save report: {}", path.display()))?;
    info!(path = %path.display(), "report saved");
  }

  if let Some(path) = &args.outputs {
    let snapshot = OutputSnapshot::capture(&report.environment, &report.output_store());
    snapshot
      .save(path)
      .with_context(|| format!("Failed to save outputs: {}", path.display()))?;
    info!(path = %path.display(), "outputs saved");
  }

  if args.output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report);
  }

  if !report.is_success() {
    bail!(
      "deployment failed: {} succeeded, {} failed, {} skipped",
      report.succeeded().len(),
      report.failed().len(),
      report.skipped().len()
    );
  }

  Ok(())
}

fn print_report(report: &DeploymentReport) {
  for stack in &report.stacks {
    println!();
    let header = match (stack.status, &stack.skipped) {
      (_, Some(reason)) => format!("{} {} (skipped: {})", symbols::SKIP, stack.stack, reason),
      (StackStatus::Succeeded, _) => format!("{} {}", symbols::SUCCESS, stack.stack),
      (StackStatus::Failed, _) => format!("{} {}", symbols::ERROR, stack.stack),
      (status, _) => format!("{} {} ({})", symbols::INFO, stack.stack, status),
    };
    println!("{}", header.if_supports_color(Stream::Stdout, |s| s.bold()));

    for change in &stack.changes {
      print_change(change.change, &change.address.to_string(), &change.attributes);
    }
    for (name, value) in &stack.outputs {
      print_stat(name, &value.to_interpolated());
    }
    if stack.retries > 0 {
      print_stat("Retries", &stack.retries.to_string());
    }
    if let Some(error) = &stack.error {
      print_error(&error.message);
    }
  }

  println!();
  if report.timed_out {
    print_warning("Deployment timed out");
  } else if report.cancelled {
    print_warning("Deployment cancelled");
  }

  for plan in &report.rollback {
    print_warning(&format!(
      "Stack '{}' left {} change(s) behind; run `stackflow rollback` to undo them",
      plan.stack,
      plan.steps.len()
    ));
  }

  let obsolete = report.obsolete();
  if !obsolete.is_empty() {
    print_warning(&format!(
      "{} resource(s) are no longer declared; run `stackflow prune` to delete them",
      obsolete.len()
    ));
  }

  if report.is_success() {
    print_success(&format!("Deployment '{}' complete", report.environment));
  }
  print_stat("Succeeded", &report.succeeded().len().to_string());
  print_stat("Failed", &report.failed().len().to_string());
  print_stat("Skipped", &report.skipped().len().to_string());
  print_stat("Duration", &format_duration(Duration::from_millis(report.duration_ms)));
}
