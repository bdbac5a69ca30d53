//! Implementation of the `stackflow rollback` command.

use std::path::Path;

use anyhow::{Context, Result, bail};

use stackflow_lib::orchestrator::{DeploymentReport, Orchestrator, RollbackAction, StepOutcome};

use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, print_success, symbols};

/// Execute the rollback plans of a saved report against the local state.
///
/// Plans run one stack at a time; within a plan, the first failed step stops
/// the remaining ones.
pub fn cmd_rollback(report_path: &Path, state: &Path, stack: Option<&str>, output: OutputFormat) -> Result<()> {
  let report = DeploymentReport::load(report_path)
    .with_context(|| format!("Failed to load report: {}", report_path.display()))?;

  let plans: Vec<_> = report
    .rollback
    .iter()
    .filter(|plan| stack.is_none_or(|name| plan.stack == name))
    .collect();

  if plans.is_empty() {
    if output.is_json() {
      return print_json(&Vec::<()>::new());
    }
    print_info("Nothing to roll back.");
    return Ok(());
  }

  let provider = super::open_state(state)?;
  let orchestrator = Orchestrator::new(provider);
  let rt = super::runtime()?;

  let mut results = Vec::with_capacity(plans.len());
  for plan in plans {
    results.push(rt.block_on(orchestrator.rollback(plan)));
  }

  if output.is_json() {
    print_json(&results)?;
  } else {
    for result in &results {
      println!();
      println!("{}", result.stack);
      for step in &result.steps {
        let action = match &step.step.action {
          RollbackAction::Delete => "delete",
          RollbackAction::Restore { .. } => "restore",
        };
        let line = format!("{} {} {}", action, symbols::ARROW, step.step.address);
        match &step.outcome {
          StepOutcome::Done => print_success(&line),
          StepOutcome::Failed { error } => print_error(&format!("{line}: {error}")),
          StepOutcome::NotAttempted => print_stat("not attempted", &line),
        }
      }
    }
  }

  let incomplete: Vec<_> = results.iter().filter(|r| !r.is_complete()).map(|r| r.stack.as_str()).collect();
  if !incomplete.is_empty() {
    bail!("rollback incomplete for: {}", incomplete.join(", "));
  }

  Ok(())
}
