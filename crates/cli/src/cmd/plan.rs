//! Implementation of the `stackflow plan` command.
//!
//! Classifies every resource of the deployment against the local state file
//! without applying anything.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use stackflow_lib::orchestrator::Orchestrator;
use stackflow_lib::reconcile::ChangeKind;

use crate::output::{OutputFormat, print_change, print_info, print_json, print_stat};

pub fn cmd_plan(file: &Path, state: &Path, output: OutputFormat) -> Result<()> {
  let deployment = super::load_deployment(file)?;
  let provider = super::open_state(state)?;
  let orchestrator = Orchestrator::new(provider);

  let rt = super::runtime()?;
  let plan = rt.block_on(orchestrator.plan(&deployment)).context("Plan failed")?;

  if output.is_json() {
    return print_json(&plan);
  }

  let pending = plan.count(ChangeKind::Create) + plan.count(ChangeKind::Update) + plan.count(ChangeKind::Delete);
  if pending == 0 {
    print_info("No changes. Live state matches the deployment.");
    return Ok(());
  }

  for stack in &plan.stacks {
    println!();
    println!("{}", stack.stack.if_supports_color(Stream::Stdout, |s| s.bold()));
    for change in &stack.changes {
      print_change(change.change, &change.address.to_string(), &change.attributes);
    }
  }

  println!();
  print_stat("To create", &plan.count(ChangeKind::Create).to_string());
  print_stat("To update", &plan.count(ChangeKind::Update).to_string());
  print_stat("Unchanged", &plan.count(ChangeKind::Unchanged).to_string());
  print_stat("Obsolete", &plan.count(ChangeKind::Delete).to_string());

  Ok(())
}
