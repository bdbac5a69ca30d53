//! Implementation of the `stackflow prune` command.
//!
//! Deletes the live resources a saved report lists as no longer declared.
//! Deployments never do this on their own.

use std::path::Path;

use anyhow::{Context, Result, bail};

use stackflow_lib::orchestrator::{DeploymentReport, Orchestrator, PruneReport};
use stackflow_lib::resource::ResourceAddress;

use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, print_success, symbols};

pub fn cmd_prune(report_path: &Path, state: &Path, dry_run: bool, output: OutputFormat) -> Result<()> {
  let report = DeploymentReport::load(report_path)
    .with_context(|| format!("Failed to load report: {}", report_path.display()))?;
  let obsolete: Vec<ResourceAddress> = report.obsolete().into_iter().cloned().collect();

  if dry_run {
    if output.is_json() {
      return print_json(&obsolete);
    }
    if obsolete.is_empty() {
      print_info("Nothing to prune.");
    } else {
      print_info("Dry run - no changes made");
      for address in &obsolete {
        println!("  {} {}", symbols::REMOVE, address);
      }
    }
    return Ok(());
  }

  if obsolete.is_empty() {
    if output.is_json() {
      return print_json(&PruneReport::default());
    }
    print_info("Nothing to prune.");
    return Ok(());
  }

  let provider = super::open_state(state)?;
  let orchestrator = Orchestrator::new(provider);
  let rt = super::runtime()?;
  let result = rt.block_on(orchestrator.prune(&obsolete));

  if output.is_json() {
    print_json(&result)?;
  } else {
    for address in &result.deleted {
      println!("  {} {}", symbols::REMOVE, address);
    }
    for failure in &result.failed {
      print_error(&format!("{}: {}", failure.address, failure.error));
    }
    println!();
    if result.failed.is_empty() {
      print_success("Prune complete!");
    }
    print_stat("Deleted", &result.deleted.len().to_string());
    print_stat("Failed", &result.failed.len().to_string());
  }

  if !result.failed.is_empty() {
    bail!("{} resource(s) could not be pruned", result.failed.len());
  }

  Ok(())
}
