//! Implementation of the `stackflow validate` command.
//!
//! Builds the dependency graph without touching any provider and prints the
//! stack order with each stack's resource waves and direct upstream stacks.

use std::path::Path;

use anyhow::{Context, Result};

use stackflow_lib::graph::build_graph;

use crate::output::{print_stat, print_success, symbols};

pub fn cmd_validate(file: &Path) -> Result<()> {
  let deployment = super::load_deployment(file)?;
  let graph = build_graph(&deployment).with_context(|| format!("Invalid deployment: {}", file.display()))?;

  print_success(&format!(
    "Deployment '{}' is valid ({} stacks)",
    deployment.environment,
    graph.order().len()
  ));
  print_stat("Order", &graph.order().join(&format!(" {} ", symbols::ARROW)));

  for name in graph.order() {
    let Some(resources) = graph.resources(name) else {
      continue;
    };
    let waves: Vec<String> = resources
      .waves()
      .iter()
      .map(|wave| format!("[{}]", wave.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")))
      .collect();
    let mut line = waves.join(" ");
    let after = graph.stacks().dependencies(name);
    if !after.is_empty() {
      line.push_str(&format!(" (after {})", after.join(", ")));
    }
    print_stat(name, &line);
  }

  Ok(())
}
