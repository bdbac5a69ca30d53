use std::collections::HashSet;

use crate::stack::Stack;

use super::dag::DependencyDag;
use super::types::CycleError;

/// Stack-level dependency graph.
///
/// An edge B → A exists when stack A requires an output of stack B.
#[derive(Debug, Clone)]
pub struct StackGraph {
  dag: DependencyDag<String>,
  order: Vec<String>,
}

impl StackGraph {
  /// Build from stacks whose required inputs have already been validated.
  pub(crate) fn build(stacks: &[Stack]) -> Result<Self, CycleError> {
    let mut dag = DependencyDag::new();
    for stack in stacks {
      dag.add_node(stack.name.clone());
    }

    for stack in stacks {
      for producer in stack.upstream() {
        dag.add_edge(&producer.to_string(), &stack.name);
      }
    }

    let order = dag
      .topological_order()
      .map_err(|members| CycleError { stack: None, members })?;

    Ok(Self { dag, order })
  }

  /// Deployment order: every stack after all stacks it references.
  pub fn order(&self) -> &[String] {
    &self.order
  }

  /// Stacks `stack` directly consumes outputs from.
  pub fn dependencies(&self, stack: &str) -> Vec<String> {
    self.dag.dependencies(&stack.to_string())
  }

  /// Every stack `stack` depends on, directly or transitively.
  pub fn upstream(&self, stack: &str) -> HashSet<String> {
    self.dag.transitive_dependencies(&stack.to_string())
  }
}
