use crate::resource::ResourceId;
use crate::stack::Stack;

use super::dag::DependencyDag;
use super::types::{CycleError, GraphError};

/// Resource-level dependency graph of one stack.
///
/// Edges come from `dependsOn` and from attribute references in config.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
  order: Vec<ResourceId>,
  waves: Vec<Vec<ResourceId>>,
}

impl ResourceGraph {
  pub(crate) fn build(stack: &Stack) -> Result<Self, GraphError> {
    let mut dag = DependencyDag::new();
    for spec in &stack.resources {
      dag.add_node(spec.id.clone());
    }

    for spec in &stack.resources {
      let deps = spec.dependencies().map_err(|source| GraphError::Placeholder {
        stack: stack.name.clone(),
        resource: spec.id.clone(),
        source,
      })?;

      for dep in deps {
        dag.add_edge(&dep, &spec.id);
      }
    }

    let cycle = |members: Vec<ResourceId>| CycleError {
      stack: Some(stack.name.clone()),
      members: members.into_iter().map(|id| id.0).collect(),
    };

    let order = dag.topological_order().map_err(cycle)?;
    let waves = dag.waves().map_err(cycle)?;

    Ok(Self { order, waves })
  }

  /// Resources in apply order, ties broken by declaration order.
  pub fn order(&self) -> &[ResourceId] {
    &self.order
  }

  /// Groups of resources that may be applied concurrently.
  pub fn waves(&self) -> &[Vec<ResourceId>] {
    &self.waves
  }
}
