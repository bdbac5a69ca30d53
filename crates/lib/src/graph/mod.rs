//! Deployment graph construction and validation.
//!
//! [`build_graph`] is a pure function over the declared deployment. It checks
//! every reference, computes the stack order, and computes each stack's
//! resource waves. Anything it rejects is a definition error, so the
//! orchestrator never starts a deployment that could fail for that reason.

mod dag;
mod resources;
mod stacks;
mod types;

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::deployment::{Context, Deployment};
use crate::stack::Stack;
use crate::value::Reference;

pub use dag::DependencyDag;
pub use resources::ResourceGraph;
pub use stacks::StackGraph;
pub use types::{CycleError, GraphError};

/// The validated graph of a deployment.
#[derive(Debug, Clone)]
pub struct DeploymentGraph {
  stacks: StackGraph,
  resources: BTreeMap<String, ResourceGraph>,
}

impl DeploymentGraph {
  /// Stack deployment order.
  pub fn order(&self) -> &[String] {
    self.stacks.order()
  }

  pub fn stacks(&self) -> &StackGraph {
    &self.stacks
  }

  pub fn resources(&self, stack: &str) -> Option<&ResourceGraph> {
    self.resources.get(stack)
  }
}

/// Validate a deployment and compute its order.
///
/// # Errors
///
/// Returns the first definition error found, see [`GraphError`].
pub fn build_graph(deployment: &Deployment) -> Result<DeploymentGraph, GraphError> {
  let mut declared: HashMap<&str, &Stack> = HashMap::new();
  for stack in &deployment.stacks {
    if declared.insert(stack.name.as_str(), stack).is_some() {
      return Err(GraphError::DuplicateStack(stack.name.clone()));
    }
  }

  for stack in &deployment.stacks {
    validate_stack(stack, &declared, &deployment.context)?;
  }

  let stacks = StackGraph::build(&deployment.stacks)?;

  let mut resources = BTreeMap::new();
  for stack in &deployment.stacks {
    let graph = ResourceGraph::build(stack)?;
    debug!(stack = %stack.name, waves = graph.waves().len(), "resource graph built");
    resources.insert(stack.name.clone(), graph);
  }

  info!(
    environment = %deployment.environment,
    stacks = deployment.stacks.len(),
    order = ?stacks.order(),
    "deployment graph built"
  );

  Ok(DeploymentGraph { stacks, resources })
}

fn validate_stack(stack: &Stack, declared: &HashMap<&str, &Stack>, context: &Context) -> Result<(), GraphError> {
  let mut ids = HashSet::new();
  for spec in &stack.resources {
    if !ids.insert(&spec.id) {
      return Err(GraphError::DuplicateResource {
        stack: stack.name.clone(),
        resource: spec.id.clone(),
      });
    }
  }

  let produced = |reference: &Reference| {
    declared
      .get(reference.stack.as_str())
      .is_some_and(|producer| producer.produced_outputs.contains_key(&reference.output))
  };

  if let Some(reference) = stack.required_inputs.iter().find(|r| !produced(*r)) {
    return Err(GraphError::UnknownReference {
      stack: stack.name.clone(),
      reference: reference.clone(),
    });
  }

  for spec in &stack.resources {
    if let Some(attribute) = spec.config.keys().find(|attr| !spec.kind.accepts(attr)) {
      return Err(GraphError::UnsupportedAttribute {
        stack: stack.name.clone(),
        resource: spec.id.clone(),
        kind: spec.kind.tag(),
        attribute: attribute.clone(),
      });
    }

    let refs = spec.references().map_err(|source| GraphError::Placeholder {
      stack: stack.name.clone(),
      resource: spec.id.clone(),
      source,
    })?;

    if let Some(reference) = refs.outputs.iter().find(|r| !produced(*r)) {
      return Err(GraphError::UnknownReference {
        stack: stack.name.clone(),
        reference: reference.clone(),
      });
    }

    if let Some(reference) = refs.outputs.iter().find(|r| !stack.required_inputs.contains(*r)) {
      return Err(GraphError::UndeclaredInput {
        stack: stack.name.clone(),
        resource: spec.id.clone(),
        reference: reference.clone(),
      });
    }

    if let Some(name) = refs.contexts.iter().find(|name| !context.contains_key(*name)) {
      return Err(GraphError::UnknownContext {
        stack: stack.name.clone(),
        resource: spec.id.clone(),
        name: name.clone(),
      });
    }

    for attr in &refs.attrs {
      let Some(target) = stack.get(&attr.resource) else {
        return Err(GraphError::UnknownResource {
          stack: stack.name.clone(),
          resource: spec.id.clone(),
          target: attr.resource.clone(),
        });
      };

      if !target.kind.exposes(&attr.attribute) {
        return Err(GraphError::UnknownAttribute {
          stack: stack.name.clone(),
          resource: spec.id.clone(),
          target: attr.resource.clone(),
          attribute: attr.attribute.clone(),
        });
      }
    }

    if let Some(target) = spec.depends_on.iter().find(|id| !ids.contains(id)) {
      return Err(GraphError::UnknownResource {
        stack: stack.name.clone(),
        resource: spec.id.clone(),
        target: target.clone(),
      });
    }
  }

  for (output, binding) in &stack.produced_outputs {
    let Some(target) = stack.get(&binding.resource) else {
      return Err(GraphError::InvalidOutput {
        stack: stack.name.clone(),
        output: output.clone(),
        reason: format!("unknown resource '{}'", binding.resource),
      });
    };

    if !target.kind.exposes(&binding.attribute) {
      return Err(GraphError::InvalidOutput {
        stack: stack.name.clone(),
        output: output.clone(),
        reason: format!("type {} has no attribute '{}'", target.kind, binding.attribute),
      });
    }
  }

  Ok(())
}
