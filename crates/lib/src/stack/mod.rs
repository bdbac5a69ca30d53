//! Stacks: named collections of resources with declared inputs and outputs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::{ResourceId, ResourceSpec};
use crate::value::Reference;

/// Where a produced output's value comes from once the stack is reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
  pub resource: ResourceId,
  pub attribute: String,
}

/// A named, ordered collection of resource specifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
  pub name: String,

  #[serde(default)]
  pub resources: Vec<ResourceSpec>,

  /// Outputs of other stacks this stack needs before it can reconcile.
  #[serde(default)]
  pub required_inputs: BTreeSet<Reference>,

  /// Output name → the resource attribute that provides it.
  #[serde(default)]
  pub produced_outputs: BTreeMap<String, OutputBinding>,
}

impl Stack {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      resources: Vec::new(),
      required_inputs: BTreeSet::new(),
      produced_outputs: BTreeMap::new(),
    }
  }

  pub fn resource(mut self, spec: ResourceSpec) -> Self {
    self.resources.push(spec);
    self
  }

  /// Declare a required input.
  pub fn requires(mut self, stack: impl Into<String>, output: impl Into<String>) -> Self {
    self.required_inputs.insert(Reference::new(stack, output));
    self
  }

  /// Declare a produced output bound to a resource attribute.
  pub fn output(
    mut self,
    name: impl Into<String>,
    resource: impl Into<String>,
    attribute: impl Into<String>,
  ) -> Self {
    self.produced_outputs.insert(
      name.into(),
      OutputBinding {
        resource: ResourceId::new(resource),
        attribute: attribute.into(),
      },
    );
    self
  }

  /// Add every output referenced from resource configuration to
  /// `required_inputs`.
  ///
  /// Malformed placeholders are skipped here and reported by graph building.
  pub fn infer_inputs(mut self) -> Self {
    let referenced: Vec<Reference> = self
      .resources
      .iter()
      .filter_map(|spec| spec.references().ok())
      .flat_map(|refs| refs.outputs)
      .collect();
    self.required_inputs.extend(referenced);
    self
  }

  pub fn get(&self, id: &ResourceId) -> Option<&ResourceSpec> {
    self.resources.iter().find(|spec| &spec.id == id)
  }

  /// Names of the stacks this stack consumes outputs from.
  pub fn upstream(&self) -> BTreeSet<&str> {
    self.required_inputs.iter().map(|r| r.stack.as_str()).collect()
  }
}

/// Lifecycle of a stack within one deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
  Pending,
  InProgress,
  Succeeded,
  Failed,
}

impl StackStatus {
  /// Whether moving from `self` to `next` is a legal transition.
  ///
  /// Each run moves a stack `Pending → InProgress → Succeeded | Failed`
  /// at most once.
  pub fn can_transition_to(self, next: StackStatus) -> bool {
    matches!(
      (self, next),
      (StackStatus::Pending, StackStatus::InProgress)
        | (StackStatus::InProgress, StackStatus::Succeeded)
        | (StackStatus::InProgress, StackStatus::Failed)
    )
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, StackStatus::Succeeded | StackStatus::Failed)
  }
}

impl fmt::Display for StackStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      StackStatus::Pending => "pending",
      StackStatus::InProgress => "in_progress",
      StackStatus::Succeeded => "succeeded",
      StackStatus::Failed => "failed",
    };
    f.write_str(s)
  }
}
