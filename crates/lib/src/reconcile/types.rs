//! Types for stack reconciliation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::placeholder::PlaceholderError;
use crate::provider::{LiveState, Operation, ProviderError};
use crate::resource::{ResourceAddress, ResourceKind};
use crate::value::{Reference, Value};

/// How a resource's live state relates to its desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
  /// Absent from the provider.
  Create,
  /// Differs in at least one tracked attribute.
  Update,
  Unchanged,
  /// Live but no longer declared. Never executed by reconciliation.
  Delete,
}

impl fmt::Display for ChangeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ChangeKind::Create => "create",
      ChangeKind::Update => "update",
      ChangeKind::Unchanged => "unchanged",
      ChangeKind::Delete => "delete",
    };
    f.write_str(s)
  }
}

/// The classified change for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
  pub address: ResourceAddress,
  pub kind: ResourceKind,
  pub change: ChangeKind,
  /// Tracked attributes that differ, for updates.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub attributes: Vec<String>,
}

/// A provider mutation that was carried out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedOperation {
  pub address: ResourceAddress,
  pub operation: Operation,
  pub attempts: u32,
  /// Live state before the operation, for updates.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub previous: Option<LiveState>,
}

/// Result of reconciling one stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileResult {
  /// One entry per declared resource in declaration order, then obsolete ones.
  pub changes: Vec<ResourceChange>,
  /// Mutations in application order.
  pub operations: Vec<AppliedOperation>,
  pub outputs: BTreeMap<String, Value>,
  /// Retries across every provider call of the stack.
  pub retries: u32,
}

impl ReconcileResult {
  fn with_change(&self, change: ChangeKind) -> Vec<&ResourceAddress> {
    self
      .changes
      .iter()
      .filter(|c| c.change == change)
      .map(|c| &c.address)
      .collect()
  }

  pub fn created(&self) -> Vec<&ResourceAddress> {
    self.with_change(ChangeKind::Create)
  }

  pub fn updated(&self) -> Vec<&ResourceAddress> {
    self.with_change(ChangeKind::Update)
  }

  pub fn unchanged(&self) -> Vec<&ResourceAddress> {
    self.with_change(ChangeKind::Unchanged)
  }

  /// Obsolete resources, reported for an explicit prune.
  pub fn deleted(&self) -> Vec<&ResourceAddress> {
    self.with_change(ChangeKind::Delete)
  }
}

/// Planned changes for one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackPlan {
  pub stack: String,
  pub changes: Vec<ResourceChange>,
  /// Output values; unknown ones render as `(known after apply)`.
  pub outputs: BTreeMap<String, Value>,
}

impl StackPlan {
  pub fn count(&self, change: ChangeKind) -> usize {
    self.changes.iter().filter(|c| c.change == change).count()
  }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
  #[error("input '{0}' was not resolved before reconciliation")]
  UnresolvedInput(Reference),

  #[error("failed to materialize config of {resource}: {source}")]
  Materialize {
    resource: ResourceAddress,
    #[source]
    source: PlaceholderError,
  },

  #[error("{operation} of {resource} failed after {attempts} attempt(s): {source}")]
  Provider {
    resource: ResourceAddress,
    operation: Operation,
    attempts: u32,
    #[source]
    source: ProviderError,
  },

  #[error("{resource} did not stabilize within {waited:?}")]
  StabilizationTimeout { resource: ResourceAddress, waited: Duration },

  #[error("output '{output}' unavailable: {resource} has no attribute '{attribute}'")]
  MissingOutput {
    output: String,
    resource: ResourceAddress,
    attribute: String,
  },

  #[error("{resource} disappeared after it was applied")]
  Vanished { resource: ResourceAddress },

  #[error("task for {resource} did not complete: {message}")]
  TaskFailed { resource: ResourceAddress, message: String },

  #[error("reconciliation cancelled")]
  Cancelled,
}

impl ReconcileError {
  /// The resource the failure happened on, when there is one.
  pub fn resource(&self) -> Option<&ResourceAddress> {
    match self {
      ReconcileError::Materialize { resource, .. }
      | ReconcileError::Provider { resource, .. }
      | ReconcileError::StabilizationTimeout { resource, .. }
      | ReconcileError::MissingOutput { resource, .. }
      | ReconcileError::Vanished { resource }
      | ReconcileError::TaskFailed { resource, .. } => Some(resource),
      ReconcileError::UnresolvedInput(_) | ReconcileError::Cancelled => None,
    }
  }

  /// The provider operation that failed, when there is one.
  pub fn operation(&self) -> Option<Operation> {
    match self {
      ReconcileError::Provider { operation, .. } => Some(*operation),
      ReconcileError::StabilizationTimeout { .. } => Some(Operation::IsStable),
      _ => None,
    }
  }
}

/// A failed reconciliation, with everything applied before the failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct ReconcileFailure {
  #[source]
  pub error: ReconcileError,
  pub changes: Vec<ResourceChange>,
  /// Operations that completed and stay live.
  pub operations: Vec<AppliedOperation>,
  pub retries: u32,
}

impl ReconcileFailure {
  pub fn new(error: ReconcileError) -> Self {
    Self {
      error,
      changes: Vec::new(),
      operations: Vec::new(),
      retries: 0,
    }
  }
}
