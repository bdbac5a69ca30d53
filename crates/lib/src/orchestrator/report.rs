//! Deployment reports and plans.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::outputs::{OutputStore, temp_path};
use crate::provider::Operation;
use crate::reconcile::{AppliedOperation, ChangeKind, ResourceChange, StackPlan};
use crate::resource::ResourceAddress;
use crate::stack::StackStatus;
use crate::value::Value;

use super::rollback::RollbackPlan;

#[derive(Debug, Error)]
pub enum ReportError {
  #[error("failed to read report {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write report {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse report: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize report: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// Why a stack was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
  /// The stack transitively depends on `stack`, which failed.
  DependencyFailed { stack: String },
  /// The pipeline stopped after `after` failed.
  PipelineHalted { after: String },
  Cancelled,
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SkipReason::DependencyFailed { stack } => write!(f, "depends on failed stack '{stack}'"),
      SkipReason::PipelineHalted { after } => write!(f, "pipeline halted after '{after}' failed"),
      SkipReason::Cancelled => f.write_str("deployment cancelled"),
    }
  }
}

/// Failure context of one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFailure {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource: Option<ResourceAddress>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub operation: Option<Operation>,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackReport {
  pub stack: String,
  pub status: StackStatus,
  #[serde(default)]
  pub outputs: BTreeMap<String, Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<StackFailure>,
  #[serde(default)]
  pub operations: Vec<AppliedOperation>,
  #[serde(default)]
  pub changes: Vec<ResourceChange>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub skipped: Option<SkipReason>,
  #[serde(default)]
  pub retries: u32,
  #[serde(default)]
  pub duration_ms: u64,
}

impl StackReport {
  pub fn new(stack: impl Into<String>) -> Self {
    Self {
      stack: stack.into(),
      status: StackStatus::Pending,
      outputs: BTreeMap::new(),
      error: None,
      operations: Vec::new(),
      changes: Vec::new(),
      skipped: None,
      retries: 0,
      duration_ms: 0,
    }
  }

  /// A stack that stays `Pending` because it was never attempted.
  pub fn skipped(stack: impl Into<String>, reason: SkipReason) -> Self {
    Self {
      skipped: Some(reason),
      ..Self::new(stack)
    }
  }
}

/// The first failing stack and its cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
  pub stack: String,
  #[serde(flatten)]
  pub failure: StackFailure,
}

/// Outcome of one `deploy` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentReport {
  pub environment: String,
  /// Topological stack order.
  pub order: Vec<String>,
  /// One entry per stack, in `order`.
  pub stacks: Vec<StackReport>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_failure: Option<FailureSummary>,
  /// Undo plans for failed stacks. Never executed automatically.
  #[serde(default)]
  pub rollback: Vec<RollbackPlan>,
  #[serde(default)]
  pub cancelled: bool,
  #[serde(default)]
  pub timed_out: bool,
  /// Unix seconds.
  pub started_at: u64,
  pub duration_ms: u64,
}

impl DeploymentReport {
  /// Every stack succeeded.
  pub fn is_success(&self) -> bool {
    self.stacks.iter().all(|s| s.status == StackStatus::Succeeded)
  }

  fn with_status(&self, status: StackStatus) -> Vec<&str> {
    self
      .stacks
      .iter()
      .filter(|s| s.status == status && s.skipped.is_none())
      .map(|s| s.stack.as_str())
      .collect()
  }

  pub fn succeeded(&self) -> Vec<&str> {
    self.with_status(StackStatus::Succeeded)
  }

  pub fn failed(&self) -> Vec<&str> {
    self.with_status(StackStatus::Failed)
  }

  pub fn skipped(&self) -> Vec<(&str, &SkipReason)> {
    self
      .stacks
      .iter()
      .filter_map(|s| s.skipped.as_ref().map(|reason| (s.stack.as_str(), reason)))
      .collect()
  }

  pub fn stack(&self, name: &str) -> Option<&StackReport> {
    self.stacks.iter().find(|s| s.stack == name)
  }

  /// Outputs of the succeeded stacks, recorded in run order.
  pub fn output_store(&self) -> OutputStore {
    let store = OutputStore::new();
    for stack in self.stacks.iter().filter(|s| s.status == StackStatus::Succeeded) {
      if let Err(e) = store.record(&stack.stack, stack.outputs.clone()) {
        warn!(stack = %stack.stack, error = %e, "duplicate stack in report");
      }
    }
    store
  }

  /// Live resources that are no longer declared, across all stacks.
  pub fn obsolete(&self) -> Vec<&ResourceAddress> {
    self
      .stacks
      .iter()
      .flat_map(|s| &s.changes)
      .filter(|c| c.change == ChangeKind::Delete)
      .map(|c| &c.address)
      .collect()
  }

  pub fn save(&self, path: &Path) -> Result<(), ReportError> {
    let write_err = |source| ReportError::Write {
      path: path.to_path_buf(),
      source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(write_err)?;
    }

    let content = serde_json::to_string_pretty(self).map_err(ReportError::Serialize)?;
    let temp = temp_path(path);
    fs::write(&temp, content).map_err(write_err)?;
    fs::rename(&temp, path).map_err(write_err)?;
    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self, ReportError> {
    let content = fs::read_to_string(path).map_err(|source| ReportError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(ReportError::Parse)
  }
}

/// Outcome of a dry run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
  pub environment: String,
  pub order: Vec<String>,
  pub stacks: Vec<StackPlan>,
}

impl DeploymentPlan {
  pub fn stack(&self, name: &str) -> Option<&StackPlan> {
    self.stacks.iter().find(|s| s.stack == name)
  }

  /// Total changes of one kind across stacks.
  pub fn count(&self, change: ChangeKind) -> usize {
    self.stacks.iter().map(|s| s.count(change)).sum()
  }
}

/// Outcome of an explicit prune.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneReport {
  pub deleted: Vec<ResourceAddress>,
  pub failed: Vec<PruneFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneFailure {
  pub address: ResourceAddress,
  pub error: String,
}
