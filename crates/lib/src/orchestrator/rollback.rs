//! Undo plans for partially applied stacks.

use serde::{Deserialize, Serialize};

use crate::provider::Operation;
use crate::reconcile::AppliedOperation;
use crate::resource::ResourceAddress;
use crate::value::Attributes;

/// What undoing one operation takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RollbackAction {
  /// Remove a resource the failed attempt created.
  Delete,
  /// Put back the configuration an update replaced.
  Restore { config: Attributes },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackStep {
  pub address: ResourceAddress,
  #[serde(flatten)]
  pub action: RollbackAction,
}

/// Steps that revert a failed stack attempt, newest first.
///
/// Only built, never executed, by `deploy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPlan {
  pub stack: String,
  pub steps: Vec<RollbackStep>,
}

impl RollbackPlan {
  pub fn from_operations(stack: impl Into<String>, operations: &[AppliedOperation]) -> Self {
    let steps = operations
      .iter()
      .rev()
      .filter_map(|op| {
        let action = match (op.operation, &op.previous) {
          (Operation::Create, _) => RollbackAction::Delete,
          (Operation::Update, Some(previous)) => RollbackAction::Restore {
            config: previous.config.clone(),
          },
          _ => return None,
        };
        Some(RollbackStep {
          address: op.address.clone(),
          action,
        })
      })
      .collect();

    Self {
      stack: stack.into(),
      steps,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
  Done,
  Failed { error: String },
  /// An earlier step failed.
  NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
  pub step: RollbackStep,
  #[serde(flatten)]
  pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackReport {
  pub stack: String,
  pub steps: Vec<StepReport>,
}

impl RollbackReport {
  /// Every step completed.
  pub fn is_complete(&self) -> bool {
    self.steps.iter().all(|s| s.outcome == StepOutcome::Done)
  }
}
