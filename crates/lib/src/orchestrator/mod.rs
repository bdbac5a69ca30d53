//! Deploying a whole set of stacks.
//!
//! Stacks run one at a time in topological order. Each is resolved against
//! the outputs recorded so far, reconciled, and on success its outputs are
//! recorded for the stacks after it. The first failure halts the pipeline
//! (or only its dependents, see [`FailurePolicy`]). Nothing is undone
//! automatically: the report carries a [`RollbackPlan`] instead.

mod report;
mod rollback;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::deployment::Deployment;
use crate::graph::{DeploymentGraph, GraphError, build_graph};
use crate::outputs::{OutputStore, ResolvedInputs};
use crate::provider::{Operation, Provider};
use crate::reconcile::{ReconcileError, Reconciler, RetryPolicy, StabilizeConfig, with_retry};
use crate::resource::ResourceAddress;
use crate::stack::StackStatus;
use crate::value::Value;

pub use report::{
  DeploymentPlan, DeploymentReport, FailureSummary, PruneFailure, PruneReport, ReportError, SkipReason,
  StackFailure, StackReport,
};
pub use rollback::{RollbackAction, RollbackPlan, RollbackReport, RollbackStep, StepOutcome, StepReport};

/// What happens to the remaining stacks once one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
  /// Attempt nothing after the first failure.
  #[default]
  HaltPipeline,
  /// Keep deploying stacks that do not depend on a failed one.
  SkipDependents,
}

/// Configuration for a deployment run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  /// Resources reconciled concurrently within a stack.
  pub parallelism: usize,
  pub retry: RetryPolicy,
  pub stabilize: StabilizeConfig,
  /// Stop starting new operations after this long.
  pub deployment_timeout: Option<Duration>,
  pub failure_policy: FailurePolicy,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      parallelism: std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4),
      retry: RetryPolicy::default(),
      stabilize: StabilizeConfig::default(),
      deployment_timeout: None,
      failure_policy: FailurePolicy::default(),
    }
  }
}

#[derive(Debug, Error)]
pub enum PlanError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error("failed to plan stack '{stack}': {source}")]
  Stack {
    stack: String,
    #[source]
    source: ReconcileError,
  },
}

pub struct Orchestrator {
  provider: Arc<dyn Provider>,
  config: OrchestratorConfig,
  cancel: CancelToken,
}

impl Orchestrator {
  pub fn new(provider: Arc<dyn Provider>) -> Self {
    Self {
      provider,
      config: OrchestratorConfig::default(),
      cancel: CancelToken::new(),
    }
  }

  pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
    self.config = config;
    self
  }

  /// Share a cancellation token with the caller, e.g. a signal handler.
  pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn cancel_token(&self) -> &CancelToken {
    &self.cancel
  }

  pub fn config(&self) -> &OrchestratorConfig {
    &self.config
  }

  fn reconciler(&self, cancel: &CancelToken) -> Reconciler {
    Reconciler::new(self.provider.clone())
      .with_parallelism(self.config.parallelism)
      .with_retry(self.config.retry)
      .with_stabilize(self.config.stabilize)
      .with_cancel_token(cancel.clone())
  }

  /// Deploy every stack of `deployment`.
  ///
  /// # Errors
  ///
  /// Only definition errors are returned; they are detected before any
  /// provider call. Everything that goes wrong at run time is in the report.
  pub async fn deploy(&self, deployment: &Deployment) -> Result<DeploymentReport, GraphError> {
    let graph = build_graph(deployment)?;
    let started = Instant::now();
    let started_at = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs();

    info!(
      environment = %deployment.environment,
      stacks = graph.order().len(),
      "starting deployment"
    );

    // Scoped to this run; the timer never cancels the shared token.
    let run = self.cancel.child_token();
    let timer = self.config.deployment_timeout.map(|t| run.cancel_after(t));
    let store = OutputStore::new();
    let reconciler = self.reconciler(&run);

    let mut stacks = Vec::with_capacity(graph.order().len());
    let mut failed: Vec<String> = Vec::new();
    let mut first_failure = None;
    let mut rollback = Vec::new();

    for name in graph.order() {
      let (Some(stack), Some(resources)) = (deployment.get(name), graph.resources(name)) else {
        continue;
      };

      if let Some(reason) = self.skip_reason(&run, &graph, name, &failed) {
        warn!(stack = %name, reason = %reason, "skipping stack");
        stacks.push(StackReport::skipped(name, reason));
        continue;
      }

      let stack_started = Instant::now();
      let mut status = StackStatus::Pending;
      transition(&mut status, StackStatus::InProgress);
      info!(stack = %name, "deploying stack");

      let mut report = StackReport::new(name);

      let outcome = match store.resolve(&stack.required_inputs) {
        Ok(inputs) => {
          debug!(stack = %name, inputs = inputs.len(), "inputs resolved");
          reconciler
            .apply(stack, resources, &inputs, &deployment.context)
            .await
            .map_err(|failure| {
              report.operations = failure.operations.clone();
              report.changes = failure.changes.clone();
              report.retries = failure.retries;
              StackFailure {
                resource: failure.error.resource().cloned(),
                operation: failure.error.operation(),
                message: failure.error.to_string(),
              }
            })
        }
        Err(e) => Err(StackFailure {
          resource: None,
          operation: None,
          message: e.to_string(),
        }),
      };

      let outcome = outcome.and_then(|result| {
        store
          .record(name, result.outputs.clone())
          .map(|()| result)
          .map_err(|e| StackFailure {
            resource: None,
            operation: None,
            message: e.to_string(),
          })
      });

      match outcome {
        Ok(result) => {
          transition(&mut status, StackStatus::Succeeded);
          info!(stack = %name, outputs = result.outputs.len(), retries = result.retries, "stack succeeded");
          report.outputs = result.outputs;
          report.operations = result.operations;
          report.changes = result.changes;
          report.retries = result.retries;
        }
        Err(failure) => {
          transition(&mut status, StackStatus::Failed);
          error!(stack = %name, error = %failure.message, "stack failed");

          let plan = RollbackPlan::from_operations(name, &report.operations);
          if !plan.is_empty() {
            rollback.push(plan);
          }
          first_failure.get_or_insert_with(|| FailureSummary {
            stack: name.clone(),
            failure: failure.clone(),
          });
          failed.push(name.clone());
          report.error = Some(failure);
        }
      }

      report.status = status;
      report.duration_ms = stack_started.elapsed().as_millis() as u64;
      stacks.push(report);
    }

    // A cancelled token makes the timer return promptly, with `true` only if
    // it fired itself.
    let timed_out = match timer {
      Some(handle) if run.is_cancelled() => handle.await.unwrap_or(false),
      Some(handle) => {
        handle.abort();
        false
      }
      None => false,
    };
    let cancelled = run.is_cancelled();

    let report = DeploymentReport {
      environment: deployment.environment.clone(),
      order: graph.order().to_vec(),
      stacks,
      first_failure,
      rollback,
      cancelled,
      timed_out,
      started_at,
      duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
      succeeded = report.succeeded().len(),
      failed = report.failed().len(),
      skipped = report.skipped().len(),
      cancelled,
      timed_out,
      "deployment complete"
    );

    Ok(report)
  }

  fn skip_reason(
    &self,
    run: &CancelToken,
    graph: &DeploymentGraph,
    stack: &str,
    failed: &[String],
  ) -> Option<SkipReason> {
    if run.is_cancelled() {
      return Some(SkipReason::Cancelled);
    }

    let upstream = graph.stacks().upstream(stack);
    if let Some(root) = failed.iter().find(|f| upstream.contains(*f)) {
      return Some(SkipReason::DependencyFailed { stack: root.clone() });
    }

    match (self.config.failure_policy, failed.first()) {
      (FailurePolicy::HaltPipeline, Some(after)) => Some(SkipReason::PipelineHalted { after: after.clone() }),
      _ => None,
    }
  }

  /// Dry run: classify every resource of every stack without applying.
  pub async fn plan(&self, deployment: &Deployment) -> Result<DeploymentPlan, PlanError> {
    let graph = build_graph(deployment)?;
    let reconciler = self.reconciler(&self.cancel);
    let mut planned: HashMap<String, BTreeMap<String, Value>> = HashMap::new();
    let mut stacks = Vec::with_capacity(graph.order().len());

    for name in graph.order() {
      let (Some(stack), Some(resources)) = (deployment.get(name), graph.resources(name)) else {
        continue;
      };

      let inputs: ResolvedInputs = stack
        .required_inputs
        .iter()
        .filter_map(|r| {
          planned
            .get(&r.stack)
            .and_then(|outputs| outputs.get(&r.output))
            .map(|value| (r.clone(), value.clone()))
        })
        .collect();

      let plan = reconciler
        .plan(stack, resources, &inputs, &deployment.context)
        .await
        .map_err(|source| PlanError::Stack {
          stack: name.clone(),
          source,
        })?;

      info!(stack = %name, changes = plan.changes.len(), "stack planned");
      planned.insert(name.clone(), plan.outputs.clone());
      stacks.push(plan);
    }

    Ok(DeploymentPlan {
      environment: deployment.environment.clone(),
      order: graph.order().to_vec(),
      stacks,
    })
  }

  /// Execute a rollback plan, stopping at the first failed step.
  pub async fn rollback(&self, plan: &RollbackPlan) -> RollbackReport {
    info!(stack = %plan.stack, steps = plan.steps.len(), "rolling back stack");
    let provider = self.provider.as_ref();
    let mut steps = Vec::with_capacity(plan.steps.len());
    let mut halted = false;

    for step in &plan.steps {
      if halted {
        steps.push(StepReport {
          step: step.clone(),
          outcome: StepOutcome::NotAttempted,
        });
        continue;
      }

      let address = &step.address;
      let result = match &step.action {
        RollbackAction::Delete => {
          with_retry(&self.config.retry, &self.cancel, address, Operation::Delete, || {
            provider.delete(address)
          })
          .await
          .map(|_| ())
        }
        RollbackAction::Restore { config } => {
          with_retry(&self.config.retry, &self.cancel, address, Operation::Update, || {
            provider.update(address, config)
          })
          .await
          .map(|_| ())
        }
      };

      let outcome = match result {
        Ok(()) => {
          info!(resource = %address, "rollback step done");
          StepOutcome::Done
        }
        Err(e) => {
          error!(resource = %address, error = %e, "rollback step failed");
          halted = true;
          StepOutcome::Failed { error: e.to_string() }
        }
      };
      steps.push(StepReport {
        step: step.clone(),
        outcome,
      });
    }

    RollbackReport {
      stack: plan.stack.clone(),
      steps,
    }
  }

  /// Delete resources that are no longer declared.
  ///
  /// Never called by `deploy`; the caller decides what to remove, typically
  /// from [`DeploymentReport::obsolete`].
  pub async fn prune(&self, addresses: &[ResourceAddress]) -> PruneReport {
    let provider = self.provider.as_ref();
    let mut report = PruneReport::default();

    for address in addresses {
      let result = with_retry(&self.config.retry, &self.cancel, address, Operation::Delete, || {
        provider.delete(address)
      })
      .await;

      match result {
        Ok(_) => {
          info!(resource = %address, "pruned");
          report.deleted.push(address.clone());
        }
        Err(e) => {
          warn!(resource = %address, error = %e, "prune failed");
          report.failed.push(PruneFailure {
            address: address.clone(),
            error: e.to_string(),
          });
        }
      }
    }

    report
  }
}

fn transition(status: &mut StackStatus, next: StackStatus) {
  debug_assert!(status.can_transition_to(next), "illegal transition {status} -> {next}");
  *status = next;
}
