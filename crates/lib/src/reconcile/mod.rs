//! Converging one stack's resources onto the provider.
//!
//! Resources are applied wave by wave in dependency order. Every resource in
//! a wave runs as its own task, bounded by a semaphore: read the live state,
//! classify the change, create or update, wait for stabilization, then
//! re-read so later waves and outputs see what the provider actually holds.
//!
//! A failure stops the stack before the next wave. Resources that already
//! succeeded stay live and are reported so they can be rolled back.

mod diff;
mod materialize;
mod retry;
mod stabilize;
mod types;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::consts::KNOWN_AFTER_APPLY;
use crate::deployment::Context;
use crate::graph::ResourceGraph;
use crate::outputs::ResolvedInputs;
use crate::provider::{LiveState, Operation, Provider};
use crate::resource::{ResourceAddress, ResourceId, ResourceKind};
use crate::stack::Stack;
use crate::value::{Attributes, Value};

pub use retry::RetryPolicy;
pub use stabilize::StabilizeConfig;
pub use types::{
  AppliedOperation, ChangeKind, ReconcileError, ReconcileFailure, ReconcileResult, ResourceChange, StackPlan,
};

pub(crate) use retry::with_retry;

use diff::diff;
use materialize::Materializer;
use stabilize::wait_until_stable;

/// Shared by every resource task of a reconciliation.
struct TaskContext {
  provider: Arc<dyn Provider>,
  retry: RetryPolicy,
  stabilize: StabilizeConfig,
  cancel: CancelToken,
}

/// Outcome of one successfully reconciled resource.
struct Applied {
  change: ResourceChange,
  operation: Option<AppliedOperation>,
  live: LiveState,
  retries: u32,
}

/// A failed resource task, with the retries it spent.
struct TaskError {
  error: ReconcileError,
  retries: u32,
}

impl From<ReconcileError> for TaskError {
  fn from(error: ReconcileError) -> Self {
    let retries = match &error {
      ReconcileError::Provider { attempts, .. } => attempts.saturating_sub(1),
      _ => 0,
    };
    Self { error, retries }
  }
}

/// Applies stacks against a provider.
pub struct Reconciler {
  provider: Arc<dyn Provider>,
  parallelism: usize,
  retry: RetryPolicy,
  stabilize: StabilizeConfig,
  cancel: CancelToken,
}

impl Reconciler {
  pub fn new(provider: Arc<dyn Provider>) -> Self {
    Self {
      provider,
      parallelism: std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4),
      retry: RetryPolicy::default(),
      stabilize: StabilizeConfig::default(),
      cancel: CancelToken::new(),
    }
  }

  /// Maximum resources in flight at once. Zero is treated as one.
  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn with_stabilize(mut self, stabilize: StabilizeConfig) -> Self {
    self.stabilize = stabilize;
    self
  }

  pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  fn task_context(&self) -> Arc<TaskContext> {
    Arc::new(TaskContext {
      provider: self.provider.clone(),
      retry: self.retry,
      stabilize: self.stabilize,
      cancel: self.cancel.clone(),
    })
  }

  /// Converge every resource of `stack` and compute its outputs.
  ///
  /// Resources no longer declared are reported as [`ChangeKind::Delete`]
  /// but left in place.
  pub async fn apply(
    &self,
    stack: &Stack,
    graph: &ResourceGraph,
    inputs: &ResolvedInputs,
    context: &Context,
  ) -> Result<ReconcileResult, ReconcileFailure> {
    info!(
      stack = %stack.name,
      resources = stack.resources.len(),
      waves = graph.waves().len(),
      "reconciling stack"
    );

    check_inputs(stack, inputs).map_err(ReconcileFailure::new)?;

    let ctx = self.task_context();
    let semaphore = Arc::new(Semaphore::new(self.parallelism));
    let mut live: HashMap<ResourceId, LiveState> = HashMap::new();
    let mut changes: HashMap<ResourceId, ResourceChange> = HashMap::new();
    let mut operations = Vec::new();
    let mut retries = 0;

    let fail = |error: ReconcileError,
                changes: &HashMap<ResourceId, ResourceChange>,
                operations: Vec<AppliedOperation>,
                retries: u32| {
      error!(stack = %stack.name, error = %error, "stack reconciliation failed");
      ReconcileFailure {
        error,
        changes: declared_order(stack, changes),
        operations,
        retries,
      }
    };

    for (wave_idx, wave) in graph.waves().iter().enumerate() {
      if self.cancel.is_cancelled() {
        return Err(fail(ReconcileError::Cancelled, &changes, operations, retries));
      }
      debug!(stack = %stack.name, wave = wave_idx, resources = wave.len(), "applying wave");

      // Attribute references only point at earlier waves, so the desired
      // state of the whole wave is known before any of it starts.
      let materializer = Materializer {
        inputs,
        context,
        live: &live,
        preview: false,
      };
      let mut ready = Vec::with_capacity(wave.len());
      for id in wave {
        let address = ResourceAddress::new(&stack.name, id.as_str());
        let Some(spec) = stack.get(id) else {
          let error = ReconcileError::TaskFailed {
            resource: address,
            message: "resource is not declared in the stack".to_string(),
          };
          return Err(fail(error, &changes, operations, retries));
        };
        match materializer.config(spec) {
          Ok(desired) => ready.push((address, spec.kind.clone(), desired)),
          Err(source) => {
            let error = ReconcileError::Materialize {
              resource: address,
              source,
            };
            return Err(fail(error, &changes, operations, retries));
          }
        }
      }

      let outcomes = apply_wave(&ctx, &semaphore, &ready).await;

      let mut failure = None;
      for ((address, _, _), outcome) in ready.iter().zip(outcomes) {
        match outcome {
          Ok(applied) => {
            info!(resource = %address, change = %applied.change.change, "resource reconciled");
            retries += applied.retries;
            operations.extend(applied.operation);
            changes.insert(address.id.clone(), applied.change);
            live.insert(address.id.clone(), applied.live);
          }
          Err(task) => {
            error!(resource = %address, error = %task.error, "resource failed");
            retries += task.retries;
            failure.get_or_insert(task.error);
          }
        }
      }

      if let Some(error) = failure {
        return Err(fail(error, &changes, operations, retries));
      }
    }

    let mut changes = declared_order(stack, &changes);
    changes.extend(obsolete(ctx.provider.as_ref(), stack).await);

    let outputs = match collect_outputs(stack, &live) {
      Ok(outputs) => outputs,
      Err(error) => {
        error!(stack = %stack.name, error = %error, "stack reconciliation failed");
        return Err(ReconcileFailure {
          error,
          changes,
          operations,
          retries,
        });
      }
    };

    info!(
      stack = %stack.name,
      operations = operations.len(),
      retries,
      "stack reconciled"
    );

    Ok(ReconcileResult {
      changes,
      operations,
      outputs,
      retries,
    })
  }

  /// Classify every resource without mutating anything.
  ///
  /// Values that depend on resources not yet created, or on upstream outputs
  /// not yet known, render as `(known after apply)`.
  pub async fn plan(
    &self,
    stack: &Stack,
    graph: &ResourceGraph,
    inputs: &ResolvedInputs,
    context: &Context,
  ) -> Result<StackPlan, ReconcileError> {
    let provider = self.provider.as_ref();
    let mut planned: HashMap<ResourceId, LiveState> = HashMap::new();
    let mut changes = HashMap::new();

    for id in graph.order() {
      let address = ResourceAddress::new(&stack.name, id.as_str());
      let Some(spec) = stack.get(id) else {
        continue;
      };

      let desired = Materializer {
        inputs,
        context,
        live: &planned,
        preview: true,
      }
      .config(spec)
      .map_err(|source| ReconcileError::Materialize {
        resource: address.clone(),
        source,
      })?;

      let (current, _) = with_retry(&self.retry, &self.cancel, &address, Operation::Read, || {
        provider.read(&address)
      })
      .await?;

      let (change, attributes) = diff(&spec.kind, &desired, current.as_ref());
      debug!(resource = %address, change = %change, "planned");

      let mut computed = match (&current, change) {
        (Some(current), ChangeKind::Unchanged | ChangeKind::Update) => current.attributes.clone(),
        _ => Attributes::new(),
      };
      computed.retain(|name, _| !desired.contains_key(name));

      planned.insert(
        id.clone(),
        LiveState {
          address: address.clone(),
          kind: spec.kind.clone(),
          config: desired,
          attributes: computed,
        },
      );
      changes.insert(
        id.clone(),
        ResourceChange {
          address,
          kind: spec.kind.clone(),
          change,
          attributes,
        },
      );
    }

    let mut changes = declared_order(stack, &changes);
    changes.extend(obsolete(provider, stack).await);

    let outputs = stack
      .produced_outputs
      .iter()
      .map(|(name, binding)| {
        let value = planned
          .get(&binding.resource)
          .and_then(|live| live.attribute(&binding.attribute))
          .cloned()
          .unwrap_or_else(|| Value::from(KNOWN_AFTER_APPLY));
        (name.clone(), value)
      })
      .collect();

    Ok(StackPlan {
      stack: stack.name.clone(),
      changes,
      outputs,
    })
  }
}

/// Every output reference the stack uses must have been resolved.
fn check_inputs(stack: &Stack, inputs: &ResolvedInputs) -> Result<(), ReconcileError> {
  for reference in &stack.required_inputs {
    if !inputs.contains(reference) {
      return Err(ReconcileError::UnresolvedInput(reference.clone()));
    }
  }

  for spec in &stack.resources {
    let refs = spec.references().map_err(|source| ReconcileError::Materialize {
      resource: ResourceAddress::new(&stack.name, spec.id.as_str()),
      source,
    })?;
    if let Some(missing) = refs.outputs.into_iter().find(|r| !inputs.contains(r)) {
      return Err(ReconcileError::UnresolvedInput(missing));
    }
  }

  Ok(())
}

/// Run one wave, returning outcomes in the order of `ready`.
async fn apply_wave(
  ctx: &Arc<TaskContext>,
  semaphore: &Arc<Semaphore>,
  ready: &[(ResourceAddress, ResourceKind, Attributes)],
) -> Vec<Result<Applied, TaskError>> {
  let mut join_set = JoinSet::new();

  for (index, (address, kind, desired)) in ready.iter().enumerate() {
    let ctx = ctx.clone();
    let semaphore = semaphore.clone();
    let address = address.clone();
    let kind = kind.clone();
    let desired = desired.clone();

    join_set.spawn(async move {
      let Ok(_permit) = semaphore.acquire().await else {
        let error = ReconcileError::TaskFailed {
          resource: address,
          message: "semaphore closed".to_string(),
        };
        return (index, Err(TaskError::from(error)));
      };
      if ctx.cancel.is_cancelled() {
        return (index, Err(TaskError::from(ReconcileError::Cancelled)));
      }

      (index, apply_resource(&ctx, address, kind, desired).await)
    });
  }

  let mut slots: Vec<Option<Result<Applied, TaskError>>> = (0..ready.len()).map(|_| None).collect();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((index, outcome)) => {
        if let Some(slot) = slots.get_mut(index) {
          *slot = Some(outcome);
        }
      }
      Err(e) => {
        error!(error = %e, "resource task panicked");
      }
    }
  }

  slots
    .into_iter()
    .zip(ready)
    .map(|(slot, (address, _, _))| {
      slot.unwrap_or_else(|| {
        Err(TaskError::from(ReconcileError::TaskFailed {
          resource: address.clone(),
          message: "task panicked".to_string(),
        }))
      })
    })
    .collect()
}

async fn apply_resource(
  ctx: &TaskContext,
  address: ResourceAddress,
  kind: ResourceKind,
  desired: Attributes,
) -> Result<Applied, TaskError> {
  let provider = ctx.provider.as_ref();
  let mut retries = 0;

  let (current, attempts) = with_retry(&ctx.retry, &ctx.cancel, &address, Operation::Read, || {
    provider.read(&address)
  })
  .await?;
  retries += attempts - 1;

  let (change, attributes) = diff(&kind, &desired, current.as_ref());
  debug!(resource = %address, change = %change, changed = ?attributes, "classified");

  let (mut live, operation) = match (change, current) {
    (ChangeKind::Create, _) => {
      let (live, attempts) = with_retry(&ctx.retry, &ctx.cancel, &address, Operation::Create, || {
        provider.create(&address, &kind, &desired)
      })
      .await
      .map_err(|e| with_retries(e, retries))?;
      retries += attempts - 1;
      let operation = AppliedOperation {
        address: address.clone(),
        operation: Operation::Create,
        attempts,
        previous: None,
      };
      (live, Some(operation))
    }
    (ChangeKind::Update, Some(previous)) => {
      let (live, attempts) = with_retry(&ctx.retry, &ctx.cancel, &address, Operation::Update, || {
        provider.update(&address, &desired)
      })
      .await
      .map_err(|e| with_retries(e, retries))?;
      retries += attempts - 1;
      let operation = AppliedOperation {
        address: address.clone(),
        operation: Operation::Update,
        attempts,
        previous: Some(previous),
      };
      (live, Some(operation))
    }
    (_, Some(current)) => (current, None),
    (_, None) => {
      return Err(with_retries(ReconcileError::Vanished { resource: address }, retries));
    }
  };

  if kind.stabilizes() {
    wait_until_stable(provider, &live, &ctx.stabilize, &ctx.cancel)
      .await
      .map_err(|e| with_retries(e, retries))?;
  }

  if operation.is_some() || kind.stabilizes() {
    let (fresh, attempts) = with_retry(&ctx.retry, &ctx.cancel, &address, Operation::Read, || {
      provider.read(&address)
    })
    .await
    .map_err(|e| with_retries(e, retries))?;
    retries += attempts - 1;
    live = fresh.ok_or_else(|| TaskError {
      error: ReconcileError::Vanished {
        resource: address.clone(),
      },
      retries,
    })?;
  }

  Ok(Applied {
    change: ResourceChange {
      address,
      kind,
      change,
      attributes,
    },
    operation,
    live,
    retries,
  })
}

/// Attach retries already spent by a task to its terminal error.
fn with_retries(error: ReconcileError, spent: u32) -> TaskError {
  let mut task = TaskError::from(error);
  task.retries += spent;
  task
}

fn declared_order(stack: &Stack, changes: &HashMap<ResourceId, ResourceChange>) -> Vec<ResourceChange> {
  stack
    .resources
    .iter()
    .filter_map(|spec| changes.get(&spec.id).cloned())
    .collect()
}

/// Live resources of the stack that are no longer declared.
async fn obsolete(provider: &dyn Provider, stack: &Stack) -> Vec<ResourceChange> {
  let live = match provider.list(&stack.name).await {
    Ok(live) => live,
    Err(e) => {
      warn!(stack = %stack.name, error = %e, "could not list live resources, skipping obsolete check");
      return Vec::new();
    }
  };

  live
    .into_iter()
    .filter(|l| stack.get(&l.address.id).is_none())
    .map(|l| {
      warn!(resource = %l.address, "resource is no longer declared");
      ResourceChange {
        address: l.address,
        kind: l.kind,
        change: ChangeKind::Delete,
        attributes: Vec::new(),
      }
    })
    .collect()
}

fn collect_outputs(
  stack: &Stack,
  live: &HashMap<ResourceId, LiveState>,
) -> Result<BTreeMap<String, Value>, ReconcileError> {
  stack
    .produced_outputs
    .iter()
    .map(|(name, binding)| {
      live
        .get(&binding.resource)
        .and_then(|l| l.attribute(&binding.attribute))
        .map(|value| (name.clone(), value.clone()))
        .ok_or_else(|| ReconcileError::MissingOutput {
          output: name.clone(),
          resource: ResourceAddress::new(&stack.name, binding.resource.as_str()),
          attribute: binding.attribute.clone(),
        })
    })
    .collect()
}
