use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::value::{Reference, Value};

/// Looking up an input before its producer has succeeded in this run.
///
/// This is an ordering defect, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnresolvedReferenceError {
  #[error("'{0}' is unresolved: its stack has not succeeded in this run")]
  StackNotSucceeded(Reference),

  #[error("'{0}' is unresolved: its stack recorded no such output")]
  MissingOutput(Reference),
}

impl UnresolvedReferenceError {
  pub fn reference(&self) -> &Reference {
    match self {
      UnresolvedReferenceError::StackNotSucceeded(r) | UnresolvedReferenceError::MissingOutput(r) => r,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputStoreError {
  #[error("outputs of stack '{0}' are already recorded")]
  AlreadyRecorded(String),
}

/// Inputs resolved for one stack, keyed by reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedInputs(BTreeMap<Reference, Value>);

impl ResolvedInputs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, reference: &Reference) -> Option<&Value> {
    self.0.get(reference)
  }

  pub fn insert(&mut self, reference: Reference, value: Value) {
    self.0.insert(reference, value);
  }

  pub fn contains(&self, reference: &Reference) -> bool {
    self.0.contains_key(reference)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Reference, &Value)> {
    self.0.iter()
  }
}

impl FromIterator<(Reference, Value)> for ResolvedInputs {
  fn from_iter<I: IntoIterator<Item = (Reference, Value)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

#[derive(Debug, Default)]
struct StoreState {
  values: BTreeMap<Reference, Value>,
  /// Stacks whose outputs were recorded, in completion order.
  recorded: Vec<String>,
}

/// Append-only record of each succeeded stack's outputs for one run.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct OutputStore {
  state: Arc<RwLock<StoreState>>,
}

impl OutputStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record all outputs of a succeeded stack at once.
  ///
  /// A stack is recorded at most once per run, even with no outputs, and
  /// existing entries are never touched.
  pub fn record(&self, stack: &str, outputs: BTreeMap<String, Value>) -> Result<(), OutputStoreError> {
    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

    if state.recorded.iter().any(|s| s == stack) {
      return Err(OutputStoreError::AlreadyRecorded(stack.to_string()));
    }

    let count = outputs.len();
    for (name, value) in outputs {
      state.values.insert(Reference::new(stack, name), value);
    }
    state.recorded.push(stack.to_string());

    debug!(stack = %stack, outputs = count, "outputs recorded");
    Ok(())
  }

  /// Resolve a stack's required inputs.
  ///
  /// # Errors
  ///
  /// Fails on the first reference whose producer has not succeeded, or whose
  /// producer did not record the named output.
  pub fn resolve(&self, references: &BTreeSet<Reference>) -> Result<ResolvedInputs, UnresolvedReferenceError> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    let mut resolved = ResolvedInputs::new();

    for reference in references {
      if !state.recorded.iter().any(|s| *s == reference.stack) {
        return Err(UnresolvedReferenceError::StackNotSucceeded(reference.clone()));
      }

      let value = state
        .values
        .get(reference)
        .ok_or_else(|| UnresolvedReferenceError::MissingOutput(reference.clone()))?;
      resolved.insert(reference.clone(), value.clone());
    }

    Ok(resolved)
  }

  pub fn get(&self, reference: &Reference) -> Option<Value> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    state.values.get(reference).cloned()
  }

  pub fn is_recorded(&self, stack: &str) -> bool {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    state.recorded.iter().any(|s| s == stack)
  }

  /// Outputs recorded for one stack, if it succeeded.
  pub fn stack_outputs(&self, stack: &str) -> Option<BTreeMap<String, Value>> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    if !state.recorded.iter().any(|s| s == stack) {
      return None;
    }

    Some(
      state
        .values
        .iter()
        .filter(|(reference, _)| reference.stack == stack)
        .map(|(reference, value)| (reference.output.clone(), value.clone()))
        .collect(),
    )
  }

  /// Every recorded stack with its outputs, in completion order.
  pub fn entries(&self) -> Vec<(String, BTreeMap<String, Value>)> {
    let recorded = {
      let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
      state.recorded.clone()
    };

    recorded
      .into_iter()
      .filter_map(|stack| self.stack_outputs(&stack).map(|outputs| (stack, outputs)))
      .collect()
  }

  pub fn len(&self) -> usize {
    self.state.read().unwrap_or_else(PoisonError::into_inner).values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
