use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::resource::{ResourceAddress, ResourceKind};
use crate::value::{Attributes, Value};

use super::{LiveState, Operation, Provider, ProviderError};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub operation: Operation,
  /// Resource address, or the stack name for `list`.
  pub target: String,
}

#[derive(Debug, Default)]
struct MemoryState {
  resources: BTreeMap<ResourceAddress, LiveState>,
  presets: HashMap<ResourceAddress, Attributes>,
  faults: HashMap<(ResourceAddress, Operation), VecDeque<ProviderError>>,
  /// Remaining `is_stable` polls that report not ready.
  unstable: HashMap<ResourceAddress, u32>,
  /// How long every `create` takes before it touches the state.
  create_delay: Duration,
  creating: usize,
  peak_creating: usize,
  calls: Vec<Call>,
}

/// In-process provider.
///
/// Computed attributes are derived from the address, so the same
/// definitions always produce the same values. Faults, presets and
/// stabilization delays can be scripted per resource.
#[derive(Debug, Default)]
pub struct MemoryProvider {
  state: Mutex<MemoryState>,
}

impl MemoryProvider {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start from existing live resources.
  pub fn with_resources(resources: impl IntoIterator<Item = LiveState>) -> Self {
    let provider = Self::new();
    {
      let mut state = provider.lock();
      for live in resources {
        state.resources.insert(live.address.clone(), live);
      }
    }
    provider
  }

  fn lock(&self) -> MutexGuard<'_, MemoryState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Values to report for computed attributes when `address` is created.
  pub fn preset_attributes(&self, address: ResourceAddress, attributes: Attributes) {
    self.lock().presets.insert(address, attributes);
  }

  /// Fail the next `operation` on `address` with `error`. Queued faults
  /// are consumed in order.
  pub fn fail_next(&self, address: ResourceAddress, operation: Operation, error: ProviderError) {
    self
      .lock()
      .faults
      .entry((address, operation))
      .or_default()
      .push_back(error);
  }

  /// Report `address` as not ready for the next `polls` stability checks.
  pub fn stabilize_after(&self, address: ResourceAddress, polls: u32) {
    self.lock().unstable.insert(address, polls);
  }

  /// Make every `create` take `delay` to complete.
  pub fn delay_creates(&self, delay: Duration) {
    self.lock().create_delay = delay;
  }

  /// Largest number of `create` calls that were in flight at once.
  pub fn peak_concurrent_creates(&self) -> usize {
    self.lock().peak_creating
  }

  /// Insert or replace a live resource directly, bypassing the call log.
  pub fn insert_live(&self, live: LiveState) {
    self.lock().resources.insert(live.address.clone(), live);
  }

  /// Remove a live resource directly, bypassing the call log.
  pub fn remove_live(&self, address: &ResourceAddress) -> Option<LiveState> {
    self.lock().resources.remove(address)
  }

  pub fn get(&self, address: &ResourceAddress) -> Option<LiveState> {
    self.lock().resources.get(address).cloned()
  }

  pub fn resources(&self) -> Vec<LiveState> {
    self.lock().resources.values().cloned().collect()
  }

  pub fn calls(&self) -> Vec<Call> {
    self.lock().calls.clone()
  }

  pub fn count(&self, operation: Operation) -> usize {
    self.lock().calls.iter().filter(|c| c.operation == operation).count()
  }

  pub fn count_for(&self, address: &ResourceAddress, operation: Operation) -> usize {
    let target = address.to_string();
    self
      .lock()
      .calls
      .iter()
      .filter(|c| c.operation == operation && c.target == target)
      .count()
  }

  pub fn clear_calls(&self) {
    self.lock().calls.clear();
  }

  /// Log the call and pop any scripted fault for it.
  fn enter(state: &mut MemoryState, address: &ResourceAddress, operation: Operation) -> Result<(), ProviderError> {
    trace!(resource = %address, operation = %operation, "memory provider call");
    state.calls.push(Call {
      operation,
      target: address.to_string(),
    });

    let key = (address.clone(), operation);
    match state.faults.get_mut(&key).and_then(VecDeque::pop_front) {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  fn computed_attributes(state: &MemoryState, address: &ResourceAddress, kind: &ResourceKind) -> Attributes {
    let mut attributes: Attributes = kind
      .produced_attributes()
      .iter()
      .map(|name| (name.to_string(), Value::from(computed_value(address, name))))
      .collect();

    if let Some(presets) = state.presets.get(address) {
      attributes.extend(presets.clone());
    }
    attributes
  }
}

/// Deterministic value for a computed attribute.
fn computed_value(address: &ResourceAddress, attribute: &str) -> String {
  let digest = Sha256::digest(format!("{address}#{attribute}").as_bytes());
  format!("{}-{}", attribute, &hex::encode(digest)[..12])
}

#[async_trait]
impl Provider for MemoryProvider {
  async fn read(&self, address: &ResourceAddress) -> Result<Option<LiveState>, ProviderError> {
    let mut state = self.lock();
    Self::enter(&mut state, address, Operation::Read)?;
    Ok(state.resources.get(address).cloned())
  }

  async fn create(
    &self,
    address: &ResourceAddress,
    kind: &ResourceKind,
    config: &Attributes,
  ) -> Result<LiveState, ProviderError> {
    let delay = {
      let mut state = self.lock();
      state.creating += 1;
      state.peak_creating = state.peak_creating.max(state.creating);
      state.create_delay
    };
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }

    let mut state = self.lock();
    state.creating -= 1;
    Self::enter(&mut state, address, Operation::Create)?;

    if state.resources.contains_key(address) {
      return Err(ProviderError::permanent(format!("{address} already exists")));
    }

    let live = LiveState {
      address: address.clone(),
      kind: kind.clone(),
      config: config.clone(),
      attributes: Self::computed_attributes(&state, address, kind),
    };
    state.resources.insert(address.clone(), live.clone());
    Ok(live)
  }

  async fn update(&self, address: &ResourceAddress, config: &Attributes) -> Result<LiveState, ProviderError> {
    let mut state = self.lock();
    Self::enter(&mut state, address, Operation::Update)?;

    let live = state
      .resources
      .get_mut(address)
      .ok_or_else(|| ProviderError::permanent(format!("{address} does not exist")))?;
    live.config = config.clone();
    Ok(live.clone())
  }

  async fn delete(&self, address: &ResourceAddress) -> Result<(), ProviderError> {
    let mut state = self.lock();
    Self::enter(&mut state, address, Operation::Delete)?;
    state.resources.remove(address);
    Ok(())
  }

  async fn is_stable(&self, live: &LiveState) -> Result<bool, ProviderError> {
    let mut state = self.lock();
    Self::enter(&mut state, &live.address, Operation::IsStable)?;

    match state.unstable.get_mut(&live.address) {
      Some(remaining) if *remaining > 0 => {
        *remaining -= 1;
        Ok(false)
      }
      _ => Ok(true),
    }
  }

  async fn list(&self, stack: &str) -> Result<Vec<LiveState>, ProviderError> {
    let mut state = self.lock();
    state.calls.push(Call {
      operation: Operation::List,
      target: stack.to_string(),
    });

    Ok(
      state
        .resources
        .values()
        .filter(|live| live.address.stack == stack)
        .cloned()
        .collect(),
    )
  }
}
