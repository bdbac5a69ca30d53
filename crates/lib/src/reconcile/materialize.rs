//! Turning declared configuration into literal desired state.

use std::collections::HashMap;

use crate::consts::KNOWN_AFTER_APPLY;
use crate::deployment::Context;
use crate::outputs::ResolvedInputs;
use crate::placeholder::{self, PlaceholderError, Resolver};
use crate::provider::LiveState;
use crate::resource::{ResourceId, ResourceSpec};
use crate::value::{Attributes, ConfigValue, Reference, Value};

/// Resolves references against inputs, context, and already reconciled
/// resources of the same stack.
///
/// In preview mode anything not yet knowable becomes `(known after apply)`
/// instead of an error.
pub(crate) struct Materializer<'a> {
  pub inputs: &'a ResolvedInputs,
  pub context: &'a Context,
  pub live: &'a HashMap<ResourceId, LiveState>,
  pub preview: bool,
}

impl Materializer<'_> {
  pub fn config(&self, spec: &ResourceSpec) -> Result<Attributes, PlaceholderError> {
    spec
      .config
      .iter()
      .map(|(name, value)| Ok((name.clone(), self.value(value)?)))
      .collect()
  }

  fn value(&self, value: &ConfigValue) -> Result<Value, PlaceholderError> {
    match value {
      ConfigValue::Output { output } => self.output(output),
      ConfigValue::Attr { attr } => self.attr(&attr.resource, &attr.attribute),
      ConfigValue::Context { context } => self.context(context),
      ConfigValue::Boolean(b) => Ok(Value::Boolean(*b)),
      ConfigValue::Number(n) => Ok(Value::Number(*n)),
      ConfigValue::String(s) => Ok(Value::String(placeholder::substitute(s, self)?)),
      ConfigValue::Array(items) => Ok(Value::Array(
        items.iter().map(|item| self.value(item)).collect::<Result<_, _>>()?,
      )),
      ConfigValue::Table(map) => Ok(Value::Table(
        map
          .iter()
          .map(|(k, v)| Ok((k.clone(), self.value(v)?)))
          .collect::<Result<_, PlaceholderError>>()?,
      )),
    }
  }

  fn output(&self, reference: &Reference) -> Result<Value, PlaceholderError> {
    match self.inputs.get(reference) {
      Some(value) => Ok(value.clone()),
      None if self.preview => Ok(Value::from(KNOWN_AFTER_APPLY)),
      None => Err(PlaceholderError::UnresolvedOutput {
        stack: reference.stack.clone(),
        output: reference.output.clone(),
      }),
    }
  }

  fn attr(&self, resource: &ResourceId, attribute: &str) -> Result<Value, PlaceholderError> {
    match self.live.get(resource).and_then(|live| live.attribute(attribute)) {
      Some(value) => Ok(value.clone()),
      None if self.preview => Ok(Value::from(KNOWN_AFTER_APPLY)),
      None => Err(PlaceholderError::UnresolvedAttr {
        resource: resource.to_string(),
        attribute: attribute.to_string(),
      }),
    }
  }

  fn context(&self, name: &str) -> Result<Value, PlaceholderError> {
    self
      .context
      .get(name)
      .cloned()
      .ok_or_else(|| PlaceholderError::UnresolvedContext(name.to_string()))
  }
}

impl Resolver for Materializer<'_> {
  fn resolve_output(&self, stack: &str, output: &str) -> Result<String, PlaceholderError> {
    self
      .output(&Reference::new(stack, output))
      .map(|v| v.to_interpolated())
  }

  fn resolve_attr(&self, resource: &str, attribute: &str) -> Result<String, PlaceholderError> {
    self
      .attr(&ResourceId::new(resource), attribute)
      .map(|v| v.to_interpolated())
  }

  fn resolve_context(&self, name: &str) -> Result<String, PlaceholderError> {
    self.context(name).map(|v| v.to_interpolated())
  }
}
