//! Resource specifications.
//!
//! A [`ResourceSpec`] is the immutable, declarative description of one desired
//! resource inside a stack. It names its kind, its configuration, and the
//! resources in the same stack that must be reconciled before it.

mod kind;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::placeholder::{self, Placeholder, PlaceholderError};
use crate::value::{ConfigValue, Reference, ResourceAttr};

pub use kind::{BUILTIN_TAGS, ResourceKind, UnknownKindError};

/// Identifier of a resource, unique within its owning stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ResourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ResourceId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

/// Globally unique address of a resource: its stack plus its id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceAddress {
  pub stack: String,
  pub id: ResourceId,
}

impl ResourceAddress {
  pub fn new(stack: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      stack: stack.into(),
      id: ResourceId::new(id),
    }
  }
}

impl fmt::Display for ResourceAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.stack, self.id)
  }
}

/// Declarative description of one desired resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
  pub id: ResourceId,

  #[serde(rename = "type")]
  pub kind: ResourceKind,

  #[serde(default)]
  pub config: BTreeMap<String, ConfigValue>,

  /// Resources in the same stack that must be reconciled first.
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub depends_on: BTreeSet<ResourceId>,
}

/// Every reference found in a resource's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRefs {
  pub outputs: BTreeSet<Reference>,
  pub attrs: BTreeSet<ResourceAttr>,
  pub contexts: BTreeSet<String>,
}

impl ResourceSpec {
  pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
    Self {
      id: ResourceId::new(id),
      kind,
      config: BTreeMap::new(),
      depends_on: BTreeSet::new(),
    }
  }

  /// Set a configuration attribute.
  pub fn with(mut self, attribute: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
    self.config.insert(attribute.into(), value.into());
    self
  }

  /// Add an explicit ordering dependency on another resource in the stack.
  pub fn depends_on(mut self, id: impl Into<String>) -> Self {
    self.depends_on.insert(ResourceId::new(id));
    self
  }

  /// Collect structured references and interpolated placeholders.
  ///
  /// # Errors
  ///
  /// Returns the first malformed placeholder found in a string value.
  pub fn references(&self) -> Result<ConfigRefs, PlaceholderError> {
    let mut refs = ConfigRefs::default();
    let mut error = None;

    for value in self.config.values() {
      value.visit(&mut |node| match node {
        ConfigValue::Output { output } => {
          refs.outputs.insert(output.clone());
        }
        ConfigValue::Attr { attr } => {
          refs.attrs.insert(attr.clone());
        }
        ConfigValue::Context { context } => {
          refs.contexts.insert(context.clone());
        }
        ConfigValue::String(s) => match placeholder::placeholders(s) {
          Ok(found) => {
            for p in found {
              match p {
                Placeholder::Output { stack, output } => {
                  refs.outputs.insert(Reference::new(stack, output));
                }
                Placeholder::Attr { resource, attribute } => {
                  refs.attrs.insert(ResourceAttr {
                    resource: ResourceId(resource),
                    attribute,
                  });
                }
                Placeholder::Context(name) => {
                  refs.contexts.insert(name);
                }
              }
            }
          }
          Err(e) => {
            error.get_or_insert(e);
          }
        },
        _ => {}
      });
    }

    match error {
      Some(e) => Err(e),
      None => Ok(refs),
    }
  }

  /// Resources this one must wait for: `dependsOn` plus attribute references.
  pub fn dependencies(&self) -> Result<BTreeSet<ResourceId>, PlaceholderError> {
    let mut deps = self.depends_on.clone();
    deps.extend(self.references()?.attrs.into_iter().map(|a| a.resource));
    Ok(deps)
  }
}
