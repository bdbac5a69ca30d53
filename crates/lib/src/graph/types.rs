//! Build-time errors for deployment graphs.

use std::fmt;

use thiserror::Error;

use crate::placeholder::PlaceholderError;
use crate::resource::ResourceId;
use crate::value::Reference;

/// A dependency cycle, either between stacks or between resources of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CycleError {
  /// The stack whose resources form the cycle, or `None` for a stack-level cycle.
  pub stack: Option<String>,
  /// Cycle members in declaration order.
  pub members: Vec<String>,
}

impl fmt::Display for CycleError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.stack {
      None => write!(f, "dependency cycle between stacks: {}", self.members.join(" -> ")),
      Some(stack) => write!(
        f,
        "dependency cycle between resources of stack '{}': {}",
        stack,
        self.members.join(" -> ")
      ),
    }
  }
}

/// Errors detected while building a deployment graph.
///
/// All of these are fatal: the deployment never starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
  #[error("stack '{0}' is declared more than once")]
  DuplicateStack(String),

  #[error("resource '{resource}' is declared more than once in stack '{stack}'")]
  DuplicateResource { stack: String, resource: ResourceId },

  /// A required input names a stack or output nobody declares.
  #[error("stack '{stack}' references unknown output '{reference}'")]
  UnknownReference { stack: String, reference: Reference },

  /// Config references an output that is missing from `requiredInputs`.
  #[error("resource '{resource}' in stack '{stack}' uses '{reference}' which is not a declared input")]
  UndeclaredInput {
    stack: String,
    resource: ResourceId,
    reference: Reference,
  },

  #[error("resource '{resource}' in stack '{stack}' depends on unknown resource '{target}'")]
  UnknownResource {
    stack: String,
    resource: ResourceId,
    target: ResourceId,
  },

  #[error("resource '{resource}' in stack '{stack}' reads unknown attribute '{attribute}' of '{target}'")]
  UnknownAttribute {
    stack: String,
    resource: ResourceId,
    target: ResourceId,
    attribute: String,
  },

  #[error("resource '{resource}' in stack '{stack}' sets unsupported attribute '{attribute}' for type {kind}")]
  UnsupportedAttribute {
    stack: String,
    resource: ResourceId,
    kind: String,
    attribute: String,
  },

  #[error("output '{output}' of stack '{stack}' is invalid: {reason}")]
  InvalidOutput {
    stack: String,
    output: String,
    reason: String,
  },

  #[error("resource '{resource}' in stack '{stack}' uses unknown context value '{name}'")]
  UnknownContext {
    stack: String,
    resource: ResourceId,
    name: String,
  },

  #[error("resource '{resource}' in stack '{stack}': {source}")]
  Placeholder {
    stack: String,
    resource: ResourceId,
    #[source]
    source: PlaceholderError,
  },

  #[error(transparent)]
  Cycle(#[from] CycleError),
}
