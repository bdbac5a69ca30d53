//! The provider seam.
//!
//! A [`Provider`] owns the live state of resources. The core never trusts a
//! cached view: it reads before every apply and treats whatever comes back
//! as the truth.

mod local;
mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::{ResourceAddress, ResourceKind};
use crate::value::{Attributes, Value};

pub use local::{LocalProvider, LocalStateError};
pub use memory::{Call, MemoryProvider};

/// The provider's current view of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
  pub address: ResourceAddress,
  pub kind: ResourceKind,
  /// Configuration the resource was last created or updated with.
  pub config: Attributes,
  /// Attributes computed by the provider.
  #[serde(default)]
  pub attributes: Attributes,
}

impl LiveState {
  /// Read an attribute, preferring computed attributes over configuration.
  pub fn attribute(&self, name: &str) -> Option<&Value> {
    self.attributes.get(name).or_else(|| self.config.get(name))
  }
}

/// Provider failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
  /// Throttling, timeouts, eventual-consistency races. Worth retrying.
  Transient,
  /// Invalid configuration, conflicts. Retrying cannot help.
  Permanent,
  PermissionDenied,
}

impl fmt::Display for ProviderErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ProviderErrorKind::Transient => "transient",
      ProviderErrorKind::Permanent => "permanent",
      ProviderErrorKind::PermissionDenied => "permission denied",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} provider error: {message}")]
pub struct ProviderError {
  pub kind: ProviderErrorKind,
  pub message: String,
}

impl ProviderError {
  pub fn transient(message: impl Into<String>) -> Self {
    Self {
      kind: ProviderErrorKind::Transient,
      message: message.into(),
    }
  }

  pub fn permanent(message: impl Into<String>) -> Self {
    Self {
      kind: ProviderErrorKind::Permanent,
      message: message.into(),
    }
  }

  pub fn permission_denied(message: impl Into<String>) -> Self {
    Self {
      kind: ProviderErrorKind::PermissionDenied,
      message: message.into(),
    }
  }

  pub fn is_transient(&self) -> bool {
    self.kind == ProviderErrorKind::Transient
  }
}

/// Provider operations, as seen in call logs, errors and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
  Read,
  Create,
  Update,
  Delete,
  IsStable,
  List,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Operation::Read => "read",
      Operation::Create => "create",
      Operation::Update => "update",
      Operation::Delete => "delete",
      Operation::IsStable => "is_stable",
      Operation::List => "list",
    };
    f.write_str(s)
  }
}

/// Resource provisioning API of the target environment.
#[async_trait]
pub trait Provider: Send + Sync {
  /// Fetch the live state, or `None` if the resource does not exist.
  async fn read(&self, address: &ResourceAddress) -> Result<Option<LiveState>, ProviderError>;

  async fn create(
    &self,
    address: &ResourceAddress,
    kind: &ResourceKind,
    config: &Attributes,
  ) -> Result<LiveState, ProviderError>;

  async fn update(&self, address: &ResourceAddress, config: &Attributes) -> Result<LiveState, ProviderError>;

  /// Delete a resource. Deleting an absent resource succeeds.
  async fn delete(&self, address: &ResourceAddress) -> Result<(), ProviderError>;

  /// Readiness signal for kinds that stabilize asynchronously.
  async fn is_stable(&self, state: &LiveState) -> Result<bool, ProviderError>;

  /// Every live resource the provider holds for `stack`.
  ///
  /// Used to surface resources no longer declared. Providers that cannot
  /// enumerate return nothing.
  async fn list(&self, _stack: &str) -> Result<Vec<LiveState>, ProviderError> {
    Ok(Vec::new())
  }
}
