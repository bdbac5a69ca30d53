use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::LOCAL_STATE_VERSION;
use crate::outputs::temp_path;
use crate::resource::{ResourceAddress, ResourceKind};
use crate::value::Attributes;

use super::{LiveState, MemoryProvider, Provider, ProviderError};

#[derive(Debug, Error)]
pub enum LocalStateError {
  #[error("failed to read state file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write state file {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse state file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported state file version: {0}")]
  UnsupportedVersion(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalState {
  version: u32,
  resources: Vec<LiveState>,
}

/// A [`MemoryProvider`] whose resources persist to a JSON file.
///
/// Every successful mutation rewrites the file atomically, so a later run
/// against the same file sees converged live state.
#[derive(Debug)]
pub struct LocalProvider {
  path: PathBuf,
  inner: MemoryProvider,
}

impl LocalProvider {
  /// Open the state file at `path`. A missing file is an empty environment.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, LocalStateError> {
    let path = path.into();

    let resources = match fs::read_to_string(&path) {
      Ok(content) => {
        let state: LocalState = serde_json::from_str(&content).map_err(|source| LocalStateError::Parse {
          path: path.clone(),
          source,
        })?;
        if state.version != LOCAL_STATE_VERSION {
          return Err(LocalStateError::UnsupportedVersion(state.version));
        }
        state.resources
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
      Err(source) => return Err(LocalStateError::Read { path, source }),
    };

    debug!(path = %path.display(), resources = resources.len(), "local state loaded");

    Ok(Self {
      path,
      inner: MemoryProvider::with_resources(resources),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn resources(&self) -> Vec<LiveState> {
    self.inner.resources()
  }

  fn persist(&self) -> Result<(), LocalStateError> {
    let state = LocalState {
      version: LOCAL_STATE_VERSION,
      resources: self.inner.resources(),
    };
    let write_err = |source| LocalStateError::Write {
      path: self.path.clone(),
      source,
    };

    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(write_err)?;
    }

    let temp = temp_path(&self.path);
    let content = serde_json::to_string_pretty(&state).map_err(LocalStateError::Serialize)?;
    fs::write(&temp, content).map_err(write_err)?;
    fs::rename(&temp, &self.path).map_err(write_err)?;
    Ok(())
  }

  fn persisted<T>(&self, result: Result<T, ProviderError>) -> Result<T, ProviderError> {
    let value = result?;
    self
      .persist()
      .map_err(|e| ProviderError::permanent(format!("resource applied but state not saved: {e}")))?;
    Ok(value)
  }
}

#[async_trait]
impl Provider for LocalProvider {
  async fn read(&self, address: &ResourceAddress) -> Result<Option<LiveState>, ProviderError> {
    self.inner.read(address).await
  }

  async fn create(
    &self,
    address: &ResourceAddress,
    kind: &ResourceKind,
    config: &Attributes,
  ) -> Result<LiveState, ProviderError> {
    let result = self.inner.create(address, kind, config).await;
    self.persisted(result)
  }

  async fn update(&self, address: &ResourceAddress, config: &Attributes) -> Result<LiveState, ProviderError> {
    let result = self.inner.update(address, config).await;
    self.persisted(result)
  }

  async fn delete(&self, address: &ResourceAddress) -> Result<(), ProviderError> {
    let result = self.inner.delete(address).await;
    self.persisted(result)
  }

  async fn is_stable(&self, state: &LiveState) -> Result<bool, ProviderError> {
    self.inner.is_stable(state).await
  }

  async fn list(&self, stack: &str) -> Result<Vec<LiveState>, ProviderError> {
    self.inner.list(stack).await
  }
}
