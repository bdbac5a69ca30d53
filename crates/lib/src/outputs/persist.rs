//! JSON snapshots of an output store.
//!
//! Snapshots exist for inspection after a run. They are never read back to
//! seed a new run: every run starts from an empty store.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::OUTPUT_SNAPSHOT_VERSION;
use crate::value::Value;

use super::store::OutputStore;

#[derive(Debug, Error)]
pub enum OutputSnapshotError {
  #[error("failed to create directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read snapshot: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write snapshot: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse snapshot: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize snapshot: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported snapshot version: {0}")]
  UnsupportedVersion(u32),
}

/// Outputs of one succeeded stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackOutputs {
  pub stack: String,
  pub outputs: BTreeMap<String, Value>,
}

/// Serialized form of an output store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSnapshot {
  pub version: u32,
  pub environment: String,
  /// Unix seconds.
  pub created_at: u64,
  /// Stacks in completion order.
  pub stacks: Vec<StackOutputs>,
}

impl OutputSnapshot {
  pub fn capture(environment: impl Into<String>, store: &OutputStore) -> Self {
    Self {
      version: OUTPUT_SNAPSHOT_VERSION,
      environment: environment.into(),
      created_at: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      stacks: store
        .entries()
        .into_iter()
        .map(|(stack, outputs)| StackOutputs { stack, outputs })
        .collect(),
    }
  }

  pub fn stack(&self, name: &str) -> Option<&StackOutputs> {
    self.stacks.iter().find(|s| s.stack == name)
  }

  /// Write to `path`, replacing any existing file atomically.
  pub fn save(&self, path: &Path) -> Result<(), OutputSnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(OutputSnapshotError::CreateDir)?;
    }

    let temp_path = temp_path(path);
    let content = serde_json::to_string_pretty(self).map_err(OutputSnapshotError::Serialize)?;
    fs::write(&temp_path, &content).map_err(OutputSnapshotError::Write)?;
    fs::rename(&temp_path, path).map_err(OutputSnapshotError::Write)?;

    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self, OutputSnapshotError> {
    let content = fs::read_to_string(path).map_err(OutputSnapshotError::Read)?;
    let snapshot: OutputSnapshot = serde_json::from_str(&content).map_err(OutputSnapshotError::Parse)?;

    if snapshot.version != OUTPUT_SNAPSHOT_VERSION {
      return Err(OutputSnapshotError::UnsupportedVersion(snapshot.version));
    }

    Ok(snapshot)
  }
}

/// Sibling temp file used for atomic replacement.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
  let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".tmp");
  path.with_file_name(name)
}
