//! Deployment definitions.
//!
//! A [`Deployment`] is an immutable value: the full set of stacks plus the
//! named context values they may reference. It is passed by reference to the
//! orchestrator, so independent deployments can run side by side.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DEFAULT_ENVIRONMENT;
use crate::stack::Stack;
use crate::value::Value;

/// Named context values such as the domain name or organization identifiers.
pub type Context = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum DeploymentError {
  #[error("failed to read deployment file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse deployment: {0}")]
  Parse(#[from] serde_json::Error),
}

/// A set of stacks deployed together against one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
  #[serde(default = "default_environment")]
  pub environment: String,

  #[serde(default)]
  pub context: Context,

  pub stacks: Vec<Stack>,
}

fn default_environment() -> String {
  DEFAULT_ENVIRONMENT.to_string()
}

impl Deployment {
  pub fn new(environment: impl Into<String>) -> Self {
    Self {
      environment: environment.into(),
      context: Context::new(),
      stacks: Vec::new(),
    }
  }

  pub fn with_context(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.context.insert(name.into(), value.into());
    self
  }

  pub fn stack(mut self, stack: Stack) -> Self {
    self.stacks.push(stack);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Stack> {
    self.stacks.iter().find(|s| s.name == name)
  }

  pub fn from_json(json: &str) -> Result<Self, DeploymentError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn from_path(path: &Path) -> Result<Self, DeploymentError> {
    let content = fs::read_to_string(path).map_err(|source| DeploymentError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&content)
  }
}
