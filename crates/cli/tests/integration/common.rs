//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the state file,
/// reports and output snapshots.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.temp.path().join(relative_path)
  }

  pub fn state_path(&self) -> PathBuf {
    self.path("state.json")
  }

  /// A `stackflow` command running inside the temp directory.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("stackflow");
    cmd.current_dir(self.temp.path()).env_remove("RUST_LOG");
    cmd
  }

  /// `stackflow deploy <fixture> --state <state>` plus extra args.
  pub fn deploy(&self, fixture: &str, args: &[&str]) -> Command {
    let mut cmd = self.cmd();
    cmd
      .arg("deploy")
      .arg(fixture_path(fixture))
      .arg("--state")
      .arg(self.state_path())
      .args(args);
    cmd
  }

  pub fn read_json(&self, relative_path: &str) -> Value {
    let content = std::fs::read_to_string(self.path(relative_path)).unwrap();
    serde_json::from_str(&content).unwrap()
  }

  /// `stack/id` of every resource in the state file.
  pub fn live_resources(&self) -> Vec<String> {
    let state = self.read_json("state.json");
    state["resources"]
      .as_array()
      .unwrap()
      .iter()
      .map(|r| {
        format!(
          "{}/{}",
          r["address"]["stack"].as_str().unwrap(),
          r["address"]["id"].as_str().unwrap()
        )
      })
      .collect()
  }
}
