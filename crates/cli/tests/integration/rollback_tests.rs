//! Rollback command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn rollback_undoes_failed_stack() {
  let env = TestEnv::new();

  env
    .deploy("missing_output.json", &["--report", "report.json"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("run `stackflow rollback`"));

  let live = env.live_resources();
  assert!(live.contains(&"web/site".to_string()));
  assert!(live.contains(&"web/cdn".to_string()));

  let report = env.read_json("report.json");
  let steps = report["rollback"][0]["steps"].as_array().unwrap();
  assert_eq!(steps[0]["address"]["id"], "cdn");
  assert_eq!(steps[0]["action"], "delete");
  assert_eq!(steps[1]["address"]["id"], "site");

  env
    .cmd()
    .arg("rollback")
    .arg("--report")
    .arg(env.path("report.json"))
    .arg("--state")
    .arg(env.state_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("delete → web/cdn"))
    .stdout(predicate::str::contains("delete → web/site"));

  assert!(env.live_resources().is_empty());
}

#[test]
fn rollback_filters_by_stack() {
  let env = TestEnv::new();

  env
    .deploy("missing_output.json", &["--report", "report.json"])
    .assert()
    .failure();

  env
    .cmd()
    .arg("rollback")
    .arg("--report")
    .arg(env.path("report.json"))
    .arg("--state")
    .arg(env.state_path())
    .args(["--stack", "repo"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to roll back"));

  assert_eq!(env.live_resources().len(), 2);
}

#[test]
fn rollback_json_reports_outcomes() {
  let env = TestEnv::new();

  env
    .deploy("missing_output.json", &["--report", "report.json"])
    .assert()
    .failure();

  let output = env
    .cmd()
    .arg("rollback")
    .arg("--report")
    .arg(env.path("report.json"))
    .arg("--state")
    .arg(env.state_path())
    .args(["--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(results[0]["stack"], "web");
  assert_eq!(results[0]["steps"][0]["outcome"], "done");
}
