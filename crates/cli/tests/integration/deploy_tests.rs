//! Deploy and outputs command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn deploy_creates_every_stack() {
  let env = TestEnv::new();

  env
    .deploy("acme.json", &[])
    .assert()
    .success()
    .stdout(predicate::str::contains("+ dns/zone (create)"))
    .stdout(predicate::str::contains("+ monitoring/dashboard (create)"))
    .stdout(predicate::str::contains("Deployment 'prod' complete"))
    .stdout(predicate::str::contains("Succeeded: 4"));

  assert_eq!(env.live_resources().len(), 12);
}

#[test]
fn deploy_is_idempotent() {
  let env = TestEnv::new();

  env.deploy("acme.json", &[]).assert().success();

  env
    .deploy("acme.json", &["--report", "report.json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("(create)").not());

  let report = env.read_json("report.json");
  for stack in report["stacks"].as_array().unwrap() {
    assert_eq!(stack["status"], "succeeded");
    assert!(stack["operations"].as_array().unwrap().is_empty(), "{}", stack["stack"]);
  }
}

#[test]
fn deploy_json_threads_outputs() {
  let env = TestEnv::new();

  let output = env.deploy("acme.json", &["-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(
    report["order"],
    serde_json::json!(["dns", "cicd", "app", "monitoring"])
  );

  let app = &report["stacks"][2];
  assert_eq!(app["stack"], "app");
  let distribution_id = app["outputs"]["distributionId"].as_str().unwrap();
  assert!(distribution_id.starts_with("distributionId-"));

  let state = env.read_json("state.json");
  let alarm = state["resources"]
    .as_array()
    .unwrap()
    .iter()
    .find(|r| r["address"]["id"] == "errors")
    .unwrap();
  assert_eq!(alarm["config"]["dimensions"]["DistributionId"], distribution_id);
}

#[test]
fn deploy_writes_outputs_snapshot() {
  let env = TestEnv::new();

  env.deploy("acme.json", &["--outputs", "out/outputs.json"]).assert().success();

  env
    .cmd()
    .arg("outputs")
    .arg(env.path("out/outputs.json"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Outputs of 'prod'"))
    .stdout(predicate::str::contains("hostedZoneId: hostedZoneId-"))
    .stdout(predicate::str::contains("deployRoleArn"));

  env
    .cmd()
    .arg("outputs")
    .arg(env.path("out/outputs.json"))
    .args(["--stack", "app", "--output", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("distributionId"))
    .stdout(predicate::str::contains("hostedZoneId").not());
}

#[test]
fn outputs_unknown_stack_fails() {
  let env = TestEnv::new();

  env.deploy("acme.json", &["--outputs", "outputs.json"]).assert().success();

  env
    .cmd()
    .arg("outputs")
    .arg(env.path("outputs.json"))
    .args(["--stack", "billing"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no outputs recorded for stack 'billing'"));
}

#[test]
fn failed_stack_halts_pipeline() {
  let env = TestEnv::new();

  env
    .deploy("missing_output.json", &["--report", "report.json", "--outputs", "outputs.json"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("alerts (skipped: depends on failed stack 'web')"))
    .stdout(predicate::str::contains("repo (skipped: pipeline halted after 'web' failed)"))
    .stderr(predicate::str::contains("deployment failed: 0 succeeded, 1 failed, 2 skipped"));

  let report = env.read_json("report.json");
  assert_eq!(report["first_failure"]["stack"], "web");
  assert_eq!(report["stacks"][0]["status"], "failed");
  assert_eq!(report["stacks"][1]["status"], "pending");

  let outputs = env.read_json("outputs.json");
  assert!(outputs["stacks"].as_array().unwrap().is_empty());
}

#[test]
fn skip_dependents_runs_unrelated_stacks() {
  let env = TestEnv::new();

  env
    .deploy("missing_output.json", &["--skip-dependents", "--report", "report.json"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("1 succeeded, 1 failed, 1 skipped"));

  let report = env.read_json("report.json");
  assert_eq!(report["stacks"][2]["stack"], "repo");
  assert_eq!(report["stacks"][2]["status"], "succeeded");
  assert!(env.live_resources().contains(&"repo/images".to_string()));
}
