//! Plan command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn plan_on_empty_state_creates_everything() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("plan")
    .arg(fixture_path("acme.json"))
    .arg("--state")
    .arg(env.state_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("+ app/cdn (create)"))
    .stdout(predicate::str::contains("To create: 12"))
    .stdout(predicate::str::contains("To update: 0"));

  assert!(!env.state_path().exists());
}

#[test]
fn plan_json_marks_unknown_outputs() {
  let env = TestEnv::new();

  let output = env
    .cmd()
    .arg("plan")
    .arg(fixture_path("acme.json"))
    .arg("--state")
    .arg(env.state_path())
    .args(["-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(plan["environment"], "prod");
  assert_eq!(plan["stacks"][2]["outputs"]["distributionId"], "(known after apply)");
}

#[test]
fn plan_after_deploy_has_no_changes() {
  let env = TestEnv::new();

  env.deploy("acme.json", &[]).assert().success();

  env
    .cmd()
    .arg("plan")
    .arg(fixture_path("acme.json"))
    .arg("--state")
    .arg(env.state_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("No changes"));
}

#[test]
fn plan_shows_updates_and_obsolete_resources() {
  let env = TestEnv::new();

  env.deploy("acme.json", &[]).assert().success();

  env
    .cmd()
    .arg("plan")
    .arg(fixture_path("acme_v2.json"))
    .arg("--state")
    .arg(env.state_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("~ app/api (update: desiredCount)"))
    .stdout(predicate::str::contains("- cicd/images (delete)"))
    .stdout(predicate::str::contains("To update: 1"))
    .stdout(predicate::str::contains("Obsolete: 1"));
}
