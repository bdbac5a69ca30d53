//! Validate command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn validate_prints_stack_order() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("validate")
    .arg(fixture_path("acme.json"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Deployment 'prod' is valid (4 stacks)"))
    .stdout(predicate::str::contains("dns → cicd → app → monitoring"))
    .stdout(predicate::str::contains("[site, api] [cdn] [alias] (after dns)"))
    .stdout(predicate::str::contains("(after app)"));
}

#[test]
fn validate_rejects_stack_cycle() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("validate")
    .arg(fixture_path("cycle.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle between stacks: dns -> app"));
}

#[test]
fn validate_rejects_unknown_output() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("validate")
    .arg(fixture_path("unknown_reference.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("stack 'app' references unknown output 'dns.zoneArn'"));
}

#[test]
fn deploy_with_invalid_definition_touches_nothing() {
  let env = TestEnv::new();

  env
    .deploy("unknown_reference.json", &[])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid deployment"));

  assert!(!env.state_path().exists());
}

#[test]
fn validate_rejects_unknown_output_without_required_inputs() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("validate")
    .arg(fixture_path("config_only_unknown_output.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("stack 'app' references unknown output 'dns.bogus'"))
    .stderr(predicate::str::contains("not a declared input").not());
}
