//! Prune command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

fn deploy_shrunk(env: &TestEnv) {
  env.deploy("acme.json", &[]).assert().success();
  env
    .deploy("acme_v2.json", &["--report", "report.json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("- cicd/images (delete)"))
    .stderr(predicate::str::contains("run `stackflow prune`"));
}

#[test]
fn deploy_never_deletes_obsolete_resources() {
  let env = TestEnv::new();
  deploy_shrunk(&env);

  assert!(env.live_resources().contains(&"cicd/images".to_string()));
}

#[test]
fn prune_dry_run_lists_obsolete() {
  let env = TestEnv::new();
  deploy_shrunk(&env);

  env
    .cmd()
    .arg("prune")
    .arg("--report")
    .arg(env.path("report.json"))
    .arg("--state")
    .arg(env.state_path())
    .arg("--dry-run")
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"))
    .stdout(predicate::str::contains("- cicd/images"));

  assert!(env.live_resources().contains(&"cicd/images".to_string()));
}

#[test]
fn prune_deletes_obsolete() {
  let env = TestEnv::new();
  deploy_shrunk(&env);

  env
    .cmd()
    .arg("prune")
    .arg("--report")
    .arg(env.path("report.json"))
    .arg("--state")
    .arg(env.state_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Deleted: 1"));

  let live = env.live_resources();
  assert!(!live.contains(&"cicd/images".to_string()));
  assert_eq!(live.len(), 11);
}
