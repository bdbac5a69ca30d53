//! Successful deployments of the acme stacks.

use stackflow_lib::outputs::OutputSnapshot;
use stackflow_lib::provider::{Operation, ProviderError};
use stackflow_lib::reconcile::ChangeKind;
use stackflow_lib::stack::StackStatus;
use stackflow_lib::value::Value;
use tempfile::TempDir;

use super::common::{acme, acme_provider, addr, orchestrator};

#[tokio::test]
async fn stacks_deploy_in_reference_order() {
  let provider = acme_provider();
  let report = orchestrator(&provider).deploy(&acme()).await.unwrap();

  assert!(report.is_success());
  assert_eq!(report.order, vec!["dns", "cicd", "app", "monitoring"]);
  let deployed: Vec<_> = report.stacks.iter().map(|s| s.stack.as_str()).collect();
  assert_eq!(deployed, report.order);
}

#[tokio::test]
async fn outputs_thread_between_stacks() {
  let provider = acme_provider();
  let report = orchestrator(&provider).deploy(&acme()).await.unwrap();

  let dns = report.stack("dns").unwrap();
  assert_eq!(dns.outputs["hostedZoneId"], Value::from("Z123"));
  assert_eq!(dns.outputs["certificateArn"], Value::from("arn:cert:1"));
  assert_eq!(report.stack("app").unwrap().outputs["distributionId"], Value::from("E456"));

  let alarm = provider.get(&addr("monitoring", "errors")).unwrap();
  assert_eq!(
    alarm.config["dimensions"],
    Value::Table([("DistributionId".to_string(), Value::from("E456"))].into())
  );

  let api = provider.get(&addr("app", "api")).unwrap();
  assert_eq!(api.config["certificateArn"], Value::from("arn:cert:1"));
  assert_eq!(api.config["domainName"], Value::from("api.acme.example"));

  let canary = provider.get(&addr("monitoring", "health")).unwrap();
  assert_eq!(canary.config["script"], Value::from("https://acme.example/api/health"));
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
  let provider = acme_provider();
  provider.fail_next(addr("app", "api"), Operation::Create, ProviderError::transient("throttled"));

  let report = orchestrator(&provider).deploy(&acme()).await.unwrap();

  let app = report.stack("app").unwrap();
  assert_eq!(app.status, StackStatus::Succeeded);
  assert_eq!(app.retries, 1);
  assert_eq!(report.stacks.iter().map(|s| s.retries).sum::<u32>(), 1);
  assert_eq!(provider.count_for(&addr("app", "api"), Operation::Create), 2);
}

#[tokio::test]
async fn redeploy_changes_nothing() {
  let provider = acme_provider();
  let orchestrator = orchestrator(&provider);
  let first = orchestrator.deploy(&acme()).await.unwrap();

  provider.clear_calls();
  let second = orchestrator.deploy(&acme()).await.unwrap();

  assert!(second.is_success());
  assert_eq!(provider.count(Operation::Create), 0);
  assert_eq!(provider.count(Operation::Update), 0);
  assert!(second.stacks.iter().all(|s| s.operations.is_empty()));
  assert!(
    second
      .stacks
      .iter()
      .flat_map(|s| &s.changes)
      .all(|c| c.change == ChangeKind::Unchanged)
  );

  for (a, b) in first.stacks.iter().zip(&second.stacks) {
    assert_eq!(a.outputs, b.outputs);
  }
}

#[tokio::test]
async fn rerun_after_partial_failure_resumes() {
  let provider = acme_provider();
  provider.fail_next(addr("app", "cdn"), Operation::Create, ProviderError::permanent("quota exceeded"));
  let orchestrator = orchestrator(&provider);

  let failed = orchestrator.deploy(&acme()).await.unwrap();
  assert_eq!(failed.failed(), vec!["app"]);

  provider.clear_calls();
  let report = orchestrator.deploy(&acme()).await.unwrap();

  assert!(report.is_success());
  assert_eq!(provider.count_for(&addr("dns", "zone"), Operation::Create), 0);
  assert_eq!(provider.count_for(&addr("app", "site"), Operation::Create), 0);
  assert_eq!(provider.count_for(&addr("app", "cdn"), Operation::Create), 1);
}

#[tokio::test]
async fn changed_config_is_updated_in_place() {
  let provider = acme_provider();
  let orchestrator = orchestrator(&provider);
  orchestrator.deploy(&acme()).await.unwrap();

  let deployment = acme().with_context("domain_name", "acme.test");
  let report = orchestrator.deploy(&deployment).await.unwrap();

  assert!(report.is_success());
  let dns = report.stack("dns").unwrap();
  let updated: Vec<_> = dns.operations.iter().map(|op| op.address.id.as_str()).collect();
  assert_eq!(updated, vec!["zone", "cert"]);
  assert!(dns.operations.iter().all(|op| op.operation == Operation::Update));
  assert_eq!(dns.outputs["hostedZoneId"], Value::from("Z123"));
}

#[tokio::test]
async fn outputs_can_be_snapshotted() {
  let provider = acme_provider();
  let report = orchestrator(&provider).deploy(&acme()).await.unwrap();

  let temp = TempDir::new().unwrap();
  let path = temp.path().join("outputs.json");
  OutputSnapshot::capture(&report.environment, &report.output_store())
    .save(&path)
    .unwrap();

  let snapshot = OutputSnapshot::load(&path).unwrap();
  assert_eq!(snapshot.environment, "prod");
  let stacks: Vec<_> = snapshot.stacks.iter().map(|s| s.stack.as_str()).collect();
  assert_eq!(stacks, vec!["dns", "cicd", "app", "monitoring"]);
  assert_eq!(snapshot.stack("app").unwrap().outputs["distributionId"], Value::from("E456"));
}
