//! Dry runs.

use stackflow_lib::consts::KNOWN_AFTER_APPLY;
use stackflow_lib::provider::Operation;
use stackflow_lib::reconcile::ChangeKind;
use stackflow_lib::value::Value;

use super::common::{acme, acme_provider, orchestrator};

#[tokio::test]
async fn plan_on_empty_environment_creates_everything() {
  let provider = acme_provider();
  let plan = orchestrator(&provider).plan(&acme()).await.unwrap();

  assert_eq!(plan.order, vec!["dns", "cicd", "app", "monitoring"]);
  assert_eq!(plan.count(ChangeKind::Create), 12);
  assert_eq!(plan.count(ChangeKind::Update), 0);

  let app = plan.stack("app").unwrap();
  assert_eq!(app.outputs["distributionId"], Value::from(KNOWN_AFTER_APPLY));

  assert!(provider.resources().is_empty());
  assert_eq!(provider.count(Operation::Create), 0);
  assert_eq!(provider.count(Operation::Update), 0);
}

#[tokio::test]
async fn plan_after_deploy_is_empty() {
  let provider = acme_provider();
  let orchestrator = orchestrator(&provider);
  let report = orchestrator.deploy(&acme()).await.unwrap();

  let plan = orchestrator.plan(&acme()).await.unwrap();
  assert_eq!(plan.count(ChangeKind::Create), 0);
  assert_eq!(plan.count(ChangeKind::Update), 0);
  assert_eq!(
    plan.stack("app").unwrap().outputs,
    report.stack("app").unwrap().outputs
  );
}

#[tokio::test]
async fn plan_names_changed_attributes() {
  let provider = acme_provider();
  let orchestrator = orchestrator(&provider);
  orchestrator.deploy(&acme()).await.unwrap();

  let plan = orchestrator
    .plan(&acme().with_context("domain_name", "acme.test"))
    .await
    .unwrap();

  let zone = &plan.stack("dns").unwrap().changes[0];
  assert_eq!(zone.change, ChangeKind::Update);
  assert_eq!(zone.attributes, vec!["zoneName".to_string()]);
  assert_eq!(plan.stack("cicd").unwrap().count(ChangeKind::Unchanged), 3);
}
