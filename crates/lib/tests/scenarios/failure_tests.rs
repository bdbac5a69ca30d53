//! Definition errors, run-time failures and their isolation.

use std::sync::Arc;
use std::time::Duration;

use stackflow_lib::deployment::Deployment;
use stackflow_lib::graph::{GraphError, build_graph};
use stackflow_lib::orchestrator::{FailurePolicy, Orchestrator, OrchestratorConfig, RollbackAction, SkipReason};
use stackflow_lib::provider::{MemoryProvider, Operation, ProviderError};
use stackflow_lib::reconcile::{ChangeKind, StabilizeConfig};
use stackflow_lib::resource::{ResourceKind, ResourceSpec};
use stackflow_lib::stack::{Stack, StackStatus};
use stackflow_lib::value::{Reference, Value};

use super::common::{acme, acme_provider, addr, app, cicd, dns, fast_config, monitoring, orchestrator};

#[tokio::test]
async fn unknown_reference_fails_before_any_provider_call() {
  let provider = acme_provider();
  let deployment = Deployment::new("prod")
    .with_context("domain_name", "acme.example")
    .stack(dns())
    .stack(Stack::new("monitoring").requires("app", "distributionId"));

  let err = orchestrator(&provider).deploy(&deployment).await.unwrap_err();

  assert_eq!(
    err,
    GraphError::UnknownReference {
      stack: "monitoring".to_string(),
      reference: Reference::new("app", "distributionId"),
    }
  );
  assert_eq!(
    err.to_string(),
    "stack 'monitoring' references unknown output 'app.distributionId'"
  );
  assert!(provider.calls().is_empty());
}

#[test]
fn stack_cycle_is_rejected() {
  let deployment = Deployment::new("prod")
    .stack(
      Stack::new("dns")
        .resource(ResourceSpec::new("zone", ResourceKind::HostedZone))
        .output("hostedZoneId", "zone", "hostedZoneId")
        .requires("app", "distributionId"),
    )
    .stack(
      Stack::new("app")
        .resource(ResourceSpec::new("cdn", ResourceKind::Distribution))
        .output("distributionId", "cdn", "distributionId")
        .requires("dns", "hostedZoneId"),
    );

  match build_graph(&deployment) {
    Err(GraphError::Cycle(cycle)) => {
      assert_eq!(cycle.stack, None);
      assert_eq!(cycle.members, vec!["dns".to_string(), "app".to_string()]);
    }
    other => panic!("expected a cycle, got {other:?}"),
  }
}

#[tokio::test]
async fn failed_stack_halts_its_dependents() {
  let provider = acme_provider();
  provider.fail_next(addr("app", "api"), Operation::Create, ProviderError::permanent("invalid image"));

  let report = orchestrator(&provider).deploy(&acme()).await.unwrap();

  assert_eq!(report.succeeded(), vec!["dns", "cicd"]);
  assert_eq!(report.failed(), vec!["app"]);
  assert_eq!(
    report.skipped(),
    vec![(
      "monitoring",
      &SkipReason::DependencyFailed {
        stack: "app".to_string()
      }
    )]
  );

  let failure = report.first_failure.as_ref().unwrap();
  assert_eq!(failure.stack, "app");
  assert_eq!(failure.failure.resource, Some(addr("app", "api")));
  assert_eq!(failure.failure.operation, Some(Operation::Create));
  assert!(failure.failure.message.contains("invalid image"));

  // Upstream outputs stay recorded; the dependent was never attempted.
  let store = report.output_store();
  assert!(store.is_recorded("dns") && store.is_recorded("cicd"));
  assert!(!store.is_recorded("app"));
  assert_eq!(report.stack("monitoring").unwrap().status, StackStatus::Pending);
  assert!(provider.calls().iter().all(|c| !c.target.starts_with("monitoring")));
}

#[tokio::test]
async fn skip_dependents_runs_unrelated_stacks() {
  let provider = acme_provider();
  provider.fail_next(addr("dns", "cert"), Operation::Create, ProviderError::permanent("validation failed"));

  let orchestrator = Orchestrator::new(provider.clone()).with_config(OrchestratorConfig {
    failure_policy: FailurePolicy::SkipDependents,
    ..fast_config()
  });
  let report = orchestrator.deploy(&acme()).await.unwrap();

  assert_eq!(report.failed(), vec!["dns"]);
  assert_eq!(report.succeeded(), vec!["cicd"]);
  for stack in ["app", "monitoring"] {
    assert_eq!(
      report.stack(stack).unwrap().skipped,
      Some(SkipReason::DependencyFailed { stack: "dns".to_string() })
    );
  }
}

#[tokio::test]
async fn halt_pipeline_skips_unrelated_stacks() {
  let provider = acme_provider();
  provider.fail_next(addr("dns", "cert"), Operation::Create, ProviderError::permanent("validation failed"));

  let report = orchestrator(&provider).deploy(&acme()).await.unwrap();

  assert_eq!(
    report.stack("cicd").unwrap().skipped,
    Some(SkipReason::PipelineHalted { after: "dns".to_string() })
  );
}

#[tokio::test]
async fn stabilization_timeout_fails_the_stack() {
  let provider = acme_provider();
  provider.stabilize_after(addr("dns", "cert"), u32::MAX);

  let orchestrator = Orchestrator::new(provider.clone()).with_config(OrchestratorConfig {
    stabilize: StabilizeConfig {
      poll_interval: Duration::from_millis(2),
      timeout: Duration::from_millis(20),
    },
    ..fast_config()
  });
  let report = orchestrator.deploy(&acme()).await.unwrap();

  let dns = report.stack("dns").unwrap();
  assert_eq!(dns.status, StackStatus::Failed);
  let error = dns.error.as_ref().unwrap();
  assert_eq!(error.operation, Some(Operation::IsStable));
  assert!(error.message.contains("did not stabilize"));

  // The certificate exists but is not ready: it stays live.
  assert!(provider.get(&addr("dns", "cert")).is_some());
}

#[tokio::test]
async fn deployment_timeout_stops_new_work() {
  let provider = acme_provider();
  provider.stabilize_after(addr("dns", "cert"), u32::MAX);

  let orchestrator = Orchestrator::new(provider.clone()).with_config(OrchestratorConfig {
    stabilize: StabilizeConfig {
      poll_interval: Duration::from_millis(5),
      timeout: Duration::from_secs(30),
    },
    deployment_timeout: Some(Duration::from_millis(50)),
    ..fast_config()
  });
  let report = orchestrator.deploy(&acme()).await.unwrap();

  assert!(report.timed_out);
  assert!(report.cancelled);
  assert_eq!(report.failed(), vec!["dns"]);
  assert!(report.stack("dns").unwrap().error.as_ref().unwrap().message.contains("cancelled"));
  for stack in ["cicd", "app", "monitoring"] {
    assert_eq!(report.stack(stack).unwrap().skipped, Some(SkipReason::Cancelled));
  }
}

#[tokio::test]
async fn rollback_plan_undoes_the_failed_attempt() {
  let provider = acme_provider();
  provider.fail_next(addr("app", "alias"), Operation::Create, ProviderError::permanent("record exists"));
  let orchestrator = orchestrator(&provider);

  let report = orchestrator.deploy(&acme()).await.unwrap();
  assert_eq!(report.rollback.len(), 1);

  let plan = &report.rollback[0];
  assert_eq!(plan.stack, "app");
  let steps: Vec<_> = plan.steps.iter().map(|s| s.address.id.as_str()).collect();
  assert_eq!(steps, vec!["cdn", "api", "site"]);
  assert!(plan.steps.iter().all(|s| s.action == RollbackAction::Delete));

  // Nothing is undone until asked.
  assert!(provider.get(&addr("app", "cdn")).is_some());

  let rolled_back = orchestrator.rollback(plan).await;
  assert!(rolled_back.is_complete());
  for id in ["site", "api", "cdn"] {
    assert!(provider.get(&addr("app", id)).is_none());
  }
  assert!(provider.get(&addr("dns", "zone")).is_some());
}

#[tokio::test]
async fn update_failure_rolls_back_to_previous_config() {
  let provider = acme_provider();
  let orchestrator = orchestrator(&provider);
  orchestrator.deploy(&acme()).await.unwrap();

  provider.fail_next(addr("dns", "cert"), Operation::Update, ProviderError::permanent("in use"));
  let report = orchestrator
    .deploy(&acme().with_context("domain_name", "acme.test"))
    .await
    .unwrap();

  let plan = &report.rollback[0];
  assert_eq!(plan.steps.len(), 1);
  assert_eq!(plan.steps[0].address, addr("dns", "zone"));
  assert!(matches!(plan.steps[0].action, RollbackAction::Restore { .. }));

  orchestrator.rollback(plan).await;
  let zone = provider.get(&addr("dns", "zone")).unwrap();
  assert_eq!(zone.config["zoneName"], Value::from("acme.example"));
}

#[tokio::test]
async fn obsolete_resources_need_an_explicit_prune() {
  let provider = acme_provider();
  let orchestrator = orchestrator(&provider);
  orchestrator.deploy(&acme()).await.unwrap();

  let mut trimmed = cicd();
  trimmed.resources.retain(|r| r.id.as_str() != "images");
  trimmed.produced_outputs.remove("repositoryUri");
  let deployment = Deployment::new("prod")
    .with_context("domain_name", "acme.example")
    .with_context("github_org", "acme")
    .stack(monitoring())
    .stack(dns())
    .stack(trimmed)
    .stack(app());

  let report = orchestrator.deploy(&deployment).await.unwrap();
  assert!(report.is_success());
  assert_eq!(report.obsolete(), vec![&addr("cicd", "images")]);
  let cicd = report.stack("cicd").unwrap();
  assert_eq!(cicd.changes.last().unwrap().change, ChangeKind::Delete);
  assert!(provider.get(&addr("cicd", "images")).is_some());

  let obsolete: Vec<_> = report.obsolete().into_iter().cloned().collect();
  let pruned = orchestrator.prune(&obsolete).await;
  assert_eq!(pruned.deleted, obsolete);
  assert!(provider.get(&addr("cicd", "images")).is_none());
}

#[tokio::test]
async fn independent_deployments_share_nothing() {
  let a = Arc::new(MemoryProvider::new());
  let b = Arc::new(MemoryProvider::new());
  let deployment = acme();

  let (oa, ob) = (orchestrator(&a), orchestrator(&b));
  let (ra, rb) = tokio::join!(oa.deploy(&deployment), ob.deploy(&deployment));
  let (ra, rb) = (ra.unwrap(), rb.unwrap());

  assert!(ra.is_success() && rb.is_success());
  assert_eq!(
    ra.stack("app").unwrap().outputs["distributionId"],
    rb.stack("app").unwrap().outputs["distributionId"]
  );
}
