//! Shared fixtures for deployment scenarios.

use std::sync::Arc;
use std::time::Duration;

use stackflow_lib::deployment::Deployment;
use stackflow_lib::orchestrator::{FailurePolicy, Orchestrator, OrchestratorConfig};
use stackflow_lib::provider::MemoryProvider;
use stackflow_lib::reconcile::{RetryPolicy, StabilizeConfig};
use stackflow_lib::resource::{ResourceAddress, ResourceKind, ResourceSpec};
use stackflow_lib::stack::Stack;
use stackflow_lib::value::{Attributes, ConfigValue, Value};

pub fn addr(stack: &str, id: &str) -> ResourceAddress {
  ResourceAddress::new(stack, id)
}

/// Retry and polling tuned for tests.
pub fn fast_config() -> OrchestratorConfig {
  OrchestratorConfig {
    parallelism: 4,
    retry: RetryPolicy {
      max_attempts: 3,
      initial_delay: Duration::from_millis(1),
      max_delay: Duration::from_millis(4),
      multiplier: 2.0,
    },
    stabilize: StabilizeConfig {
      poll_interval: Duration::from_millis(1),
      timeout: Duration::from_secs(5),
    },
    deployment_timeout: None,
    failure_policy: FailurePolicy::HaltPipeline,
  }
}

pub fn orchestrator(provider: &Arc<MemoryProvider>) -> Orchestrator {
  Orchestrator::new(provider.clone()).with_config(fast_config())
}

/// A provider whose DNS zone, certificate and distribution report fixed ids.
pub fn acme_provider() -> Arc<MemoryProvider> {
  let provider = Arc::new(MemoryProvider::new());
  let preset = |stack: &str, id: &str, attr: &str, value: &str| {
    provider.preset_attributes(
      addr(stack, id),
      Attributes::from([(attr.to_string(), Value::from(value))]),
    );
  };
  preset("dns", "zone", "hostedZoneId", "Z123");
  preset("dns", "cert", "certificateArn", "arn:cert:1");
  preset("app", "cdn", "distributionId", "E456");
  provider
}

pub fn monitoring() -> Stack {
  Stack::new("monitoring")
    .resource(
      ResourceSpec::new("health", ResourceKind::Canary)
        .with("canaryName", "api-health")
        .with("schedule", "rate(5 minutes)")
        .with("script", "https://$${context:domain_name}/api/health"),
    )
    .resource(
      ResourceSpec::new("errors", ResourceKind::Alarm)
        .with("alarmName", "cdn-5xx")
        .with("metric", "5xxErrorRate")
        .with("threshold", 5.0)
        .with(
          "dimensions",
          ConfigValue::Table(
            [("DistributionId".to_string(), ConfigValue::output("app", "distributionId"))].into(),
          ),
        ),
    )
    .resource(
      ResourceSpec::new("dashboard", ResourceKind::Dashboard)
        .with("dashboardName", "acme")
        .depends_on("health")
        .depends_on("errors"),
    )
    .infer_inputs()
}

pub fn dns() -> Stack {
  Stack::new("dns")
    .resource(
      ResourceSpec::new("zone", ResourceKind::HostedZone).with("zoneName", ConfigValue::context("domain_name")),
    )
    .resource(
      ResourceSpec::new("cert", ResourceKind::Certificate)
        .with("domainName", ConfigValue::context("domain_name"))
        .with("subjectAlternativeNames", ConfigValue::Array(vec!["*.$${context:domain_name}".into()]))
        .with("hostedZoneId", ConfigValue::attr("zone", "hostedZoneId")),
    )
    .output("hostedZoneId", "zone", "hostedZoneId")
    .output("certificateArn", "cert", "certificateArn")
}

pub fn cicd() -> Stack {
  Stack::new("cicd")
    .resource(
      ResourceSpec::new("oidc", ResourceKind::OidcProvider)
        .with("url", "https://token.actions.githubusercontent.com")
        .with("clientIds", ConfigValue::Array(vec!["sts.amazonaws.com".into()])),
    )
    .resource(
      ResourceSpec::new("deployer", ResourceKind::Role)
        .with("roleName", "github-deployer")
        .with("assumedBy", ConfigValue::attr("oidc", "providerArn"))
        .with("conditions", "repo:$${context:github_org}/*"),
    )
    .resource(ResourceSpec::new("images", ResourceKind::Repository).with("repositoryName", "acme-api"))
    .output("deployRoleArn", "deployer", "roleArn")
    .output("repositoryUri", "images", "repositoryUri")
}

pub fn app() -> Stack {
  Stack::new("app")
    .resource(
      ResourceSpec::new("site", ResourceKind::Bucket)
        .with("publicAccess", "blocked")
        .with("encryption", "s3"),
    )
    .resource(
      ResourceSpec::new("api", ResourceKind::Service)
        .with("serviceName", "acme-api")
        .with("desiredCount", 2_i64)
        .with("certificateArn", ConfigValue::output("dns", "certificateArn"))
        .with("hostedZoneId", ConfigValue::output("dns", "hostedZoneId"))
        .with("domainName", "api.$${context:domain_name}")
        .with("healthCheckPath", "/api/health"),
    )
    .resource(
      ResourceSpec::new("cdn", ResourceKind::Distribution)
        .with("originBucket", ConfigValue::attr("site", "bucketName"))
        .with("apiOrigin", ConfigValue::attr("api", "loadBalancerDnsName"))
        .with("certificateArn", ConfigValue::output("dns", "certificateArn"))
        .with("domainNames", ConfigValue::Array(vec![ConfigValue::context("domain_name")]))
        .with("defaultRootObject", "index.html"),
    )
    .resource(
      ResourceSpec::new("alias", ResourceKind::DnsRecord)
        .with("zoneId", ConfigValue::output("dns", "hostedZoneId"))
        .with("recordName", ConfigValue::context("domain_name"))
        .with("recordType", "A")
        .with("target", ConfigValue::attr("cdn", "domainName")),
    )
    .output("distributionId", "cdn", "distributionId")
    .output("siteBucket", "site", "bucketName")
    .infer_inputs()
}

/// Monitoring is declared first to prove the order comes from references.
pub fn acme() -> Deployment {
  Deployment::new("prod")
    .with_context("domain_name", "acme.example")
    .with_context("github_org", "acme")
    .stack(monitoring())
    .stack(dns())
    .stack(cicd())
    .stack(app())
}
