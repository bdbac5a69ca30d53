//! Resource kinds and their static attribute schemas.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The type tag of a resource.
///
/// Built-in kinds carry a fixed schema: which configuration attributes they
/// accept, which attributes the provider produces once the resource exists,
/// and whether the resource needs an asynchronous readiness signal before
/// dependents may use it. `Custom` kinds accept any attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceKind {
  HostedZone,
  Certificate,
  OidcProvider,
  Role,
  Vpc,
  Repository,
  Cluster,
  TaskDefinition,
  Service,
  Bucket,
  Distribution,
  DnsRecord,
  Canary,
  Alarm,
  Dashboard,
  /// Caller-defined kind, written as `custom:<name>`.
  Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown resource type: {0}")]
pub struct UnknownKindError(pub String);

/// Type tags of the built-in kinds.
pub const BUILTIN_TAGS: &[&str] = &[
  "hosted_zone",
  "certificate",
  "oidc_provider",
  "role",
  "vpc",
  "repository",
  "cluster",
  "task_definition",
  "service",
  "bucket",
  "distribution",
  "dns_record",
  "canary",
  "alarm",
  "dashboard",
];

impl ResourceKind {
  /// Create a caller-defined kind.
  pub fn custom(name: impl Into<String>) -> Self {
    ResourceKind::Custom(name.into())
  }

  /// Parse a type tag such as `bucket` or `custom:queue`.
  pub fn parse(tag: &str) -> Result<Self, UnknownKindError> {
    if let Some(name) = tag.strip_prefix("custom:") {
      if name.is_empty() {
        return Err(UnknownKindError(tag.to_string()));
      }
      return Ok(ResourceKind::Custom(name.to_string()));
    }

    let kind = match tag {
      "hosted_zone" => ResourceKind::HostedZone,
      "certificate" => ResourceKind::Certificate,
      "oidc_provider" => ResourceKind::OidcProvider,
      "role" => ResourceKind::Role,
      "vpc" => ResourceKind::Vpc,
      "repository" => ResourceKind::Repository,
      "cluster" => ResourceKind::Cluster,
      "task_definition" => ResourceKind::TaskDefinition,
      "service" => ResourceKind::Service,
      "bucket" => ResourceKind::Bucket,
      "distribution" => ResourceKind::Distribution,
      "dns_record" => ResourceKind::DnsRecord,
      "canary" => ResourceKind::Canary,
      "alarm" => ResourceKind::Alarm,
      "dashboard" => ResourceKind::Dashboard,
      other => return Err(UnknownKindError(other.to_string())),
    };
    Ok(kind)
  }

  /// The serialized type tag.
  pub fn tag(&self) -> String {
    let tag = match self {
      ResourceKind::HostedZone => "hosted_zone",
      ResourceKind::Certificate => "certificate",
      ResourceKind::OidcProvider => "oidc_provider",
      ResourceKind::Role => "role",
      ResourceKind::Vpc => "vpc",
      ResourceKind::Repository => "repository",
      ResourceKind::Cluster => "cluster",
      ResourceKind::TaskDefinition => "task_definition",
      ResourceKind::Service => "service",
      ResourceKind::Bucket => "bucket",
      ResourceKind::Distribution => "distribution",
      ResourceKind::DnsRecord => "dns_record",
      ResourceKind::Canary => "canary",
      ResourceKind::Alarm => "alarm",
      ResourceKind::Dashboard => "dashboard",
      ResourceKind::Custom(name) => return format!("custom:{name}"),
    };
    tag.to_string()
  }

  pub fn is_custom(&self) -> bool {
    matches!(self, ResourceKind::Custom(_))
  }

  /// Configuration attributes this kind accepts, or `None` when any
  /// attribute is allowed.
  pub fn config_attributes(&self) -> Option<&'static [&'static str]> {
    let attrs: &'static [&'static str] = match self {
      ResourceKind::HostedZone => &["zoneName", "comment"],
      ResourceKind::Certificate => &["domainName", "subjectAlternativeNames", "hostedZoneId", "validation"],
      ResourceKind::OidcProvider => &["url", "clientIds", "thumbprints"],
      ResourceKind::Role => &[
        "roleName",
        "assumedBy",
        "conditions",
        "managedPolicies",
        "policyStatements",
      ],
      ResourceKind::Vpc => &["cidr", "maxAzs", "natGateways"],
      ResourceKind::Repository => &["repositoryName", "import"],
      ResourceKind::Cluster => &["clusterName", "vpcId", "containerInsights"],
      ResourceKind::TaskDefinition => &[
        "family",
        "cpu",
        "memory",
        "image",
        "containerPort",
        "environment",
        "secrets",
        "logging",
      ],
      ResourceKind::Service => &[
        "serviceName",
        "clusterArn",
        "taskDefinitionArn",
        "desiredCount",
        "certificateArn",
        "domainName",
        "hostedZoneId",
        "healthCheckPath",
        "publicLoadBalancer",
      ],
      ResourceKind::Bucket => &[
        "bucketName",
        "publicAccess",
        "encryption",
        "removalPolicy",
        "autoDeleteObjects",
        "lifecycleRules",
      ],
      ResourceKind::Distribution => &[
        "domainNames",
        "certificateArn",
        "originBucket",
        "apiOrigin",
        "defaultRootObject",
        "errorResponses",
        "priceClass",
      ],
      ResourceKind::DnsRecord => &["zoneId", "recordName", "recordType", "target", "ttl"],
      ResourceKind::Canary => &[
        "canaryName",
        "schedule",
        "script",
        "artifactsBucket",
        "runtime",
        "environment",
      ],
      ResourceKind::Alarm => &[
        "alarmName",
        "metric",
        "threshold",
        "evaluationPeriods",
        "comparison",
        "treatMissingData",
        "dimensions",
      ],
      ResourceKind::Dashboard => &["dashboardName", "widgets"],
      ResourceKind::Custom(_) => return None,
    };
    Some(attrs)
  }

  /// Attributes the provider computes once the resource exists.
  pub fn produced_attributes(&self) -> &'static [&'static str] {
    match self {
      ResourceKind::HostedZone => &["hostedZoneId", "nameServers"],
      ResourceKind::Certificate => &["certificateArn"],
      ResourceKind::OidcProvider => &["providerArn"],
      ResourceKind::Role => &["roleArn"],
      ResourceKind::Vpc => &["vpcId", "subnetIds"],
      ResourceKind::Repository => &["repositoryUri", "repositoryArn"],
      ResourceKind::Cluster => &["clusterArn"],
      ResourceKind::TaskDefinition => &["taskDefinitionArn"],
      ResourceKind::Service => &["serviceArn", "loadBalancerDnsName"],
      ResourceKind::Bucket => &["bucketName", "bucketArn"],
      ResourceKind::Distribution => &["distributionId", "domainName"],
      ResourceKind::DnsRecord => &["fqdn"],
      ResourceKind::Canary => &["canaryName", "canaryArn"],
      ResourceKind::Alarm => &["alarmArn"],
      ResourceKind::Dashboard => &["dashboardArn"],
      ResourceKind::Custom(_) => &[],
    }
  }

  /// Whether `attribute` may appear in this kind's configuration.
  pub fn accepts(&self, attribute: &str) -> bool {
    self
      .config_attributes()
      .is_none_or(|attrs| attrs.contains(&attribute))
  }

  /// Whether `attribute` can be read from a live resource of this kind.
  pub fn exposes(&self, attribute: &str) -> bool {
    self.is_custom() || self.produced_attributes().contains(&attribute) || self.accepts(attribute)
  }

  /// Whether the resource must report readiness before dependents proceed.
  pub fn stabilizes(&self) -> bool {
    matches!(
      self,
      ResourceKind::Certificate | ResourceKind::Service | ResourceKind::Distribution | ResourceKind::Canary
    )
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.tag())
  }
}

impl TryFrom<String> for ResourceKind {
  type Error = UnknownKindError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    ResourceKind::parse(&value)
  }
}

impl From<ResourceKind> for String {
  fn from(kind: ResourceKind) -> Self {
    kind.tag()
  }
}
