//! Structured deployment plan handed to the backends.
//!
//! The plan is pure data. Backends turn it into templates, API calls or
//! whatever their platform needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::scoring::ScoreTable;
use crate::profile::{Framework, Language, ResourceEstimate, ServiceKind};
use crate::requirements::{CloudProvider, Environment};
use crate::strategy::HostingStrategy;

/// Machine size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceTier {
    /// Burstable, smallest class.
    Micro,
    /// General purpose, two cores.
    Medium,
    /// General purpose, larger memory.
    Large,
}

impl InstanceTier {
    /// Provider-specific instance type name.
    #[must_use]
    pub const fn instance_type(&self, provider: CloudProvider) -> &'static str {
        match (provider, self) {
            (CloudProvider::Aws, Self::Micro) => "t3.micro",
            (CloudProvider::Aws, Self::Medium) => "t3.medium",
            (CloudProvider::Aws, Self::Large) => "t3.large",
            (CloudProvider::Gcp, Self::Micro) => "e2-micro",
            (CloudProvider::Gcp, Self::Medium) => "e2-medium",
            (CloudProvider::Gcp, Self::Large) => "e2-standard-2",
            (CloudProvider::Azure, Self::Micro) => "Standard_B1s",
            (CloudProvider::Azure, Self::Medium) => "Standard_B2s",
            (CloudProvider::Azure, Self::Large) => "Standard_B2ms",
        }
    }

    /// Monthly on-demand cost in US cents.
    #[must_use]
    pub const fn monthly_cents(&self) -> u32 {
        match self {
            Self::Micro => 850,
            Self::Medium => 3370,
            Self::Large => 6740,
        }
    }
}

/// What the deployment backend needs to know about the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    /// Detected language.
    pub language: Language,
    /// Detected framework.
    pub framework: Option<Framework>,
    /// Port the application listens on.
    pub port: u16,
    /// Commands that install dependencies and build.
    pub build_commands: Vec<String>,
    /// Commands that launch the application.
    pub start_commands: Vec<String>,
    /// Environment variables the application reads.
    pub env_vars: Vec<String>,
    /// Estimated runtime resources.
    pub resources: ResourceEstimate,
}

/// Compute sizing, specific to the chosen strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComputeSizing {
    /// One virtual machine.
    Vm {
        /// Size class.
        tier: InstanceTier,
        /// Provider instance type.
        instance_type: String,
        /// Root volume size.
        storage_gb: u32,
    },
    /// Serverless function.
    Serverless {
        /// Function memory.
        memory_mib: u32,
        /// Invocation timeout.
        timeout_secs: u32,
        /// Runtime identifier.
        runtime: String,
        /// Invocation trigger.
        trigger: String,
    },
    /// Managed containers.
    Container {
        /// Whether an image registry is created.
        registry: bool,
        /// Size class of each task.
        tier: InstanceTier,
        /// Provider instance type.
        instance_type: String,
        /// Initial replica count.
        replicas: u32,
    },
    /// Kubernetes cluster.
    Kubernetes {
        /// Worker node count.
        node_count: u32,
        /// Size class of each node.
        node_tier: InstanceTier,
        /// Provider instance type of each node.
        instance_type: String,
        /// Whether an ingress controller is installed.
        ingress: bool,
    },
}

/// Where the compute lives and how it scales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfrastructureDescriptor {
    /// Provider region.
    pub region: String,
    /// Availability zones used.
    pub availability_zones: Vec<String>,
    /// Strategy-specific compute sizing.
    pub compute: ComputeSizing,
    /// Whether capacity scales automatically.
    pub auto_scaling: bool,
    /// Whether a load balancer fronts the application.
    pub load_balancer: bool,
}

/// Network layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkingDescriptor {
    /// Whether a dedicated VPC is created.
    pub vpc: bool,
    /// Public subnet count.
    pub public_subnets: u8,
    /// Private subnet count.
    pub private_subnets: u8,
    /// Whether an internet gateway is attached.
    pub internet_gateway: bool,
    /// Ports opened to the application.
    pub ports: Vec<u16>,
    /// HTTP path probed for health.
    pub health_check_path: Option<String>,
    /// Whether a load balancer is provisioned.
    pub load_balancer: bool,
    /// Whether TLS terminates at the load balancer.
    pub tls: bool,
}

/// Role a backing service plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    /// Persistent database.
    Database,
    /// In-memory cache.
    Cache,
}

/// A managed backing service to provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service kind.
    pub kind: ServiceKind,
    /// Role of the service.
    pub role: ServiceRole,
    /// Engine version.
    pub version: String,
    /// Provider instance class.
    pub instance_class: String,
    /// Allocated storage, for services that have any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_gb: Option<u32>,
}

impl ServiceDescriptor {
    /// Descriptor for `kind`, if managed provisioning exists for it.
    #[must_use]
    pub fn for_kind(kind: ServiceKind) -> Option<Self> {
        let (role, version, instance_class, storage_gb) = match kind {
            ServiceKind::Postgresql => (ServiceRole::Database, "13", "db.t3.micro", Some(20)),
            ServiceKind::Mysql => (ServiceRole::Database, "8.0", "db.t3.micro", Some(20)),
            ServiceKind::Redis => (ServiceRole::Cache, "6.2", "cache.t3.micro", None),
            ServiceKind::Mongodb => (ServiceRole::Database, "4.4", "t3.small", None),
            ServiceKind::Sqlite | ServiceKind::Elasticsearch => return None,
        };
        Some(Self {
            kind,
            role,
            version: version.to_owned(),
            instance_class: instance_class.to_owned(),
            storage_gb,
        })
    }
}

/// Observability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringDescriptor {
    /// Centralised log collection.
    pub logging: bool,
    /// Metrics collection.
    pub metrics: bool,
    /// Alerting rules.
    pub alerts: bool,
    /// Days logs are retained.
    pub log_retention_days: u32,
    /// Distributed tracing.
    pub tracing: bool,
}

/// Estimated monthly cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Total in US dollars.
    pub monthly_usd: f64,
    /// Per-component amounts in US dollars.
    pub breakdown: BTreeMap<String, f64>,
}

impl CostEstimate {
    pub(crate) fn from_cents(components: Vec<(String, u32)>) -> Self {
        let total: u32 = components.iter().map(|(_, cents)| cents).sum();
        Self {
            monthly_usd: dollars(total),
            breakdown: components
                .into_iter()
                .map(|(name, cents)| (name, dollars(cents)))
                .collect(),
        }
    }
}

fn dollars(cents: u32) -> f64 {
    f64::from(cents) / 100.0
}

/// Decision for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyPlan {
    /// Chosen strategy.
    pub strategy: HostingStrategy,
    /// Whether a user preference overrode the scored winner.
    pub overridden: bool,
    /// Target cloud.
    pub cloud_provider: CloudProvider,
    /// Target environment.
    pub environment: Environment,
    /// Application descriptor.
    pub application: ApplicationDescriptor,
    /// Compute and placement.
    pub infrastructure: InfrastructureDescriptor,
    /// Network layout.
    pub networking: NetworkingDescriptor,
    /// Managed backing services.
    pub services: Vec<ServiceDescriptor>,
    /// Observability settings.
    pub monitoring: MonitoringDescriptor,
    /// Estimated monthly cost.
    pub cost: CostEstimate,
    /// Scores that produced the choice.
    pub scores: ScoreTable,
}
