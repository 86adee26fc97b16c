//! Strategy decision engine.
//!
//! Scores every [`HostingStrategy`] against a [`RequirementSet`] and a
//! [`RepositoryProfile`], applies any explicit user preference, and expands
//! the chosen strategy into a [`StrategyPlan`]. Deciding never fails.

mod plan;
mod scoring;

pub use plan::{
    ApplicationDescriptor, ComputeSizing, CostEstimate, InfrastructureDescriptor, InstanceTier,
    MonitoringDescriptor, NetworkingDescriptor, ServiceDescriptor, ServiceRole, StrategyPlan,
};
pub use scoring::{score_strategies, ScoreTable, StrategyScore};

use tracing::info;

use crate::config::RegionConfig;
use crate::profile::{Framework, Language, RepositoryProfile};
use crate::requirements::{CloudProvider, Environment, RequirementSet, ScalingTier};
use crate::strategy::HostingStrategy;

const VM_STORAGE_GB: u32 = 20;
const SERVERLESS_TIMEOUT_SECS: u32 = 30;
const KUBERNETES_NODES: u32 = 2;
const SERVICE_MONTHLY_CENTS: u32 = 1500;
const SERVERLESS_MONTHLY_CENTS: u32 = 500;
const CONTAINER_PLATFORM_MONTHLY_CENTS: u32 = 5000;
const KUBERNETES_CONTROL_PLANE_MONTHLY_CENTS: u32 = 7300;

/// Chooses a hosting strategy and generates its plan.
#[derive(Debug, Clone, Default)]
pub struct StrategyDecisionEngine {
    regions: RegionConfig,
}

impl StrategyDecisionEngine {
    /// Create an engine using `regions` for placement.
    #[must_use]
    pub const fn new(regions: RegionConfig) -> Self {
        Self { regions }
    }

    /// Decide how to host the profiled application.
    #[must_use]
    pub fn decide(&self, requirements: &RequirementSet, profile: &RepositoryProfile) -> StrategyPlan {
        let scores = score_strategies(requirements, profile);
        let scored = scores.best();
        let pinned = HostingStrategy::from_preference(requirements.deployment_preference);
        let strategy = pinned.unwrap_or(scored);

        info!(
            strategy = %strategy,
            scored = %scored,
            preference = %requirements.deployment_preference,
            "strategy selected"
        );

        let provider = requirements.cloud_provider;
        let tier = instance_tier(requirements, profile);
        let port = application_port(profile);

        let application = ApplicationDescriptor {
            language: profile.language,
            framework: profile.framework,
            port,
            build_commands: profile.build_commands.clone(),
            start_commands: profile.start_commands.clone(),
            env_vars: profile.env_vars.iter().cloned().collect(),
            resources: profile.resources,
        };

        let services: Vec<ServiceDescriptor> = profile
            .services
            .iter()
            .filter_map(|kind| ServiceDescriptor::for_kind(*kind))
            .collect();

        let cost = cost_estimate(strategy, tier, profile);

        StrategyPlan {
            strategy,
            overridden: pinned.is_some_and(|p| p != scored),
            cloud_provider: provider,
            environment: requirements.environment,
            application,
            infrastructure: self.infrastructure(strategy, provider, tier, profile),
            networking: networking(strategy, port),
            services,
            monitoring: monitoring(strategy, requirements.environment),
            cost,
            scores,
        }
    }

    fn infrastructure(
        &self,
        strategy: HostingStrategy,
        provider: CloudProvider,
        tier: InstanceTier,
        profile: &RepositoryProfile,
    ) -> InfrastructureDescriptor {
        let region = self.regions.for_provider(provider).to_owned();
        let availability_zones = availability_zones(provider, &region);
        let instance_type = tier.instance_type(provider).to_owned();

        let (compute, auto_scaling) = match strategy {
            HostingStrategy::Vm => (
                ComputeSizing::Vm {
                    tier,
                    instance_type,
                    storage_gb: VM_STORAGE_GB,
                },
                false,
            ),
            HostingStrategy::Serverless => (
                ComputeSizing::Serverless {
                    memory_mib: profile.resources.memory_mib,
                    timeout_secs: SERVERLESS_TIMEOUT_SECS,
                    runtime: serverless_runtime(profile.language).to_owned(),
                    trigger: "http".to_owned(),
                },
                true,
            ),
            HostingStrategy::Container => (
                ComputeSizing::Container {
                    registry: true,
                    tier,
                    instance_type,
                    replicas: 1,
                },
                true,
            ),
            HostingStrategy::Kubernetes => (
                ComputeSizing::Kubernetes {
                    node_count: KUBERNETES_NODES,
                    node_tier: tier,
                    instance_type,
                    ingress: true,
                },
                true,
            ),
        };

        InfrastructureDescriptor {
            region,
            availability_zones,
            compute,
            auto_scaling,
            load_balancer: strategy.uses_load_balancer(),
        }
    }
}

fn instance_tier(requirements: &RequirementSet, profile: &RepositoryProfile) -> InstanceTier {
    if requirements.scaling == ScalingTier::High || profile.service_count() > 2 {
        InstanceTier::Large
    } else if requirements.scaling == ScalingTier::Moderate || profile.language == Language::Java {
        InstanceTier::Medium
    } else {
        InstanceTier::Micro
    }
}

/// Port the application is expected to listen on.
#[must_use]
pub fn application_port(profile: &RepositoryProfile) -> u16 {
    if let Some(port) = profile.port {
        return port;
    }
    let framework_default = profile.framework.and_then(|f| match f {
        Framework::Flask => Some(5000),
        Framework::Django | Framework::Fastapi => Some(8000),
        Framework::Express => Some(3000),
        Framework::Spring => Some(8080),
        Framework::Streamlit => Some(8501),
        _ => None,
    });
    framework_default.unwrap_or(match profile.language {
        Language::Python => 8000,
        Language::Nodejs => 3000,
        Language::Java | Language::Unknown => 8080,
    })
}

fn serverless_runtime(language: Language) -> &'static str {
    match language {
        Language::Nodejs => "nodejs18.x",
        Language::Java => "java11",
        Language::Python | Language::Unknown => "python3.9",
    }
}

fn availability_zones(provider: CloudProvider, region: &str) -> Vec<String> {
    match provider {
        CloudProvider::Aws => vec![format!("{region}a"), format!("{region}b")],
        CloudProvider::Gcp => vec![format!("{region}-a"), format!("{region}-b")],
        CloudProvider::Azure => vec!["1".to_owned(), "2".to_owned()],
    }
}

fn networking(strategy: HostingStrategy, port: u16) -> NetworkingDescriptor {
    let fronted = strategy.uses_load_balancer();
    NetworkingDescriptor {
        vpc: true,
        public_subnets: 2,
        private_subnets: 2,
        internet_gateway: true,
        ports: vec![port],
        health_check_path: strategy.has_health_check().then(|| "/".to_owned()),
        load_balancer: fronted,
        tls: fronted,
    }
}

fn monitoring(strategy: HostingStrategy, environment: Environment) -> MonitoringDescriptor {
    let production = environment == Environment::Production;
    MonitoringDescriptor {
        logging: true,
        metrics: true,
        alerts: production,
        log_retention_days: if production { 30 } else { 7 },
        tracing: strategy.uses_load_balancer(),
    }
}

fn cost_estimate(
    strategy: HostingStrategy,
    tier: InstanceTier,
    profile: &RepositoryProfile,
) -> CostEstimate {
    let mut components: Vec<(String, u32)> = match strategy {
        HostingStrategy::Vm => vec![("compute".to_owned(), tier.monthly_cents())],
        HostingStrategy::Serverless => vec![("compute".to_owned(), SERVERLESS_MONTHLY_CENTS)],
        HostingStrategy::Container => vec![
            ("platform".to_owned(), CONTAINER_PLATFORM_MONTHLY_CENTS),
            ("compute".to_owned(), InstanceTier::Medium.monthly_cents()),
        ],
        HostingStrategy::Kubernetes => vec![
            ("control_plane".to_owned(), KUBERNETES_CONTROL_PLANE_MONTHLY_CENTS),
            (
                "compute".to_owned(),
                KUBERNETES_NODES * InstanceTier::Large.monthly_cents(),
            ),
        ],
    };
    components.extend(
        profile
            .services
            .iter()
            .map(|kind| (format!("service:{kind}"), SERVICE_MONTHLY_CENTS)),
    );
    CostEstimate::from_cents(components)
}
