//! Pluggable platform backends.
//!
//! The pipeline never talks to a cloud directly. It hands structured
//! descriptors to a [`ProvisioningBackend`], ships the application through a
//! [`DeploymentBackend`] and checks the result with a [`Probe`]. Each backend
//! reports failure through its own error type; the coordinator decides what
//! a failure means for the deployment.

mod http;
mod mock;

pub use http::HttpProbe;
pub use mock::{MockDeployer, MockProvisioner, ScriptedProbe};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::decision::{InfrastructureDescriptor, NetworkingDescriptor, ServiceDescriptor, StrategyPlan};
use crate::error::{DeploymentError, ProvisioningError};
use crate::profile::RepositoryProfile;
use crate::requirements::{CloudProvider, Environment};
use crate::strategy::HostingStrategy;
use crate::types::DeploymentId;

/// Request to create the infrastructure for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Deployment the infrastructure belongs to.
    pub deployment_id: DeploymentId,
    /// Chosen hosting strategy.
    pub strategy: HostingStrategy,
    /// Target cloud.
    pub cloud_provider: CloudProvider,
    /// Target environment.
    pub environment: Environment,
    /// Compute and placement.
    pub infrastructure: InfrastructureDescriptor,
    /// Network layout.
    pub networking: NetworkingDescriptor,
    /// Managed backing services.
    pub services: Vec<ServiceDescriptor>,
}

impl ProvisionRequest {
    /// Build a request from the plan's infrastructure sections.
    #[must_use]
    pub fn from_plan(deployment_id: DeploymentId, plan: &StrategyPlan) -> Self {
        Self {
            deployment_id,
            strategy: plan.strategy,
            cloud_provider: plan.cloud_provider,
            environment: plan.environment,
            infrastructure: plan.infrastructure.clone(),
            networking: plan.networking.clone(),
            services: plan.services.clone(),
        }
    }

    /// Prefix for every resource name created for this deployment.
    #[must_use]
    pub fn resource_prefix(&self) -> String {
        format!(
            "autodeploy-{}-{}",
            self.environment.as_str(),
            self.deployment_id
        )
    }
}

/// Infrastructure a provisioning backend created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedInfrastructure {
    /// Deployment the infrastructure belongs to.
    pub deployment_id: DeploymentId,
    /// Address the application will be reachable at, once deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Backend-specific identifiers (instance ids, cluster names, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Where a deployed application can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppEndpoint {
    /// A URL the health probe can reach.
    Url {
        /// Public URL.
        url: String,
    },
    /// The backend cannot produce a probeable address.
    Unverifiable {
        /// Why the endpoint cannot be probed.
        reason: String,
    },
}

impl AppEndpoint {
    /// Create a probeable endpoint.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// Create an endpoint that skips verification.
    #[must_use]
    pub fn unverifiable(reason: impl Into<String>) -> Self {
        Self::Unverifiable {
            reason: reason.into(),
        }
    }

    /// The URL, if the endpoint has one.
    #[must_use]
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url { url } => Some(url),
            Self::Unverifiable { .. } => None,
        }
    }
}

/// Application a deployment backend shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedApplication {
    /// Where the application can be reached.
    pub endpoint: AppEndpoint,
    /// Backend-specific details.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Receives progress messages from a backend while it works.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Record one progress message.
    async fn report(&self, message: String);
}

/// Creates and destroys infrastructure on a cloud platform.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Create the infrastructure described by `request`.
    async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionedInfrastructure, ProvisioningError>;

    /// Whether the provisioned infrastructure is ready to receive the
    /// application. Backends whose `provision` only returns once everything
    /// is up can keep the default.
    async fn is_ready(
        &self,
        _infra: &ProvisionedInfrastructure,
    ) -> Result<bool, ProvisioningError> {
        Ok(true)
    }

    /// Destroy everything created for `request`.
    ///
    /// `infra` is `None` when `provision` itself failed, possibly after
    /// creating some resources. Implementations should remove whatever they
    /// find and not fail on resources that never existed.
    async fn teardown(
        &self,
        request: &ProvisionRequest,
        infra: Option<&ProvisionedInfrastructure>,
    ) -> Result<(), ProvisioningError>;
}

/// Ships an application onto provisioned infrastructure.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Build and start the application described by `profile` and `plan`.
    async fn deploy(
        &self,
        profile: &RepositoryProfile,
        infra: &ProvisionedInfrastructure,
        plan: &StrategyPlan,
        progress: &dyn ProgressSink,
    ) -> Result<DeployedApplication, DeploymentError>;
}

/// Health probe for a deployed endpoint.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Whether `url` answered successfully. Unreachable endpoints and
    /// non-success statuses are both `false`.
    async fn check(&self, url: &str) -> bool;
}
