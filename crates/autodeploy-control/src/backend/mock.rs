//! In-process backends for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::decision::StrategyPlan;
use crate::error::{DeploymentError, ProvisioningError};
use crate::profile::RepositoryProfile;
use crate::types::DeploymentId;

use super::{
    AppEndpoint, DeployedApplication, DeploymentBackend, Probe, ProgressSink, ProvisionRequest,
    ProvisionedInfrastructure, ProvisioningBackend,
};

/// Mock provisioner for testing.
///
/// Records every provision and teardown so tests can assert on cleanup.
#[derive(Debug, Default)]
pub struct MockProvisioner {
    failure: Option<String>,
    teardown_failure: Option<String>,
    ready_after: u32,
    never_ready: bool,
    provision_calls: AtomicU32,
    ready_checks: AtomicU32,
    active: RwLock<HashMap<DeploymentId, ProvisionedInfrastructure>>,
    torn_down: RwLock<Vec<DeploymentId>>,
}

impl MockProvisioner {
    /// A provisioner that succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provisioner whose `provision` fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Report not ready for the first `checks` readiness checks.
    #[must_use]
    pub const fn ready_after(mut self, checks: u32) -> Self {
        self.ready_after = checks;
        self
    }

    /// Never report ready.
    #[must_use]
    pub const fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// Make `teardown` fail with `message` after recording the call.
    #[must_use]
    pub fn with_failing_teardown(mut self, message: impl Into<String>) -> Self {
        self.teardown_failure = Some(message.into());
        self
    }

    /// Number of `provision` calls.
    #[must_use]
    pub fn provision_calls(&self) -> u32 {
        self.provision_calls.load(Ordering::SeqCst)
    }

    /// Number of readiness checks.
    #[must_use]
    pub fn ready_checks(&self) -> u32 {
        self.ready_checks.load(Ordering::SeqCst)
    }

    /// Deployments torn down, in call order.
    #[must_use]
    pub fn torn_down(&self) -> Vec<DeploymentId> {
        self.torn_down
            .read()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Whether infrastructure for `id` currently exists.
    #[must_use]
    pub fn is_active(&self, id: &DeploymentId) -> bool {
        self.active
            .read()
            .map(|active| active.contains_key(id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ProvisioningBackend for MockProvisioner {
    async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionedInfrastructure, ProvisioningError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(ProvisioningError::new(message.clone()));
        }

        let prefix = request.resource_prefix();
        let mut metadata = BTreeMap::new();
        metadata.insert("provider".to_owned(), request.cloud_provider.to_string());
        metadata.insert("strategy".to_owned(), request.strategy.to_string());
        metadata.insert("region".to_owned(), request.infrastructure.region.clone());
        metadata.insert("resource_prefix".to_owned(), prefix.clone());

        let infra = ProvisionedInfrastructure {
            deployment_id: request.deployment_id.clone(),
            endpoint: Some(format!("https://{prefix}.mock.invalid")),
            metadata,
        };

        self.active
            .write()
            .map_err(|_| ProvisioningError::new("lock poisoned"))?
            .insert(request.deployment_id.clone(), infra.clone());

        Ok(infra)
    }

    async fn is_ready(
        &self,
        _infra: &ProvisionedInfrastructure,
    ) -> Result<bool, ProvisioningError> {
        let checks = self.ready_checks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(!self.never_ready && checks > self.ready_after)
    }

    async fn teardown(
        &self,
        request: &ProvisionRequest,
        _infra: Option<&ProvisionedInfrastructure>,
    ) -> Result<(), ProvisioningError> {
        self.torn_down
            .write()
            .map_err(|_| ProvisioningError::new("lock poisoned"))?
            .push(request.deployment_id.clone());
        self.active
            .write()
            .map_err(|_| ProvisioningError::new("lock poisoned"))?
            .remove(&request.deployment_id);

        match &self.teardown_failure {
            Some(message) => Err(ProvisioningError::new(message.clone())),
            None => Ok(()),
        }
    }
}

/// Mock deployment backend for testing.
#[derive(Debug, Default)]
pub struct MockDeployer {
    failure: Option<String>,
    endpoint: Option<AppEndpoint>,
    calls: AtomicU32,
}

impl MockDeployer {
    /// A deployer that returns the provisioned endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A deployer whose `deploy` fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Report `endpoint` instead of the provisioned one.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: AppEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Number of `deploy` calls.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeploymentBackend for MockDeployer {
    async fn deploy(
        &self,
        profile: &RepositoryProfile,
        infra: &ProvisionedInfrastructure,
        plan: &StrategyPlan,
        progress: &dyn ProgressSink,
    ) -> Result<DeployedApplication, DeploymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress
            .report(format!(
                "building {} application ({} build steps)",
                profile.language,
                plan.application.build_commands.len()
            ))
            .await;

        if let Some(message) = &self.failure {
            return Err(DeploymentError::new(message.clone()));
        }

        progress
            .report(format!(
                "starting application on port {}",
                plan.application.port
            ))
            .await;

        let endpoint = self.endpoint.clone().unwrap_or_else(|| {
            infra.endpoint.as_ref().map_or_else(
                || AppEndpoint::unverifiable("infrastructure exposes no endpoint"),
                AppEndpoint::url,
            )
        });

        let mut metadata = BTreeMap::new();
        metadata.insert("deployer".to_owned(), "mock".to_owned());
        Ok(DeployedApplication { endpoint, metadata })
    }
}

/// Probe that succeeds from a fixed attempt onwards.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    succeed_on: Option<u32>,
    calls: AtomicU32,
}

impl ScriptedProbe {
    /// Succeed on the first probe.
    #[must_use]
    pub const fn always() -> Self {
        Self::succeeds_on(1)
    }

    /// Fail until the `attempt`-th probe, then succeed.
    #[must_use]
    pub const fn succeeds_on(attempt: u32) -> Self {
        Self {
            succeed_on: Some(attempt),
            calls: AtomicU32::new(0),
        }
    }

    /// Never succeed.
    #[must_use]
    pub const fn never() -> Self {
        Self {
            succeed_on: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Number of probes issued.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self, _url: &str) -> bool {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.succeed_on.is_some_and(|n| attempt >= n)
    }
}
