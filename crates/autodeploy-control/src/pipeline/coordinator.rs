//! Drives deployments through the pipeline stages.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{
    AppEndpoint, DeploymentBackend, Probe, ProgressSink, ProvisionRequest,
    ProvisionedInfrastructure, ProvisioningBackend,
};
use crate::config::{ControlConfig, PipelineConfig};
use crate::decision::{StrategyDecisionEngine, StrategyPlan};
use crate::error::{ControlError, ControlResult};
use crate::profile::{RepositoryProfile, RepositoryProfiler};
use crate::requirements::RequirementSet;
use crate::store::PipelineStateStore;
use crate::types::{DeploymentId, DeploymentRecord, LogEntry};

use super::poll;
use super::state::{Active, Completed, Failed, Initiated, Pipeline, PipelineState};

/// The platform backends a coordinator delegates to.
#[derive(Clone)]
pub struct Backends {
    /// Creates and destroys infrastructure.
    pub provisioner: Arc<dyn ProvisioningBackend>,
    /// Ships the application.
    pub deployer: Arc<dyn DeploymentBackend>,
    /// Checks the deployed endpoint.
    pub probe: Arc<dyn Probe>,
}

/// What a failed pipeline leaves behind for teardown.
struct Cleanup {
    request: ProvisionRequest,
    infra: Option<ProvisionedInfrastructure>,
}

struct Failure {
    pipeline: Pipeline<Failed>,
    error: ControlError,
    cleanup: Option<Cleanup>,
}

impl Failure {
    fn at<S: Active>(pipeline: Pipeline<S>, error: ControlError, cleanup: Option<Cleanup>) -> Self {
        Self {
            pipeline: pipeline.fail(error.to_string()),
            error,
            cleanup,
        }
    }
}

type StageResult<T> = Result<T, Failure>;

/// Orchestrates deployment pipelines.
///
/// Each deployment runs as its own task. The only state shared between
/// deployments is the [`PipelineStateStore`].
pub struct ExecutionCoordinator {
    store: Arc<dyn PipelineStateStore>,
    profiler: RepositoryProfiler,
    engine: StrategyDecisionEngine,
    backends: Backends,
    config: PipelineConfig,
    running: DashMap<DeploymentId, CancellationToken>,
}

impl fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("config", &self.config)
            .field("running", &self.running.len())
            .finish_non_exhaustive()
    }
}

impl ExecutionCoordinator {
    /// Create a new coordinator.
    pub fn new(
        store: Arc<dyn PipelineStateStore>,
        backends: Backends,
        config: &ControlConfig,
    ) -> Self {
        Self {
            store,
            profiler: RepositoryProfiler::new(config.profiler.clone()),
            engine: StrategyDecisionEngine::new(config.regions.clone()),
            backends,
            config: config.pipeline.clone(),
            running: DashMap::new(),
        }
    }

    /// The store polling clients read from.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn PipelineStateStore> {
        &self.store
    }

    /// Start a deployment in the background.
    ///
    /// Returns as soon as the record exists; progress is visible through
    /// [`store`](Self::store).
    pub async fn start(
        self: &Arc<Self>,
        checkout: impl Into<PathBuf>,
        requirements: RequirementSet,
    ) -> ControlResult<DeploymentId> {
        let (pipeline, cancel) = self.prepare(checkout.into(), requirements).await?;
        let id = pipeline.id().clone();

        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            coordinator.run(pipeline, cancel).await;
        });

        let coordinator = Arc::clone(self);
        let watched = id.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                coordinator.abandon(&watched, &e).await;
            }
        });

        Ok(id)
    }

    /// Run a deployment to completion and return its final record.
    ///
    /// Pipeline failures are recorded on the returned record, not returned
    /// as errors.
    pub async fn execute(
        &self,
        checkout: impl Into<PathBuf>,
        requirements: RequirementSet,
    ) -> ControlResult<DeploymentRecord> {
        let (pipeline, cancel) = self.prepare(checkout.into(), requirements).await?;
        let id = pipeline.id().clone();
        self.run(pipeline, cancel).await;
        self.store.get(&id).await
    }

    /// Request cancellation of a running deployment.
    ///
    /// The pipeline stops at its next stage boundary or wait. Returns `false`
    /// if the deployment already finished.
    pub async fn cancel(&self, id: &DeploymentId) -> ControlResult<bool> {
        let token = self.running.get(id).map(|entry| entry.value().clone());
        match token {
            Some(token) => {
                info!(deployment_id = %id, "cancellation requested");
                self.log(id, LogEntry::warn("cancellation requested")).await;
                token.cancel();
                Ok(true)
            }
            None => {
                // Distinguish finished deployments from unknown ids.
                self.store.get(id).await?;
                Ok(false)
            }
        }
    }

    /// Number of deployments currently running.
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.len()
    }

    async fn prepare(
        &self,
        checkout: PathBuf,
        requirements: RequirementSet,
    ) -> ControlResult<(Pipeline<Initiated>, CancellationToken)> {
        let id = DeploymentId::generate();
        self.store.create(&id).await?;

        let cancel = CancellationToken::new();
        self.running.insert(id.clone(), cancel.clone());

        info!(
            deployment_id = %id,
            checkout = %checkout.display(),
            "deployment initiated"
        );
        Ok((Pipeline::new(id, checkout, requirements), cancel))
    }

    async fn run(&self, pipeline: Pipeline<Initiated>, cancel: CancellationToken) {
        let id = pipeline.id().clone();
        let _running = RunningGuard {
            running: &self.running,
            id: id.clone(),
        };

        match self.drive(pipeline, &cancel).await {
            Ok(completed) => {
                let outcome = completed.into_outcome();
                let message = match &outcome.url {
                    Some(url) => format!("deployment completed: {url}"),
                    None => "deployment completed".to_owned(),
                };
                if let Err(e) = self.store.complete(&id, outcome, &message).await {
                    error!(deployment_id = %id, error = %e, "failed to record completion");
                }
                info!(deployment_id = %id, "deployment completed successfully");
            }
            Err(failure) => self.record_failure(failure).await,
        }
    }

    /// Record a deployment whose task died without reaching a terminal stage.
    async fn abandon(&self, id: &DeploymentId, cause: &tokio::task::JoinError) {
        error!(deployment_id = %id, error = %cause, "deployment task aborted");
        self.running.remove(id);

        let error = ControlError::internal(format!("deployment task aborted: {cause}"));
        if let Err(e) = self.store.fail(id, &error.to_string()).await {
            error!(deployment_id = %id, error = %e, "failed to record failure");
        }
    }

    async fn drive(
        &self,
        pipeline: Pipeline<Initiated>,
        cancel: &CancellationToken,
    ) -> StageResult<Pipeline<Completed>> {
        let id = pipeline.id().clone();

        // Profiling
        let profiling = pipeline.start_profiling();
        if let Err(e) = self.enter(&profiling, "profiling repository", cancel).await {
            return Err(Failure::at(profiling, e, None));
        }
        let profile = match self.profile(profiling.checkout().to_path_buf()).await {
            Ok(profile) => profile,
            Err(e) => return Err(Failure::at(profiling, e, None)),
        };
        self.log(&id, LogEntry::info(describe_profile(&profile))).await;

        // Deciding
        let deciding = profiling.profiled(profile);
        if let Err(e) = self.enter(&deciding, "choosing deployment strategy", cancel).await {
            return Err(Failure::at(deciding, e, None));
        }
        let plan = self.engine.decide(deciding.requirements(), deciding.profile());
        self.log(&id, LogEntry::info(describe_plan(&plan))).await;
        if plan.overridden {
            self.log(
                &id,
                LogEntry::info(format!(
                    "user preference {} overrides scored strategy {}",
                    plan.strategy,
                    plan.scores.best()
                )),
            )
            .await;
        }

        // Provisioning
        let provisioning = deciding.planned(plan);
        let message = format!(
            "provisioning {} infrastructure on {}",
            provisioning.plan().strategy,
            provisioning.plan().cloud_provider
        );
        if let Err(e) = self.enter(&provisioning, &message, cancel).await {
            return Err(Failure::at(provisioning, e, None));
        }
        let infra = match self.backends.provisioner.provision(provisioning.request()).await {
            Ok(infra) => infra,
            Err(e) => {
                let cleanup = Some(Cleanup {
                    request: provisioning.request().clone(),
                    infra: None,
                });
                return Err(Failure::at(provisioning, e.into(), cleanup));
            }
        };
        let cleanup = Some(Cleanup {
            request: provisioning.request().clone(),
            infra: Some(infra.clone()),
        });
        if let Err(e) = poll::checkpoint(cancel) {
            return Err(Failure::at(provisioning, e, cleanup));
        }
        if let Err(e) = poll::await_readiness(
            self.backends.provisioner.as_ref(),
            &infra,
            self.config.provision_poll_interval(),
            self.config.provision_timeout(),
            cancel,
        )
        .await
        {
            return Err(Failure::at(provisioning, e, cleanup));
        }
        let message = match &infra.endpoint {
            Some(endpoint) => format!("infrastructure ready at {endpoint}"),
            None => "infrastructure ready".to_owned(),
        };
        self.log(&id, LogEntry::info(message)).await;

        // Deploying
        let deploying = provisioning.provisioned(infra);
        if let Err(e) = self.enter(&deploying, "deploying application", cancel).await {
            return Err(Failure::at(deploying, e, cleanup));
        }
        let progress = StoreProgress {
            store: self.store.as_ref(),
            id: &id,
        };
        let deployed = self
            .backends
            .deployer
            .deploy(deploying.profile(), deploying.infra(), deploying.plan(), &progress)
            .await;
        let app = match deployed {
            Ok(app) => app,
            Err(e) => return Err(Failure::at(deploying, e.into(), cleanup)),
        };
        if let Err(e) = poll::checkpoint(cancel) {
            return Err(Failure::at(deploying, e, cleanup));
        }

        // Verifying
        let verifying = deploying.deployed(app);
        if let Err(e) = self.enter(&verifying, "verifying deployment", cancel).await {
            return Err(Failure::at(verifying, e, cleanup));
        }
        let endpoint = verifying.app().endpoint.clone();
        match endpoint {
            AppEndpoint::Url { url } => {
                let verified = poll::verify(
                    self.backends.probe.as_ref(),
                    &url,
                    self.config.verify_interval(),
                    self.config.verify_timeout(),
                    cancel,
                )
                .await;
                match verified {
                    Ok(attempts) => {
                        self.log(
                            &id,
                            LogEntry::info(format!(
                                "{url} healthy after {attempts} probe(s)"
                            )),
                        )
                        .await;
                    }
                    Err(e) => return Err(Failure::at(verifying, e, cleanup)),
                }
            }
            AppEndpoint::Unverifiable { reason } => {
                warn!(deployment_id = %id, reason = %reason, "skipping verification");
                self.log(
                    &id,
                    LogEntry::warn(format!("skipping verification: {reason}")),
                )
                .await;
            }
        }

        Ok(verifying.complete())
    }

    async fn enter<S: PipelineState>(
        &self,
        pipeline: &Pipeline<S>,
        message: &str,
        cancel: &CancellationToken,
    ) -> ControlResult<()> {
        poll::checkpoint(cancel)?;
        self.store
            .set_stage(pipeline.id(), pipeline.stage(), message)
            .await?;
        debug!(deployment_id = %pipeline.id(), stage = %pipeline.stage(), "entered stage");
        Ok(())
    }

    async fn profile(&self, checkout: PathBuf) -> ControlResult<RepositoryProfile> {
        let profiler = self.profiler.clone();
        let profile = tokio::task::spawn_blocking(move || profiler.profile(&checkout))
            .await
            .map_err(|e| ControlError::internal(format!("profiling task failed: {e}")))??;
        Ok(profile)
    }

    async fn record_failure(&self, failure: Failure) {
        let Failure {
            pipeline,
            error,
            cleanup,
        } = failure;
        let id = pipeline.id();

        error!(deployment_id = %id, error = %error, "deployment failed");

        if error.requires_teardown() {
            if let Some(cleanup) = cleanup {
                self.teardown(id, &cleanup).await;
            }
        }

        if let Err(e) = self.store.fail(id, pipeline.error()).await {
            error!(deployment_id = %id, error = %e, "failed to record failure");
        }
    }

    async fn teardown(&self, id: &DeploymentId, cleanup: &Cleanup) {
        info!(deployment_id = %id, "tearing down infrastructure");
        self.log(id, LogEntry::info("tearing down infrastructure")).await;

        match self
            .backends
            .provisioner
            .teardown(&cleanup.request, cleanup.infra.as_ref())
            .await
        {
            Ok(()) => self.log(id, LogEntry::info("infrastructure torn down")).await,
            Err(e) => {
                warn!(deployment_id = %id, error = %e, "teardown failed");
                self.log(id, LogEntry::warn(format!("teardown failed: {e}")))
                    .await;
            }
        }
    }

    async fn log(&self, id: &DeploymentId, entry: LogEntry) {
        if let Err(e) = self.store.append_log(id, entry).await {
            warn!(deployment_id = %id, error = %e, "failed to append log");
        }
    }
}

fn describe_profile(profile: &RepositoryProfile) -> String {
    let framework = profile
        .framework
        .map_or_else(|| "no framework".to_owned(), |f| f.to_string());
    format!(
        "detected {} ({framework}), {} service(s), confidence {:.2}",
        profile.language,
        profile.service_count(),
        profile.confidence
    )
}

fn describe_plan(plan: &StrategyPlan) -> String {
    let scores: Vec<String> = plan
        .scores
        .iter()
        .map(|s| format!("{}={:.1}", s.strategy, s.score))
        .collect();
    format!(
        "selected {} strategy (scores: {}), estimated ${:.2}/month",
        plan.strategy,
        scores.join(", "),
        plan.cost.monthly_usd
    )
}

/// Drops a deployment from the running set however its task ends.
struct RunningGuard<'a> {
    running: &'a DashMap<DeploymentId, CancellationToken>,
    id: DeploymentId,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.remove(&self.id);
    }
}

struct StoreProgress<'a> {
    store: &'a dyn PipelineStateStore,
    id: &'a DeploymentId,
}

#[async_trait]
impl ProgressSink for StoreProgress<'_> {
    async fn report(&self, message: String) {
        if let Err(e) = self.store.append_log(self.id, LogEntry::info(message)).await {
            warn!(deployment_id = %self.id, error = %e, "failed to record progress");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::{MockDeployer, MockProvisioner};
    use crate::store::MemoryStore;
    use crate::types::Stage;

    struct PanickingProbe;

    #[async_trait]
    impl Probe for PanickingProbe {
        async fn check(&self, _url: &str) -> bool {
            panic!("probe exploded");
        }
    }

    fn flask_checkout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "from flask import Flask\n").unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "flask==2.3.0\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn panicking_task_is_recorded_as_failed() {
        let store = Arc::new(MemoryStore::new());
        let backends = Backends {
            provisioner: Arc::new(MockProvisioner::new()),
            deployer: Arc::new(MockDeployer::new()),
            probe: Arc::new(PanickingProbe),
        };
        let store_handle: Arc<dyn PipelineStateStore> = store.clone();
        let coordinator = Arc::new(ExecutionCoordinator::new(
            store_handle,
            backends,
            &ControlConfig::default(),
        ));
        let checkout = flask_checkout();

        let id = coordinator
            .start(checkout.path(), RequirementSet::default())
            .await
            .unwrap();

        let record = loop {
            let record = store.get(&id).await.unwrap();
            if record.stage.is_terminal() {
                break record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        assert_eq!(record.stage, Stage::Failed);
        let error = record.error.unwrap();
        assert!(error.starts_with("internal error: deployment task aborted"), "{error}");
        assert!(error.contains("panicked"), "{error}");
        assert_eq!(coordinator.running(), 0);
        assert!(!coordinator.cancel(&id).await.unwrap());
    }
}
