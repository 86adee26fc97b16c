//! Common test utilities for autodeploy integration tests.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use autodeploy_control::backend::{MockDeployer, MockProvisioner, ScriptedProbe};
use autodeploy_control::config::PipelineConfig;
use autodeploy_control::{
    Backends, ControlConfig, DeploymentId, DeploymentRecord, ExecutionCoordinator, MemoryStore,
    PipelineStateStore,
};

/// Coordinator wired to mock backends, with handles for assertions.
pub struct TestCoordinator {
    pub coordinator: Arc<ExecutionCoordinator>,
    pub store: Arc<MemoryStore>,
    pub provisioner: Arc<MockProvisioner>,
    pub deployer: Arc<MockDeployer>,
    pub probe: Arc<ScriptedProbe>,
}

impl TestCoordinator {
    /// Creates a coordinator whose backends all succeed.
    pub fn new() -> Self {
        Self::with_backends(
            MockProvisioner::new(),
            MockDeployer::new(),
            ScriptedProbe::always(),
        )
    }

    /// Creates a coordinator with the given backends and default config.
    pub fn with_backends(
        provisioner: MockProvisioner,
        deployer: MockDeployer,
        probe: ScriptedProbe,
    ) -> Self {
        Self::with_config(provisioner, deployer, probe, PipelineConfig::default())
    }

    /// Creates a coordinator with custom pipeline timings.
    pub fn with_config(
        provisioner: MockProvisioner,
        deployer: MockDeployer,
        probe: ScriptedProbe,
        pipeline: PipelineConfig,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provisioner = Arc::new(provisioner);
        let deployer = Arc::new(deployer);
        let probe = Arc::new(probe);

        let backends = Backends {
            provisioner: provisioner.clone(),
            deployer: deployer.clone(),
            probe: probe.clone(),
        };
        let config = ControlConfig {
            pipeline,
            ..ControlConfig::default()
        };
        let store_handle: Arc<dyn PipelineStateStore> = store.clone();
        let coordinator = Arc::new(ExecutionCoordinator::new(store_handle, backends, &config));

        Self {
            coordinator,
            store,
            provisioner,
            deployer,
            probe,
        }
    }

    /// Polls the store until the deployment reaches a terminal stage.
    pub async fn wait_terminal(&self, id: &DeploymentId) -> DeploymentRecord {
        loop {
            let record = self.store.get(id).await.unwrap();
            if record.stage.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Messages of a record's log, oldest first.
pub fn messages(record: &DeploymentRecord) -> Vec<&str> {
    record.logs.iter().map(|e| e.message.as_str()).collect()
}

/// Position of the first log message starting with `prefix`.
pub fn position(record: &DeploymentRecord, prefix: &str) -> usize {
    record
        .logs
        .iter()
        .position(|e| e.message.starts_with(prefix))
        .unwrap_or_else(|| panic!("no log line starting with {prefix:?}: {:?}", messages(record)))
}
