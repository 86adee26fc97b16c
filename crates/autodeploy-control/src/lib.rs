//! Autodeploy orchestration core
//!
//! This crate turns a checked-out repository plus a deployment request into
//! a running application. It decides how the application should be hosted
//! and drives the deployment through pluggable platform backends, recording
//! progress for polling clients.
//!
//! # Architecture
//!
//! - **Repository profiling**: [`RepositoryProfiler`] scans a checkout for
//!   language, framework, manifests, ports, environment variables and backing
//!   services, producing a [`RepositoryProfile`] with a confidence score
//! - **Strategy decision**: [`StrategyDecisionEngine`] scores every
//!   [`HostingStrategy`] against the profile and the [`RequirementSet`] and
//!   expands the winner into a structured [`StrategyPlan`]
//! - **Execution**: [`ExecutionCoordinator`] runs the pipeline, delegating
//!   to [`backend`] implementations and handling polling, timeouts,
//!   cancellation and teardown
//! - **State**: [`PipelineStateStore`] holds each deployment's stage and log
//!   history under concurrent access
//!
//! # State Machine
//!
//! ```text
//! Initiated ──▶ Profiling ──▶ Deciding ──▶ Provisioning ──▶ Deploying ──▶ Verifying ──▶ Completed
//!     │             │            │              │               │             │
//!     └─────────────┴────────────┴──────────────┴───────────────┴─────────────┴──▶ Failed
//! ```
//!
//! Inside the coordinator the stages are types, so out-of-order transitions
//! do not compile. The store rejects them again at runtime.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use autodeploy_control::backend::{MockDeployer, MockProvisioner, ScriptedProbe};
//! use autodeploy_control::{Backends, ControlConfig, ExecutionCoordinator, MemoryStore};
//!
//! let backends = Backends {
//!     provisioner: Arc::new(MockProvisioner::new()),
//!     deployer: Arc::new(MockDeployer::new()),
//!     probe: Arc::new(ScriptedProbe::always()),
//! };
//! let coordinator = ExecutionCoordinator::new(
//!     Arc::new(MemoryStore::new()),
//!     backends,
//!     &ControlConfig::default(),
//! );
//! let record = coordinator.execute("./my-app", Default::default()).await?;
//! ```

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod decision;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod requirements;
pub mod store;
pub mod strategy;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::ControlConfig;
pub use decision::{StrategyDecisionEngine, StrategyPlan};
pub use error::{
    ControlError, ControlResult, DeploymentError, ExtractionError, ProfilingError,
    ProvisioningError,
};
pub use pipeline::{Backends, ExecutionCoordinator};
pub use profile::{RepositoryProfile, RepositoryProfiler};
pub use requirements::{resolve_requirements, KeywordExtractor, RequirementExtractor, RequirementSet};
pub use store::{DeploymentFilter, MemoryStore, PipelineStateStore};
pub use strategy::HostingStrategy;
pub use types::{DeploymentId, DeploymentOutcome, DeploymentRecord, LogEntry, LogLevel, Stage};
