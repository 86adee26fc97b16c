//! Typestate pattern for the deployment pipeline.
//!
//! Each stage is its own type, so an out-of-order transition is a compile
//! error. Stage values carry what earlier stages produced: a
//! [`Pipeline<Provisioning>`] always has a profile and a plan, and there is
//! no way to attach either a second time.
//!
//! # Example
//!
//! ```ignore
//! let profiling = Pipeline::new(id, checkout, requirements).start_profiling();
//! let deciding = profiling.profiled(profile);
//! let provisioning = deciding.planned(plan);
//! // provisioning.profiled(..) would not compile
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::backend::{DeployedApplication, ProvisionRequest, ProvisionedInfrastructure};
use crate::decision::StrategyPlan;
use crate::profile::RepositoryProfile;
use crate::requirements::RequirementSet;
use crate::types::{DeploymentId, DeploymentOutcome, Stage};

/// Marker trait for pipeline stages.
pub trait PipelineState: private::Sealed + Send + Sync {
    /// The stage as recorded in the store.
    fn stage() -> Stage;
}

/// Stages that can still fail.
pub trait Active: PipelineState {}

mod private {
    pub trait Sealed {}
}

/// Record created, nothing has run yet.
#[derive(Debug)]
pub struct Initiated;

/// Scanning the checkout.
#[derive(Debug)]
pub struct Profiling;

/// Choosing a strategy.
#[derive(Debug)]
pub struct Deciding {
    profile: RepositoryProfile,
}

/// Creating infrastructure.
#[derive(Debug)]
pub struct Provisioning {
    profile: RepositoryProfile,
    plan: StrategyPlan,
    request: ProvisionRequest,
}

/// Shipping the application.
#[derive(Debug)]
pub struct Deploying {
    profile: RepositoryProfile,
    plan: StrategyPlan,
    request: ProvisionRequest,
    infra: ProvisionedInfrastructure,
}

/// Probing the deployed endpoint.
#[derive(Debug)]
pub struct Verifying {
    request: ProvisionRequest,
    infra: ProvisionedInfrastructure,
    app: DeployedApplication,
}

/// Deployment is live.
#[derive(Debug)]
pub struct Completed {
    outcome: DeploymentOutcome,
}

/// Deployment stopped with an error.
#[derive(Debug)]
pub struct Failed {
    error: String,
}

macro_rules! pipeline_state {
    ($($marker:ident => $stage:ident),+ $(,)?) => {
        $(
            impl private::Sealed for $marker {}

            impl PipelineState for $marker {
                fn stage() -> Stage {
                    Stage::$stage
                }
            }
        )+
    };
}

pipeline_state! {
    Initiated => Initiated,
    Profiling => Profiling,
    Deciding => Deciding,
    Provisioning => Provisioning,
    Deploying => Deploying,
    Verifying => Verifying,
    Completed => Completed,
    Failed => Failed,
}

impl Active for Initiated {}
impl Active for Profiling {}
impl Active for Deciding {}
impl Active for Provisioning {}
impl Active for Deploying {}
impl Active for Verifying {}

/// A deployment pipeline in stage `S`.
#[derive(Debug)]
pub struct Pipeline<S: PipelineState> {
    id: DeploymentId,
    checkout: PathBuf,
    requirements: RequirementSet,
    state: S,
}

impl<S: PipelineState> Pipeline<S> {
    /// Get the deployment ID.
    #[must_use]
    pub const fn id(&self) -> &DeploymentId {
        &self.id
    }

    /// Path of the checkout being deployed.
    #[must_use]
    pub fn checkout(&self) -> &Path {
        &self.checkout
    }

    /// Parsed deployment requirements.
    #[must_use]
    pub const fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        S::stage()
    }

    fn transition<T: PipelineState>(self, state: T) -> Pipeline<T> {
        Pipeline {
            id: self.id,
            checkout: self.checkout,
            requirements: self.requirements,
            state,
        }
    }
}

impl<S: Active> Pipeline<S> {
    /// Transition to the failed stage.
    #[must_use]
    pub fn fail(self, error: impl Into<String>) -> Pipeline<Failed> {
        self.transition(Failed {
            error: error.into(),
        })
    }
}

impl Pipeline<Initiated> {
    /// Create a pipeline for a new deployment.
    #[must_use]
    pub fn new(id: DeploymentId, checkout: impl Into<PathBuf>, requirements: RequirementSet) -> Self {
        Self {
            id,
            checkout: checkout.into(),
            requirements,
            state: Initiated,
        }
    }

    /// Transition to the profiling stage.
    #[must_use]
    pub fn start_profiling(self) -> Pipeline<Profiling> {
        self.transition(Profiling)
    }
}

impl Pipeline<Profiling> {
    /// Attach the profile and move on to deciding.
    #[must_use]
    pub fn profiled(self, profile: RepositoryProfile) -> Pipeline<Deciding> {
        self.transition(Deciding { profile })
    }
}

impl Pipeline<Deciding> {
    /// The repository profile.
    #[must_use]
    pub const fn profile(&self) -> &RepositoryProfile {
        &self.state.profile
    }

    /// Attach the plan and move on to provisioning.
    #[must_use]
    pub fn planned(self, plan: StrategyPlan) -> Pipeline<Provisioning> {
        let request = ProvisionRequest::from_plan(self.id.clone(), &plan);
        let Deciding { profile } = self.state;
        Pipeline {
            id: self.id,
            checkout: self.checkout,
            requirements: self.requirements,
            state: Provisioning {
                profile,
                plan,
                request,
            },
        }
    }
}

impl Pipeline<Provisioning> {
    /// The chosen plan.
    #[must_use]
    pub const fn plan(&self) -> &StrategyPlan {
        &self.state.plan
    }

    /// Request handed to the provisioning backend.
    #[must_use]
    pub const fn request(&self) -> &ProvisionRequest {
        &self.state.request
    }

    /// Attach the provisioned infrastructure and move on to deploying.
    #[must_use]
    pub fn provisioned(self, infra: ProvisionedInfrastructure) -> Pipeline<Deploying> {
        let Provisioning {
            profile,
            plan,
            request,
        } = self.state;
        Pipeline {
            id: self.id,
            checkout: self.checkout,
            requirements: self.requirements,
            state: Deploying {
                profile,
                plan,
                request,
                infra,
            },
        }
    }
}

impl Pipeline<Deploying> {
    /// The repository profile.
    #[must_use]
    pub const fn profile(&self) -> &RepositoryProfile {
        &self.state.profile
    }

    /// The chosen plan.
    #[must_use]
    pub const fn plan(&self) -> &StrategyPlan {
        &self.state.plan
    }

    /// Request the infrastructure was provisioned from.
    #[must_use]
    pub const fn request(&self) -> &ProvisionRequest {
        &self.state.request
    }

    /// The provisioned infrastructure.
    #[must_use]
    pub const fn infra(&self) -> &ProvisionedInfrastructure {
        &self.state.infra
    }

    /// Attach the deployed application and move on to verifying.
    #[must_use]
    pub fn deployed(self, app: DeployedApplication) -> Pipeline<Verifying> {
        let Deploying { request, infra, .. } = self.state;
        Pipeline {
            id: self.id,
            checkout: self.checkout,
            requirements: self.requirements,
            state: Verifying {
                request,
                infra,
                app,
            },
        }
    }
}

impl Pipeline<Verifying> {
    /// Request the infrastructure was provisioned from.
    #[must_use]
    pub const fn request(&self) -> &ProvisionRequest {
        &self.state.request
    }

    /// The provisioned infrastructure.
    #[must_use]
    pub const fn infra(&self) -> &ProvisionedInfrastructure {
        &self.state.infra
    }

    /// The deployed application.
    #[must_use]
    pub const fn app(&self) -> &DeployedApplication {
        &self.state.app
    }

    /// Transition to the completed stage.
    ///
    /// Deployer metadata wins over provisioner metadata on key collisions.
    #[must_use]
    pub fn complete(self) -> Pipeline<Completed> {
        let Verifying { infra, app, .. } = self.state;
        let url = app.endpoint.as_url().map(str::to_owned);
        let mut metadata: BTreeMap<String, String> = infra.metadata;
        metadata.extend(app.metadata);
        Pipeline {
            id: self.id,
            checkout: self.checkout,
            requirements: self.requirements,
            state: Completed {
                outcome: DeploymentOutcome { url, metadata },
            },
        }
    }
}

impl Pipeline<Completed> {
    /// Terminal result.
    #[must_use]
    pub const fn outcome(&self) -> &DeploymentOutcome {
        &self.state.outcome
    }

    /// Consume the pipeline, returning its result.
    #[must_use]
    pub fn into_outcome(self) -> DeploymentOutcome {
        self.state.outcome
    }
}

impl Pipeline<Failed> {
    /// The error that stopped the pipeline.
    #[must_use]
    pub fn error(&self) -> &str {
        &self.state.error
    }
}
