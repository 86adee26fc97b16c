//! Autodeploy command-line entry point.
//!
//! Profiles a checkout and prints the plan, or runs the whole pipeline
//! against in-process backends.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use autodeploy_control::backend::{
    AppEndpoint, HttpProbe, MockDeployer, MockProvisioner, Probe, ScriptedProbe,
};
use autodeploy_control::{
    resolve_requirements, Backends, ControlConfig, ExecutionCoordinator, KeywordExtractor,
    MemoryStore, RepositoryProfile, RepositoryProfiler, RequirementSet, StrategyDecisionEngine,
    StrategyPlan,
};

#[derive(Parser)]
#[command(name = "autodeploy")]
#[command(about = "Profile repositories and orchestrate their deployment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the repository profile and the strategy plan
    Plan {
        /// Path to the checked-out repository
        checkout: PathBuf,

        /// Natural-language deployment request
        #[arg(short, long)]
        request: Option<String>,
    },

    /// Run the deployment pipeline
    Run {
        /// Path to the checked-out repository
        checkout: PathBuf,

        /// Natural-language deployment request
        #[arg(short, long)]
        request: Option<String>,

        /// Use in-process backends instead of a cloud platform
        #[arg(long)]
        mock: bool,

        /// Health-check a live URL over HTTP instead of assuming it is up
        #[arg(long, requires = "mock")]
        verify_url: Option<String>,
    },
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    requirements: &'a RequirementSet,
    profile: &'a RepositoryProfile,
    plan: &'a StrategyPlan,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("autodeploy_control=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = ControlConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        ControlConfig::default()
    });

    match cli.command {
        Commands::Plan { checkout, request } => {
            let requirements = requirements(request.as_deref()).await;
            let profiler = RepositoryProfiler::new(config.profiler.clone());
            let profile = tokio::task::spawn_blocking(move || profiler.profile(&checkout)).await??;
            let plan = StrategyDecisionEngine::new(config.regions.clone())
                .decide(&requirements, &profile);

            let output = PlanOutput {
                requirements: &requirements,
                profile: &profile,
                plan: &plan,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Run {
            checkout,
            request,
            mock,
            verify_url,
        } => {
            if !mock {
                return Err("no platform backends are configured; pass --mock for a dry run".into());
            }

            let requirements = requirements(request.as_deref()).await;
            let mut deployer = MockDeployer::new();
            let probe: Arc<dyn Probe> = match verify_url {
                Some(url) => {
                    deployer = deployer.with_endpoint(AppEndpoint::url(url));
                    Arc::new(HttpProbe::new(&config.probe)?)
                }
                None => Arc::new(ScriptedProbe::always()),
            };
            let backends = Backends {
                provisioner: Arc::new(MockProvisioner::new()),
                deployer: Arc::new(deployer),
                probe,
            };
            let coordinator =
                ExecutionCoordinator::new(Arc::new(MemoryStore::new()), backends, &config);

            let record = coordinator.execute(checkout, requirements).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

async fn requirements(request: Option<&str>) -> RequirementSet {
    match request {
        Some(text) => resolve_requirements(&KeywordExtractor::new(), text).await,
        None => RequirementSet::default(),
    }
}
