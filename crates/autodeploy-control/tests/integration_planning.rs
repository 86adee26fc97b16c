//! Integration tests for profiling checkouts and planning their deployment.

mod common;

use autodeploy_control::decision::ComputeSizing;
use autodeploy_control::profile::{Framework, Language, ServiceKind};
use autodeploy_control::requirements::{CloudProvider, Environment, ScalingTier};
use autodeploy_control::{
    resolve_requirements, HostingStrategy, KeywordExtractor, RepositoryProfiler, RequirementSet,
    StrategyDecisionEngine,
};
use common::fixtures::RepoBuilder;

#[test]
fn flask_app_prefers_serverless() {
    let repo = RepoBuilder::flask().build();
    let profile = RepositoryProfiler::default().profile(repo.path()).unwrap();

    assert_eq!(profile.language, Language::Python);
    assert_eq!(profile.framework, Some(Framework::Flask));
    assert_eq!(profile.port, Some(5000));
    assert!(profile.env_vars.contains("SECRET_KEY"));
    assert!(profile.services.is_empty());
    assert!((0.0..=1.0).contains(&profile.confidence));

    let plan = StrategyDecisionEngine::default().decide(&RequirementSet::default(), &profile);
    assert_eq!(plan.strategy, HostingStrategy::Serverless);
    assert!(!plan.overridden);
    assert!((plan.scores.get(HostingStrategy::Serverless) - 1.2).abs() < 1e-9);
    assert!((plan.scores.get(HostingStrategy::Vm) - 0.8).abs() < 1e-9);
    assert!((plan.scores.get(HostingStrategy::Container) - 0.5).abs() < 1e-9);
    assert_eq!(plan.application.port, 5000);
    assert!(matches!(
        plan.infrastructure.compute,
        ComputeSizing::Serverless { ref runtime, .. } if runtime == "python3.9"
    ));
}

#[test]
fn django_with_postgres_lands_on_a_vm() {
    let repo = RepoBuilder::django_postgres().build();
    let profile = RepositoryProfiler::default().profile(repo.path()).unwrap();

    assert_eq!(profile.language, Language::Python);
    assert_eq!(profile.framework, Some(Framework::Django));
    assert!(profile.services.contains(&ServiceKind::Postgresql));
    assert!(profile.env_vars.contains("DATABASE_URL"));
    assert_eq!(
        profile.start_commands,
        vec!["python manage.py runserver 0.0.0.0:8000".to_owned()]
    );

    let plan = StrategyDecisionEngine::default().decide(&RequirementSet::default(), &profile);
    assert_eq!(plan.strategy, HostingStrategy::Vm);
    assert_eq!(plan.application.port, 8000);
    assert_eq!(plan.services.len(), 1);
    assert_eq!(plan.services[0].kind, ServiceKind::Postgresql);
    assert!(plan.cost.breakdown.contains_key("service:postgresql"));
}

#[tokio::test]
async fn dockerised_express_service_uses_containers() {
    let repo = RepoBuilder::express_docker().build();
    let profile = RepositoryProfiler::default().profile(repo.path()).unwrap();

    assert_eq!(profile.language, Language::Nodejs);
    assert_eq!(profile.framework, Some(Framework::Express));
    assert!(profile.has_dockerfile);
    assert_eq!(
        profile.services.iter().copied().collect::<Vec<_>>(),
        vec![ServiceKind::Postgresql, ServiceKind::Redis]
    );

    let requirements = resolve_requirements(
        &KeywordExtractor::new(),
        "ship the shop api to gcp staging, moderate traffic expected",
    )
    .await;
    assert_eq!(requirements.cloud_provider, CloudProvider::Gcp);
    assert_eq!(requirements.environment, Environment::Staging);
    assert_eq!(requirements.scaling, ScalingTier::Moderate);

    let plan = StrategyDecisionEngine::default().decide(&requirements, &profile);
    assert_eq!(plan.strategy, HostingStrategy::Container);
    assert_eq!(plan.infrastructure.region, "us-central1");
    assert_eq!(
        plan.infrastructure.compute,
        ComputeSizing::Container {
            registry: true,
            tier: autodeploy_control::decision::InstanceTier::Medium,
            instance_type: "e2-medium".to_owned(),
            replicas: 1,
        }
    );
    assert!(plan.networking.load_balancer);
    assert_eq!(plan.application.port, 3000);
    assert_eq!(plan.services.len(), 2);
}

#[tokio::test]
async fn explicit_preference_overrides_scores() {
    let repo = RepoBuilder::express_docker().build();
    let profile = RepositoryProfiler::default().profile(repo.path()).unwrap();

    let requirements =
        resolve_requirements(&KeywordExtractor::new(), "put it on a vm with high traffic").await;
    assert_eq!(requirements.scaling, ScalingTier::High);

    let plan = StrategyDecisionEngine::default().decide(&requirements, &profile);
    assert_eq!(plan.strategy, HostingStrategy::Vm);
    assert!(plan.overridden);
    assert_eq!(plan.scores.best(), HostingStrategy::Container);
}

#[tokio::test]
async fn empty_request_falls_back_to_defaults() {
    let requirements = resolve_requirements(&KeywordExtractor::new(), "   ").await;
    assert_eq!(requirements, RequirementSet::default());
}

#[test]
fn plan_serialises_for_clients() {
    let repo = RepoBuilder::flask().build();
    let profile = RepositoryProfiler::default().profile(repo.path()).unwrap();
    let plan = StrategyDecisionEngine::default().decide(&RequirementSet::default(), &profile);

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["strategy"], "serverless");
    assert_eq!(json["infrastructure"]["compute"]["kind"], "serverless");
    assert_eq!(json["scores"][1]["strategy"], "serverless");
}
