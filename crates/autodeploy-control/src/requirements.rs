//! Structured deployment requirements and their extraction from free text.
//!
//! A [`RequirementSet`] is produced once per deployment by a
//! [`RequirementExtractor`] and never changes afterwards. When extraction
//! fails, [`resolve_requirements`] substitutes [`RequirementSet::default`].

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExtractionError;

/// Target cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Amazon Web Services.
    #[default]
    Aws,
    /// Google Cloud Platform.
    Gcp,
    /// Microsoft Azure.
    Azure,
}

impl CloudProvider {
    /// Get the provider name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development.
    Development,
    /// Staging.
    Staging,
    /// Production.
    #[default]
    Production,
}

impl Environment {
    /// Get the environment name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected load. Unrecognised values decode as [`ScalingTier::Minimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingTier {
    /// Noticeable but predictable traffic.
    Moderate,
    /// High or bursty traffic.
    High,
    /// Low, steady traffic.
    #[default]
    #[serde(other)]
    Minimal,
}

impl ScalingTier {
    /// Get the tier name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ScalingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hosting style the user asked for. Unrecognised values decode as
/// [`DeploymentPreference::Auto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentPreference {
    /// Virtual machine.
    Vm,
    /// Serverless functions.
    Serverless,
    /// Managed containers.
    Container,
    /// Kubernetes cluster.
    Kubernetes,
    /// Let the decision engine choose.
    #[default]
    #[serde(other)]
    Auto,
}

impl DeploymentPreference {
    /// Get the preference name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Vm => "vm",
            Self::Serverless => "serverless",
            Self::Container => "container",
            Self::Kubernetes => "kubernetes",
        }
    }
}

impl fmt::Display for DeploymentPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured interpretation of a deployment request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequirementSet {
    /// Target cloud.
    #[serde(default)]
    pub cloud_provider: CloudProvider,
    /// Target environment.
    #[serde(default)]
    pub environment: Environment,
    /// Expected load.
    #[serde(default)]
    pub scaling: ScalingTier,
    /// Requested hosting style.
    #[serde(default)]
    pub deployment_preference: DeploymentPreference,
    /// Free-form extras the extractor could not map onto a field.
    #[serde(default)]
    pub special_requirements: Vec<String>,
}

/// Turns a natural-language deployment request into a [`RequirementSet`].
#[async_trait]
pub trait RequirementExtractor: Send + Sync {
    /// Interpret `text`.
    async fn extract(&self, text: &str) -> Result<RequirementSet, ExtractionError>;
}

/// Run `extractor`, falling back to [`RequirementSet::default`] on failure.
pub async fn resolve_requirements(
    extractor: &dyn RequirementExtractor,
    text: &str,
) -> RequirementSet {
    match extractor.extract(text).await {
        Ok(requirements) => requirements,
        Err(e) => {
            warn!(error = %e, "requirement extraction failed, using defaults");
            RequirementSet::default()
        }
    }
}

type Pattern = LazyLock<Option<Regex>>;

fn words(pattern: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b(?:{pattern})\b")).ok()
}

fn matches(pattern: &Pattern, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

static AWS: Pattern = LazyLock::new(|| words("aws|amazon|ec2|lambda"));
static GCP: Pattern = LazyLock::new(|| words("gcp|google|cloud platform"));
static AZURE: Pattern = LazyLock::new(|| words("azure|microsoft"));

static KUBERNETES: Pattern = LazyLock::new(|| words("kubernetes|k8s|eks|gke|aks"));
static CONTAINER: Pattern = LazyLock::new(|| words("containers?|docker|ecs|fargate"));
static SERVERLESS: Pattern = LazyLock::new(|| words("serverless|lambda|functions?"));
static VM: Pattern = LazyLock::new(|| words("vm|virtual machine|ec2|instance"));

static DEVELOPMENT: Pattern = LazyLock::new(|| words("development|dev|test|testing"));
static STAGING: Pattern = LazyLock::new(|| words("staging|stage"));
static PRODUCTION: Pattern = LazyLock::new(|| words("production|prod|live"));

static HIGH: Pattern = LazyLock::new(|| words("high traffic|scale|scalable|load|heavy"));
static MODERATE: Pattern = LazyLock::new(|| words("moderate|medium"));
static MINIMAL: Pattern = LazyLock::new(|| words("minimal|simple|basic|small"));

static SPECIAL: Pattern = LazyLock::new(|| words("ssl|https|tls|custom domain|backups?|cdn|gpu"));

/// Deterministic keyword matcher.
///
/// Each field takes the first rule that matches, in the order providers
/// (aws, gcp, azure), preferences (serverless, kubernetes, container, vm),
/// environments (development, staging, production) and scaling (high,
/// moderate, minimal). Fields with no match keep their default.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    /// Create a keyword extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn parse(text: &str) -> RequirementSet {
        let mut requirements = RequirementSet::default();

        if matches(&AWS, text) {
            requirements.cloud_provider = CloudProvider::Aws;
        } else if matches(&GCP, text) {
            requirements.cloud_provider = CloudProvider::Gcp;
        } else if matches(&AZURE, text) {
            requirements.cloud_provider = CloudProvider::Azure;
        }

        if matches(&SERVERLESS, text) {
            requirements.deployment_preference = DeploymentPreference::Serverless;
        } else if matches(&KUBERNETES, text) {
            requirements.deployment_preference = DeploymentPreference::Kubernetes;
        } else if matches(&CONTAINER, text) {
            requirements.deployment_preference = DeploymentPreference::Container;
        } else if matches(&VM, text) {
            requirements.deployment_preference = DeploymentPreference::Vm;
        }

        if matches(&DEVELOPMENT, text) {
            requirements.environment = Environment::Development;
        } else if matches(&STAGING, text) {
            requirements.environment = Environment::Staging;
        } else if matches(&PRODUCTION, text) {
            requirements.environment = Environment::Production;
        }

        if matches(&HIGH, text) {
            requirements.scaling = ScalingTier::High;
        } else if matches(&MODERATE, text) {
            requirements.scaling = ScalingTier::Moderate;
        } else if matches(&MINIMAL, text) {
            requirements.scaling = ScalingTier::Minimal;
        }

        let mut special: Vec<String> = Vec::new();
        if let Some(re) = SPECIAL.as_ref() {
            for found in re.find_iter(text) {
                let found = found.as_str().to_lowercase();
                if !special.contains(&found) {
                    special.push(found);
                }
            }
        }
        requirements.special_requirements = special;

        requirements
    }
}

#[async_trait]
impl RequirementExtractor for KeywordExtractor {
    async fn extract(&self, text: &str) -> Result<RequirementSet, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::Empty);
        }
        let requirements = Self::parse(text);
        debug!(
            cloud_provider = %requirements.cloud_provider,
            environment = %requirements.environment,
            scaling = %requirements.scaling,
            preference = %requirements.deployment_preference,
            "extracted requirements"
        );
        Ok(requirements)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_requirements() {
        let requirements = RequirementSet::default();
        assert_eq!(requirements.cloud_provider, CloudProvider::Aws);
        assert_eq!(requirements.environment, Environment::Production);
        assert_eq!(requirements.scaling, ScalingTier::Minimal);
        assert_eq!(requirements.deployment_preference, DeploymentPreference::Auto);
        assert!(requirements.special_requirements.is_empty());
    }

    #[test]
    fn unknown_values_decode_to_fallbacks() {
        let json = r#"{
            "cloud_provider": "gcp",
            "environment": "staging",
            "scaling": "enormous",
            "deployment_preference": "mainframe"
        }"#;
        let requirements: RequirementSet = serde_json::from_str(json).unwrap();
        assert_eq!(requirements.cloud_provider, CloudProvider::Gcp);
        assert_eq!(requirements.environment, Environment::Staging);
        assert_eq!(requirements.scaling, ScalingTier::Minimal);
        assert_eq!(requirements.deployment_preference, DeploymentPreference::Auto);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let requirements: RequirementSet = serde_json::from_str("{}").unwrap();
        assert_eq!(requirements, RequirementSet::default());
    }

    #[test]
    fn keyword_patterns_compile() {
        for pattern in [
            &AWS, &GCP, &AZURE, &KUBERNETES, &CONTAINER, &SERVERLESS, &VM, &DEVELOPMENT,
            &STAGING, &PRODUCTION, &HIGH, &MODERATE, &MINIMAL, &SPECIAL,
        ] {
            assert!(pattern.is_some());
        }
    }

    #[rstest]
    #[case("Deploy this flask app on AWS", CloudProvider::Aws, DeploymentPreference::Auto)]
    #[case("ship it to google cloud platform on k8s", CloudProvider::Gcp, DeploymentPreference::Kubernetes)]
    #[case("Azure please, in a docker container", CloudProvider::Azure, DeploymentPreference::Container)]
    #[case("serverless function", CloudProvider::Aws, DeploymentPreference::Serverless)]
    #[case("a plain virtual machine", CloudProvider::Aws, DeploymentPreference::Vm)]
    #[tokio::test]
    async fn keyword_provider_and_preference(
        #[case] text: &str,
        #[case] provider: CloudProvider,
        #[case] preference: DeploymentPreference,
    ) {
        let requirements = KeywordExtractor::new().extract(text).await.unwrap();
        assert_eq!(requirements.cloud_provider, provider);
        assert_eq!(requirements.deployment_preference, preference);
    }

    #[rstest]
    #[case("deploy to staging", Environment::Staging, ScalingTier::Minimal)]
    #[case("dev environment, simple", Environment::Development, ScalingTier::Minimal)]
    #[case("production app with high traffic", Environment::Production, ScalingTier::High)]
    #[case("moderate usage", Environment::Production, ScalingTier::Moderate)]
    #[tokio::test]
    async fn keyword_environment_and_scaling(
        #[case] text: &str,
        #[case] environment: Environment,
        #[case] scaling: ScalingTier,
    ) {
        let requirements = KeywordExtractor::new().extract(text).await.unwrap();
        assert_eq!(requirements.environment, environment);
        assert_eq!(requirements.scaling, scaling);
    }

    #[tokio::test]
    async fn words_inside_other_words_do_not_match() {
        let requirements = KeywordExtractor::new()
            .extract("download the latest devops tooling")
            .await
            .unwrap();
        assert_eq!(requirements.environment, Environment::Production);
        assert_eq!(requirements.scaling, ScalingTier::Minimal);
    }

    #[tokio::test]
    async fn special_requirements_collected() {
        let requirements = KeywordExtractor::new()
            .extract("needs SSL and a custom domain")
            .await
            .unwrap();
        assert_eq!(requirements.special_requirements, vec!["ssl", "custom domain"]);
    }

    #[tokio::test]
    async fn repeated_special_requirements_appear_once() {
        let requirements = KeywordExtractor::new()
            .extract("ssl everywhere, tls for the api, and SSL on the admin site")
            .await
            .unwrap();
        assert_eq!(requirements.special_requirements, vec!["ssl", "tls"]);
    }

    #[tokio::test]
    async fn serverless_wording_wins_over_other_preferences() {
        let requirements = KeywordExtractor::new()
            .extract("serverless functions, or containers on k8s if needed")
            .await
            .unwrap();
        assert_eq!(
            requirements.deployment_preference,
            DeploymentPreference::Serverless
        );
    }

    #[test]
    fn fallback_values_serialise_by_name() {
        let requirements = RequirementSet::default();
        let json = serde_json::to_value(&requirements).unwrap();
        assert_eq!(json["scaling"], "minimal");
        assert_eq!(json["deployment_preference"], "auto");
        let back: RequirementSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, requirements);
    }

    #[tokio::test]
    async fn empty_request_falls_back_to_defaults() {
        let extractor = KeywordExtractor::new();
        assert!(extractor.extract("   ").await.is_err());
        assert_eq!(
            resolve_requirements(&extractor, "").await,
            RequirementSet::default()
        );
    }
}
