//! Strategy scoring rules.

use serde::{Deserialize, Serialize};

use crate::profile::{Framework, Language, RepositoryProfile};
use crate::requirements::{Environment, RequirementSet, ScalingTier};
use crate::strategy::HostingStrategy;

/// Score of one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyScore {
    /// Strategy scored.
    pub strategy: HostingStrategy,
    /// Non-negative suitability score.
    pub score: f64,
}

/// Scores for every strategy, in [`HostingStrategy::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTable(Vec<StrategyScore>);

impl ScoreTable {
    /// Score of `strategy`.
    #[must_use]
    pub fn get(&self, strategy: HostingStrategy) -> f64 {
        self.0
            .iter()
            .find(|s| s.strategy == strategy)
            .map_or(0.0, |s| s.score)
    }

    /// Iterate scores in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &StrategyScore> {
        self.0.iter()
    }

    /// The strictly highest-scoring strategy. Equal scores keep the earlier
    /// strategy; an all-zero table yields [`HostingStrategy::default`].
    #[must_use]
    pub fn best(&self) -> HostingStrategy {
        let mut best: Option<StrategyScore> = None;
        for entry in &self.0 {
            if entry.score > best.map_or(0.0, |b| b.score) {
                best = Some(*entry);
            }
        }
        best.map_or_else(HostingStrategy::default, |b| b.strategy)
    }
}

/// Score every strategy for `requirements` and `profile`.
#[must_use]
pub fn score_strategies(requirements: &RequirementSet, profile: &RepositoryProfile) -> ScoreTable {
    ScoreTable(
        HostingStrategy::ALL
            .into_iter()
            .map(|strategy| StrategyScore {
                strategy,
                score: tenths(rule_points(strategy, requirements, profile)),
            })
            .collect(),
    )
}

// Scores are accumulated in tenths so equal rule sets compare exactly.
fn tenths(points: i32) -> f64 {
    f64::from(points.max(0)) / 10.0
}

fn rule_points(
    strategy: HostingStrategy,
    requirements: &RequirementSet,
    profile: &RepositoryProfile,
) -> i32 {
    let services = profile.service_count();
    let language = profile.language;
    let framework = profile.framework;
    let scaling = requirements.scaling;

    let mut points = 0;
    let mut add = |condition: bool, delta: i32| {
        if condition {
            points += delta;
        }
    };

    match strategy {
        HostingStrategy::Vm => {
            add(true, 5);
            add(matches!(language, Language::Python | Language::Java), 2);
            add(services > 0, 3);
            add(matches!(framework, Some(Framework::Django | Framework::Spring)), 2);
            add(scaling == ScalingTier::Minimal, 1);
        }
        HostingStrategy::Serverless => {
            add(true, 3);
            add(
                matches!(
                    framework,
                    Some(Framework::Flask | Framework::Fastapi | Framework::Express)
                ),
                4,
            );
            add(services == 0, 3);
            add(scaling == ScalingTier::Minimal, 2);
            add(language == Language::Nodejs, 1);
            add(services > 1, -5);
        }
        HostingStrategy::Container => {
            add(true, 4);
            add(profile.has_dockerfile, 3);
            add(matches!(scaling, ScalingTier::Moderate | ScalingTier::High), 2);
            add(matches!(language, Language::Python | Language::Nodejs), 1);
        }
        HostingStrategy::Kubernetes => {
            add(true, 2);
            add(scaling == ScalingTier::High, 4);
            add(requirements.environment == Environment::Production, 2);
            add(services > 2, 2);
            add(scaling == ScalingTier::Minimal, -3);
        }
    }

    points
}
