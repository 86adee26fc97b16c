//! Hosting strategies a deployment can be placed on.
//!
//! This module defines the [`HostingStrategy`] enum. The decision engine
//! scores every variant for a given profile and requirement set; the chosen
//! variant shapes the generated infrastructure descriptor.

use serde::{Deserialize, Serialize};

use crate::requirements::DeploymentPreference;

/// Where and how the application runs.
///
/// Declaration order is significant: it is the order strategies are scored
/// in and the tie-break order when scores are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostingStrategy {
    /// A single virtual machine.
    ///
    /// Cheapest to operate for small stateful apps that talk to a database.
    #[default]
    Vm,

    /// Serverless functions behind an HTTP trigger.
    ///
    /// Suits stateless web frameworks with no backing services.
    Serverless,

    /// Managed containers behind a load balancer.
    Container,

    /// A managed Kubernetes cluster.
    ///
    /// Only worth its fixed cost under high, production-grade load.
    Kubernetes,
}

impl HostingStrategy {
    /// Every strategy, in scoring order.
    pub const ALL: [Self; 4] = [Self::Vm, Self::Serverless, Self::Container, Self::Kubernetes];

    /// Get the strategy name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Serverless => "serverless",
            Self::Container => "container",
            Self::Kubernetes => "kubernetes",
        }
    }

    /// The strategy a user preference pins, or `None` for `auto`.
    #[must_use]
    pub const fn from_preference(preference: DeploymentPreference) -> Option<Self> {
        match preference {
            DeploymentPreference::Auto => None,
            DeploymentPreference::Vm => Some(Self::Vm),
            DeploymentPreference::Serverless => Some(Self::Serverless),
            DeploymentPreference::Container => Some(Self::Container),
            DeploymentPreference::Kubernetes => Some(Self::Kubernetes),
        }
    }

    /// Check if this strategy fronts the app with a load balancer.
    #[must_use]
    pub const fn uses_load_balancer(&self) -> bool {
        matches!(self, Self::Container | Self::Kubernetes)
    }

    /// Check if this strategy exposes an HTTP health-check path.
    #[must_use]
    pub const fn has_health_check(&self) -> bool {
        !matches!(self, Self::Serverless)
    }
}

impl std::fmt::Display for HostingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_is_vm() {
        assert_eq!(HostingStrategy::default(), HostingStrategy::Vm);
    }

    #[test]
    fn serde_from_string() {
        let vm: HostingStrategy = serde_json::from_str(r#""vm""#).unwrap();
        assert_eq!(vm, HostingStrategy::Vm);

        let k8s: HostingStrategy = serde_json::from_str(r#""kubernetes""#).unwrap();
        assert_eq!(k8s, HostingStrategy::Kubernetes);

        assert_eq!(
            serde_json::to_string(&HostingStrategy::Serverless).unwrap(),
            r#""serverless""#
        );
    }

    #[test]
    fn preference_mapping() {
        assert_eq!(HostingStrategy::from_preference(DeploymentPreference::Auto), None);
        for strategy in HostingStrategy::ALL {
            let preference: DeploymentPreference =
                serde_json::from_str(&format!("\"{strategy}\"")).unwrap();
            assert_eq!(HostingStrategy::from_preference(preference), Some(strategy));
        }
    }

    #[test]
    fn load_balancer_and_health_check() {
        assert!(!HostingStrategy::Vm.uses_load_balancer());
        assert!(HostingStrategy::Kubernetes.uses_load_balancer());
        assert!(!HostingStrategy::Serverless.has_health_check());
        assert!(HostingStrategy::Container.has_health_check());
    }
}
