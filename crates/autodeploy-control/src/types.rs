//! Core types for autodeploy-control.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Create a deployment ID from an existing value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique deployment ID using ULID.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string().to_lowercase())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DeploymentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pipeline stage as exposed to polling clients.
///
/// Stages advance strictly in declaration order. Any non-terminal stage may
/// jump to [`Stage::Failed`]; [`Stage::Completed`] and [`Stage::Failed`] are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Record created, nothing has run yet.
    Initiated,
    /// Scanning the checkout.
    Profiling,
    /// Scoring strategies and building the plan.
    Deciding,
    /// Creating infrastructure.
    Provisioning,
    /// Shipping the application onto the infrastructure.
    Deploying,
    /// Probing the deployed endpoint.
    Verifying,
    /// Deployment is live.
    Completed,
    /// Deployment stopped with an error.
    Failed,
}

impl Stage {
    /// Get the stage name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Profiling => "profiling",
            Self::Deciding => "deciding",
            Self::Provisioning => "provisioning",
            Self::Deploying => "deploying",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// The next stage on the success path, if any.
    #[must_use]
    pub const fn successor(&self) -> Option<Self> {
        match self {
            Self::Initiated => Some(Self::Profiling),
            Self::Profiling => Some(Self::Deciding),
            Self::Deciding => Some(Self::Provisioning),
            Self::Provisioning => Some(Self::Deploying),
            Self::Deploying => Some(Self::Verifying),
            Self::Verifying => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Check if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Failed || self.successor() == Some(next)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "profiling" => Ok(Self::Profiling),
            "deciding" => Ok(Self::Deciding),
            "provisioning" => Ok(Self::Provisioning),
            "deploying" => Ok(Self::Deploying),
            "verifying" => Ok(Self::Verifying),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown pipeline stage: {s}")),
        }
    }
}

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Normal progress.
    #[default]
    Info,
    /// Something degraded but the pipeline continues.
    Warn,
    /// The message that accompanies a failure.
    Error,
}

/// One line of deployment history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable text.
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    /// Create an informational entry.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    /// Create a warning entry.
    #[must_use]
    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    /// Create an error entry.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

/// Terminal result of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    /// Public URL of the application, when the backend exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Backend-specific details (instance ids, service names, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Everything known about one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Unique deployment identifier.
    pub id: DeploymentId,
    /// Current stage.
    pub stage: Stage,
    /// Ordered, append-only history.
    pub logs: Vec<LogEntry>,
    /// Set once the deployment completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DeploymentOutcome>,
    /// Set once the deployment fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the record was created.
    pub started_at: DateTime<Utc>,
    /// When the deployment reached a terminal stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    /// Create a new record in the initiated stage.
    #[must_use]
    pub fn new(id: DeploymentId) -> Self {
        Self {
            id,
            stage: Stage::Initiated,
            logs: Vec::new(),
            result: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}
