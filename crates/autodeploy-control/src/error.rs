//! Error types for autodeploy-control.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using [`ControlError`].
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while orchestrating a deployment.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The checkout could not be profiled.
    #[error(transparent)]
    Profiling(#[from] ProfilingError),

    /// Infrastructure provisioning failed.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// The application could not be deployed onto provisioned infrastructure.
    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    /// The deployed endpoint never answered a health probe.
    #[error(
        "verification timed out after {}s: {url} did not respond successfully ({attempts} attempts)",
        .elapsed.as_secs()
    )]
    VerificationTimeout {
        /// Probed endpoint.
        url: String,
        /// Time spent probing.
        elapsed: Duration,
        /// Number of probes issued.
        attempts: u32,
    },

    /// The deployment was cancelled before it finished.
    #[error("deployment cancelled")]
    Cancelled,

    /// Deployment not found.
    #[error("deployment not found: {0}")]
    DeploymentNotFound(String),

    /// A record with this id already exists.
    #[error("deployment already exists: {0}")]
    DeploymentExists(String),

    /// Invalid stage transition attempted.
    #[error("invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current stage.
        from: &'static str,
        /// Attempted target stage.
        to: &'static str,
    },

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a failure with this error leaves provisioned infrastructure
    /// that must be torn down.
    #[must_use]
    pub const fn requires_teardown(&self) -> bool {
        matches!(self, Self::Provisioning(_) | Self::Cancelled)
    }
}

/// The checkout path could not be read.
#[derive(Debug, thiserror::Error)]
#[error("cannot read checkout {}: {source}", .path.display())]
pub struct ProfilingError {
    /// Path that was being profiled.
    pub path: PathBuf,
    /// Underlying I/O failure.
    #[source]
    pub source: std::io::Error,
}

impl ProfilingError {
    /// Create a profiling error for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// A provisioning backend reported a failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("provisioning error: {message}")]
pub struct ProvisioningError {
    /// Backend-supplied description.
    pub message: String,
}

impl ProvisioningError {
    /// Create a provisioning error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A deployment backend reported a failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("deployment error: {message}")]
pub struct DeploymentError {
    /// Backend-supplied description.
    pub message: String,
}

impl DeploymentError {
    /// Create a deployment error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Natural-language requirement extraction failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractionError {
    /// The request text was empty.
    #[error("empty deployment request")]
    Empty,

    /// The extractor could not interpret the request.
    #[error("could not interpret request: {0}")]
    Unrecognised(String),
}
