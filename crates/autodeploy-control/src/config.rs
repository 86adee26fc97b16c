//! Configuration for autodeploy-control.

use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};
use crate::requirements::CloudProvider;

/// Top-level configuration for the orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControlConfig {
    /// Stage timeouts and polling intervals.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Repository scanning limits.
    #[serde(default)]
    pub profiler: ProfilerConfig,

    /// HTTP health probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Default region per cloud provider.
    #[serde(default)]
    pub regions: RegionConfig,
}

impl ControlConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `autodeploy.toml` in the current directory (if present)
    /// 3. Environment variables with `AUTODEPLOY_` prefix
    pub fn load() -> ControlResult<Self> {
        Self::from_file("autodeploy.toml")
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ControlResult<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("AUTODEPLOY_").split("__"))
            .extract::<Self>()
            .map_err(|e| ControlError::Config(e.to_string()))
            .and_then(|config| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Check that every wait is bounded and every poll loop sleeps.
    pub fn validate(&self) -> ControlResult<()> {
        let pipeline = &self.pipeline;
        check_wait(
            "pipeline.provision",
            pipeline.provision_poll_interval_secs,
            pipeline.provision_timeout_secs,
        )?;
        check_wait(
            "pipeline.verify",
            pipeline.verify_interval_secs,
            pipeline.verify_timeout_secs,
        )?;

        if self.probe.request_timeout_secs == 0 || self.probe.connect_timeout_secs == 0 {
            return Err(ControlError::Config(
                "probe timeouts must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Longest stage wait accepted from configuration.
pub const MAX_STAGE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

fn check_wait(name: &str, interval_secs: u64, timeout_secs: u64) -> ControlResult<()> {
    if interval_secs == 0 {
        return Err(ControlError::Config(format!(
            "{name} interval must be greater than zero"
        )));
    }
    if timeout_secs > MAX_STAGE_TIMEOUT_SECS {
        return Err(ControlError::Config(format!(
            "{name} timeout of {timeout_secs}s exceeds the {MAX_STAGE_TIMEOUT_SECS}s limit"
        )));
    }
    if interval_secs > timeout_secs {
        return Err(ControlError::Config(format!(
            "{name} interval of {interval_secs}s is longer than its {timeout_secs}s timeout"
        )));
    }
    Ok(())
}

/// Stage timeouts and polling intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How long to wait for provisioned infrastructure to report ready.
    #[serde(default = "default_provision_timeout_secs")]
    pub provision_timeout_secs: u64,

    /// Delay between provisioning readiness checks.
    #[serde(default = "default_provision_poll_interval_secs")]
    pub provision_poll_interval_secs: u64,

    /// How long to keep probing the deployed endpoint.
    #[serde(default = "default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,

    /// Delay between endpoint probes.
    #[serde(default = "default_verify_interval_secs")]
    pub verify_interval_secs: u64,
}

const fn default_provision_timeout_secs() -> u64 {
    300
}

const fn default_provision_poll_interval_secs() -> u64 {
    10
}

const fn default_verify_timeout_secs() -> u64 {
    300
}

const fn default_verify_interval_secs() -> u64 {
    30
}

impl PipelineConfig {
    /// Provisioning readiness deadline.
    #[must_use]
    pub const fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }

    /// Provisioning readiness poll interval.
    #[must_use]
    pub const fn provision_poll_interval(&self) -> Duration {
        Duration::from_secs(self.provision_poll_interval_secs)
    }

    /// Verification deadline.
    #[must_use]
    pub const fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    /// Verification probe interval.
    #[must_use]
    pub const fn verify_interval(&self) -> Duration {
        Duration::from_secs(self.verify_interval_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provision_timeout_secs: default_provision_timeout_secs(),
            provision_poll_interval_secs: default_provision_poll_interval_secs(),
            verify_timeout_secs: default_verify_timeout_secs(),
            verify_interval_secs: default_verify_interval_secs(),
        }
    }
}

/// Repository scanning limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Directory names skipped in addition to hidden and vendor directories.
    #[serde(default)]
    pub extra_skip_dirs: Vec<String>,

    /// Files larger than this are counted but never read.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

const fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            extra_skip_dirs: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// HTTP health probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds.
    #[serde(default = "default_probe_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

const fn default_probe_timeout_secs() -> u64 {
    10
}

const fn default_probe_connect_timeout_secs() -> u64 {
    5
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_probe_timeout_secs(),
            connect_timeout_secs: default_probe_connect_timeout_secs(),
        }
    }
}

/// Default region per cloud provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// AWS region.
    #[serde(default = "default_aws_region")]
    pub aws: String,

    /// GCP region.
    #[serde(default = "default_gcp_region")]
    pub gcp: String,

    /// Azure region.
    #[serde(default = "default_azure_region")]
    pub azure: String,
}

fn default_aws_region() -> String {
    "us-east-1".to_owned()
}

fn default_gcp_region() -> String {
    "us-central1".to_owned()
}

fn default_azure_region() -> String {
    "eastus".to_owned()
}

impl RegionConfig {
    /// Region configured for `provider`.
    #[must_use]
    pub fn for_provider(&self, provider: CloudProvider) -> &str {
        match provider {
            CloudProvider::Aws => &self.aws,
            CloudProvider::Gcp => &self.gcp,
            CloudProvider::Azure => &self.azure,
        }
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            aws: default_aws_region(),
            gcp: default_gcp_region(),
            azure: default_azure_region(),
        }
    }
}
