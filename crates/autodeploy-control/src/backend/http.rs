//! HTTP health probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::ProbeConfig;
use crate::error::{ControlError, ControlResult};

use super::Probe;

/// Probes endpoints with an HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Create a probe from configuration.
    pub fn new(config: &ProbeConfig) -> ControlResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(ControlError::Http)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(url, status = %status, "probe response");
                status.is_success()
            }
            Err(e) => {
                debug!(url, error = %e, "probe failed");
                false
            }
        }
    }
}
