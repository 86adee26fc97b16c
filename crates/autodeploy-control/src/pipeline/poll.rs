//! Bounded polling loops used by the provisioning and verifying stages.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::{Probe, ProvisionedInfrastructure, ProvisioningBackend};
use crate::error::{ControlError, ControlResult, ProvisioningError};

/// Sleep for `duration` unless `cancel` fires first.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> ControlResult<()> {
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        () = cancel.cancelled() => Err(ControlError::Cancelled),
    }
}

/// Return early if `cancel` has fired.
pub(crate) fn checkpoint(cancel: &CancellationToken) -> ControlResult<()> {
    if cancel.is_cancelled() {
        Err(ControlError::Cancelled)
    } else {
        Ok(())
    }
}

/// Deadline for a wait of `timeout` polled every `interval`.
fn deadline(start: Instant, interval: Duration, timeout: Duration) -> Result<Instant, String> {
    if interval.is_zero() {
        return Err("poll interval must be greater than zero".to_owned());
    }
    start
        .checked_add(timeout)
        .ok_or_else(|| format!("timeout of {}s is out of range", timeout.as_secs()))
}

/// Poll `backend` until `infra` is ready or `timeout` elapses.
pub(crate) async fn await_readiness(
    backend: &dyn ProvisioningBackend,
    infra: &ProvisionedInfrastructure,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ControlResult<()> {
    let deadline = deadline(Instant::now(), interval, timeout).map_err(ProvisioningError::new)?;
    loop {
        if backend.is_ready(infra).await? {
            return Ok(());
        }
        checkpoint(cancel)?;

        let now = Instant::now();
        if now >= deadline {
            return Err(ProvisioningError::new(format!(
                "infrastructure not ready after {}s",
                timeout.as_secs()
            ))
            .into());
        }
        pause(interval.min(deadline - now), cancel).await?;
    }
}

/// Probe `url` until it answers or `timeout` elapses.
///
/// The first probe runs immediately. A probe that fails once the deadline
/// has passed ends the loop, so with a 30s interval and a 300s timeout an
/// endpoint that never answers is probed 11 times.
pub(crate) async fn verify(
    probe: &dyn Probe,
    url: &str,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ControlResult<u32> {
    let started = Instant::now();
    let deadline = deadline(started, interval, timeout).map_err(ControlError::Config)?;
    let mut attempts = 0;
    loop {
        attempts += 1;
        if probe.check(url).await {
            debug!(url, attempts, "endpoint healthy");
            return Ok(attempts);
        }
        checkpoint(cancel)?;

        let now = Instant::now();
        if now >= deadline {
            return Err(ControlError::VerificationTimeout {
                url: url.to_owned(),
                elapsed: now - started,
                attempts,
            });
        }
        debug!(url, attempts, "endpoint not healthy yet");
        pause(interval.min(deadline - now), cancel).await?;
    }
}
